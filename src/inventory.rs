use log::{info, warn};

use crate::{
    cost::CostTable,
    filter::KeywordFilter,
    source::InventoryRecord,
    summary::{dedupe, ProductRow, ProductSummary, SortKey, Totals},
    usd::Usd,
};

/// A stocked product with the unit cost used to value it.
#[derive(Clone, Debug, PartialEq)]
pub struct CostedStock<'a> {
    pub record: &'a InventoryRecord,
    pub unit_cost: Usd,
    /// `true` if the SKU had no vendor cost and the mean was used.
    pub imputed: bool,
}

impl CostedStock<'_> {
    #[must_use]
    pub fn value(&self) -> Usd {
        self.unit_cost * self.record.fulfillable_quantity
    }
}

/// Keeps in-stock lines matching the keyword, dropping duplicates.
#[must_use]
pub fn prepare(records: Vec<InventoryRecord>, filter: &KeywordFilter) -> Vec<InventoryRecord> {
    let stock: Vec<_> = filter
        .apply(records)
        .into_iter()
        .filter(|r| r.fulfillable_quantity > 0)
        .collect();
    let stock = dedupe(stock);
    info!("{} in-stock lines after filtering", stock.len());
    stock
}

/// Attaches a vendor cost to each stocked line.
///
/// Lines whose SKU has no cost get the mean of the costs that were found
/// for the other lines, or zero if none were.
#[must_use]
pub fn attach_costs<'a>(stock: &'a [InventoryRecord], costs: &CostTable) -> Vec<CostedStock<'a>> {
    let found: Vec<Option<Usd>> = stock.iter().map(|r| costs.get(&r.sku)).collect();
    let mean = Usd::mean(found.iter().flatten().copied()).unwrap_or_else(|| {
        warn!("no in-stock SKU has a vendor cost; valuing stock at zero");
        Usd::ZERO
    });
    stock
        .iter()
        .zip(found)
        .map(|(record, cost)| CostedStock {
            record,
            unit_cost: cost.unwrap_or(mean),
            imputed: cost.is_none(),
        })
        .collect()
}

/// Values the remaining stock at vendor cost, most valuable first.
#[must_use]
pub fn summarize(stock: &[InventoryRecord], costs: &CostTable) -> ProductSummary {
    let costed = attach_costs(stock, costs);
    let imputed = costed.iter().filter(|c| c.imputed).count();
    if imputed > 0 {
        info!("{imputed} in-stock SKUs valued at the mean vendor cost");
    }
    let mut totals = Totals::default();
    let rows: Vec<ProductRow> = costed
        .iter()
        .map(|c| {
            totals.add(c.value(), c.record.fulfillable_quantity);
            ProductRow {
                sku: c.record.sku.clone(),
                product_name: c.record.product_name.clone(),
                amount: c.value(),
                quantity: c.record.fulfillable_quantity,
            }
        })
        .collect();
    ProductSummary::sorted(rows, totals, SortKey::Amount)
}

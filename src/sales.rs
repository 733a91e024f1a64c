use log::info;

use crate::{
    error::{ReportError, Result},
    filter::KeywordFilter,
    source::SaleRecord,
    summary::{dedupe, ProductSummary, SortKey, Totals},
};

/// Filters sales by keyword and drops duplicate lines.
///
/// # Errors
///
/// Returns [`ReportError::NoSales`] if no sales are left.
pub fn prepare(records: Vec<SaleRecord>, filter: &KeywordFilter) -> Result<Vec<SaleRecord>> {
    let sales = dedupe(filter.apply(records));
    if sales.is_empty() {
        return Err(ReportError::NoSales {
            keyword: filter.keyword().to_string(),
        });
    }
    info!("{} sales after filtering", sales.len());
    Ok(sales)
}

/// Returns gross revenue and units per product, best sellers first.
///
/// Revenue is unit price times quantity. Products are ordered by revenue,
/// then units, both descending, then by name.
#[must_use]
pub fn summarize(sales: &[SaleRecord]) -> ProductSummary {
    let mut totals = Totals::default();
    for sale in sales {
        totals.add(sale.price * sale.quantity, sale.quantity);
    }
    ProductSummary::grouped(
        sales.iter().map(|s| {
            (
                s.sku.as_str(),
                s.product_name.as_str(),
                s.price * s.quantity,
                s.quantity,
            )
        }),
        totals,
        SortKey::Amount,
    )
}

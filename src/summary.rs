use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    hash::Hash,
};

use crate::usd::Usd;

/// One product's line in an aggregated table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductRow {
    pub sku: String,
    pub product_name: String,
    /// Revenue, returned value or stock value, depending on the table.
    pub amount: Usd,
    pub quantity: i64,
}

/// The grand totals of an aggregated table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub amount: Usd,
    pub quantity: i64,
}

impl Totals {
    pub fn add(&mut self, amount: Usd, quantity: i64) {
        self.amount += amount;
        self.quantity += quantity;
    }
}

/// Which metric leads the ordering of a [`ProductSummary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    /// Amount descending, then quantity descending.
    Amount,
    /// Quantity descending, then amount descending.
    Quantity,
}

/// An aggregated per-product table together with its grand totals.
///
/// The totals are kept apart from the rows; writers render them as a
/// trailing "Grand Totals" line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductSummary {
    pub rows: Vec<ProductRow>,
    pub totals: Totals,
}

impl ProductSummary {
    /// Groups `(sku, product name, amount, quantity)` entries by SKU and
    /// name, summing amount and quantity, and sorts the result by `key`
    /// with ties broken by ascending product name.
    ///
    /// `totals` are supplied by the caller, computed from the ungrouped
    /// entries.
    pub fn grouped<'a, I>(entries: I, totals: Totals, key: SortKey) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, Usd, i64)>,
    {
        let mut groups: BTreeMap<(&str, &str), (Usd, i64)> = BTreeMap::new();
        for (sku, name, amount, quantity) in entries {
            let group = groups.entry((sku, name)).or_default();
            group.0 += amount;
            group.1 += quantity;
        }
        let rows = groups
            .into_iter()
            .map(|((sku, name), (amount, quantity))| ProductRow {
                sku: sku.to_string(),
                product_name: name.to_string(),
                amount,
                quantity,
            })
            .collect();
        Self::sorted(rows, totals, key)
    }

    /// Builds a summary from rows that are already one per product.
    #[must_use]
    pub fn sorted(mut rows: Vec<ProductRow>, totals: Totals, key: SortKey) -> Self {
        rows.sort_by(|a, b| compare(a, b, key));
        Self { rows, totals }
    }

    /// Returns the sum of the rows, which should equal [`Self::totals`].
    #[must_use]
    pub fn row_sum(&self) -> Totals {
        let mut sum = Totals::default();
        for row in &self.rows {
            sum.add(row.amount, row.quantity);
        }
        sum
    }
}

/// Drops repeated records, keeping the first of each in order.
pub fn dedupe<T: Eq + Hash + Clone>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

fn compare(a: &ProductRow, b: &ProductRow, key: SortKey) -> Ordering {
    let by_amount = b.amount.total_cmp(&a.amount);
    let by_quantity = b.quantity.cmp(&a.quantity);
    let leading = match key {
        SortKey::Amount => by_amount.then(by_quantity),
        SortKey::Quantity => by_quantity.then(by_amount),
    };
    leading.then_with(|| a.product_name.cmp(&b.product_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sku: &str, name: &str, amount: f64, quantity: i64) -> ProductRow {
        ProductRow {
            sku: sku.into(),
            product_name: name.into(),
            amount: Usd::new(amount),
            quantity,
        }
    }

    #[test]
    fn grouped_fn_sums_entries_with_the_same_sku_and_name() {
        let entries = [
            ("A", "Apple", Usd::new(20.0), 2),
            ("A", "Apple", Usd::new(10.0), 1),
            ("B", "Banana", Usd::new(20.0), 4),
        ];
        let totals = Totals {
            amount: Usd::new(50.0),
            quantity: 7,
        };
        let summary = ProductSummary::grouped(entries, totals, SortKey::Amount);
        assert_eq!(
            summary.rows,
            vec![row("A", "Apple", 30.0, 3), row("B", "Banana", 20.0, 4)]
        );
        assert_eq!(summary.row_sum(), summary.totals);
    }

    #[test]
    fn sorted_fn_breaks_ties_by_quantity_then_name() {
        let rows = vec![
            row("C", "Cherry", 10.0, 1),
            row("B", "Banana", 10.0, 1),
            row("A", "Apple", 10.0, 5),
        ];
        let summary = ProductSummary::sorted(rows, Totals::default(), SortKey::Amount);
        let names: Vec<_> = summary.rows.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Banana", "Cherry"]);
    }

    #[test]
    fn dedupe_fn_keeps_first_occurrence_in_order() {
        assert_eq!(dedupe(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn sorted_fn_can_lead_with_quantity() {
        let rows = vec![row("A", "Apple", 50.0, 1), row("B", "Banana", 5.0, 3)];
        let summary = ProductSummary::sorted(rows, Totals::default(), SortKey::Quantity);
        assert_eq!(summary.rows[0].sku, "B");
    }
}

//! Values customer returns against the orders they came from.

use log::{info, warn};

use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{ReportError, Result},
    filter::KeywordFilter,
    source::{ReturnRecord, SaleRecord},
    summary::{dedupe, ProductSummary, SortKey, Totals},
    usd::Usd,
};

/// How far the reason shares may drift from 1.0 before the breakdown is
/// considered wrong.
const SHARE_TOLERANCE: f64 = 1e-9;

/// Units returned for one reason.
#[derive(Clone, Debug, PartialEq)]
pub struct ReasonRow {
    pub reason: String,
    pub quantity: i64,
    /// Fraction of all returned units.
    pub share: f64,
}

/// Returned units broken down by the customer's reason.
#[derive(Clone, Debug, PartialEq)]
pub enum ReasonBreakdown {
    Reasons {
        rows: Vec<ReasonRow>,
        total_quantity: i64,
        /// Sum of the row shares; 1.0 up to rounding.
        total_share: f64,
    },
    /// Nothing was returned, so there is nothing to break down.
    NoReturns,
}

/// A return with the unit price it was sold at.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedReturn<'a> {
    pub record: &'a ReturnRecord,
    pub unit_price: Usd,
    /// `true` if the order wasn't found and the price is the mean of the
    /// others.
    pub imputed: bool,
}

impl PricedReturn<'_> {
    #[must_use]
    pub fn value(&self) -> Usd {
        self.unit_price * self.record.quantity
    }
}

/// The returns tables of the report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnsReport {
    pub summary: ProductSummary,
    pub reasons: ReasonBreakdown,
}

impl ReturnsReport {
    /// The report when no returns match: zero totals and no breakdown.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            summary: ProductSummary::default(),
            reasons: ReasonBreakdown::NoReturns,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons == ReasonBreakdown::NoReturns
    }
}

/// Filters returns by keyword and drops duplicate lines.
#[must_use]
pub fn prepare(records: Vec<ReturnRecord>, filter: &KeywordFilter) -> Vec<ReturnRecord> {
    let returns = dedupe(filter.apply(records));
    info!("{} returns after filtering", returns.len());
    returns
}

/// Looks up the unit price of each return from the sale with the same order
/// ID and SKU.
///
/// Returns with no matching sale are priced at the mean of the prices that
/// were found, or zero if none were.
#[must_use]
pub fn price_returns<'a>(returns: &'a [ReturnRecord], sales: &[SaleRecord]) -> Vec<PricedReturn<'a>> {
    let mut prices: HashMap<(&str, &str), Usd> = HashMap::new();
    for sale in sales {
        prices
            .entry((sale.order_id.as_str(), sale.sku.as_str()))
            .or_insert(sale.price);
    }
    let resolved: Vec<Option<Usd>> = returns
        .iter()
        .map(|r| prices.get(&(r.order_id.as_str(), r.sku.as_str())).copied())
        .collect();
    let mean = Usd::mean(resolved.iter().flatten().copied()).unwrap_or_else(|| {
        warn!("no returns could be matched to a sale; valuing them at zero");
        Usd::ZERO
    });
    returns
        .iter()
        .zip(resolved)
        .map(|(record, price)| PricedReturn {
            record,
            unit_price: price.unwrap_or(mean),
            imputed: price.is_none(),
        })
        .collect()
}

/// Builds the returns tables from filtered returns and filtered sales.
///
/// # Errors
///
/// Returns [`ReportError::Inconsistent`] if the reason shares don't add up
/// to 1.
pub fn reconcile(returns: &[ReturnRecord], sales: &[SaleRecord]) -> Result<ReturnsReport> {
    if returns.is_empty() {
        return Ok(ReturnsReport::empty());
    }
    let priced = price_returns(returns, sales);
    let imputed = priced.iter().filter(|p| p.imputed).count();
    if imputed > 0 {
        info!("{imputed} returns priced at the mean return price");
    }

    let mut totals = Totals::default();
    for p in &priced {
        totals.add(p.value(), p.record.quantity);
    }
    let summary = ProductSummary::grouped(
        priced.iter().map(|p| {
            (
                p.record.sku.as_str(),
                p.record.product_name.as_str(),
                p.value(),
                p.record.quantity,
            )
        }),
        totals,
        SortKey::Quantity,
    );
    Ok(ReturnsReport {
        summary,
        reasons: by_reason(returns)?,
    })
}

/// Sums returned units per reason, in reason order.
///
/// # Errors
///
/// Returns [`ReportError::Inconsistent`] if the shares don't add up to 1.
pub fn by_reason(returns: &[ReturnRecord]) -> Result<ReasonBreakdown> {
    if returns.is_empty() {
        return Ok(ReasonBreakdown::NoReturns);
    }
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for r in returns {
        *counts.entry(r.reason.as_str()).or_default() += r.quantity;
    }
    let total_quantity: i64 = counts.values().sum();
    #[allow(clippy::cast_precision_loss)]
    let share = |quantity: i64| {
        if total_quantity == 0 {
            0.0
        } else {
            quantity as f64 / total_quantity as f64
        }
    };
    let rows: Vec<ReasonRow> = counts
        .into_iter()
        .map(|(reason, quantity)| ReasonRow {
            reason: reason.to_string(),
            quantity,
            share: share(quantity),
        })
        .collect();

    let total_share: f64 = rows.iter().map(|r| r.share).sum();
    if total_quantity != 0 && (total_share - 1.0).abs() > SHARE_TOLERANCE {
        return Err(ReportError::Inconsistent(format!(
            "return reason shares add up to {total_share}, not 1"
        )));
    }
    Ok(ReasonBreakdown::Reasons {
        rows,
        total_quantity,
        total_share,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        sales,
        source::{tests::fixture_dir, Sources},
    };

    fn ret(order: &str, sku: &str, quantity: i64, reason: &str) -> ReturnRecord {
        ReturnRecord {
            return_date: "2024-03-06".into(),
            order_id: order.into(),
            sku: sku.into(),
            quantity,
            product_name: format!("Product {sku}"),
            reason: reason.into(),
        }
    }

    fn sale(order: &str, sku: &str, price: f64) -> SaleRecord {
        SaleRecord {
            order_id: order.into(),
            merchant_order_id: None,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            sku: sku.into(),
            quantity: 1,
            product_name: format!("Product {sku}"),
            price: Usd::new(price),
        }
    }

    fn fixture(keyword: &str) -> (Vec<ReturnRecord>, Vec<SaleRecord>) {
        let sources = Sources::load_dir("testdata/complete").unwrap();
        let filter = KeywordFilter::new(keyword);
        let sales = sales::prepare(sources.sales, &filter).unwrap();
        (prepare(sources.returns, &filter), sales)
    }

    #[test]
    fn price_returns_fn_imputes_mean_of_resolved_prices() {
        let returns = [ret("1", "A", 1, "x"), ret("2", "B", 1, "x"), ret("9", "A", 1, "x")];
        let sales = [sale("1", "A", 10.0), sale("2", "B", 30.0)];
        let priced = price_returns(&returns, &sales);
        let prices: Vec<_> = priced.iter().map(|p| (p.unit_price, p.imputed)).collect();
        assert_eq!(
            prices,
            vec![
                (Usd::new(10.0), false),
                (Usd::new(30.0), false),
                (Usd::new(20.0), true),
            ]
        );
    }

    #[test]
    fn price_returns_fn_matches_on_order_and_sku_together() {
        let returns = [ret("1", "B", 1, "x")];
        let sales = [sale("1", "A", 10.0), sale("2", "B", 30.0)];
        let priced = price_returns(&returns, &sales);
        assert!(priced[0].imputed);
        assert_eq!(priced[0].unit_price, Usd::ZERO);
    }

    #[test]
    fn reconcile_fn_values_fixture_returns() {
        let (returns, sales) = fixture("");
        assert_eq!(returns.len(), 4, "duplicate return not dropped");
        let report = reconcile(&returns, &sales).unwrap();
        let rows: Vec<_> = report
            .summary
            .rows
            .iter()
            .map(|r| (r.sku.as_str(), r.amount, r.quantity))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("ACME-W-S", Usd::new(35.0), 3),
                ("ACME-W-L", Usd::new(20.0), 1),
                ("GLX-G", Usd::new(15.0), 1),
            ]
        );
        assert_eq!(report.summary.totals.amount, Usd::new(70.0));
        assert_eq!(report.summary.totals.quantity, 5);
        assert_eq!(report.summary.row_sum(), report.summary.totals);
    }

    #[test]
    fn by_reason_fn_shares_add_up_to_one() {
        let (returns, _) = fixture("");
        let ReasonBreakdown::Reasons {
            rows,
            total_quantity,
            total_share,
        } = by_reason(&returns).unwrap()
        else {
            panic!("want reasons");
        };
        let reasons: Vec<_> = rows.iter().map(|r| (r.reason.as_str(), r.quantity)).collect();
        assert_eq!(
            reasons,
            vec![("DEFECTIVE", 2), ("NOT_AS_DESCRIBED", 2), ("UNWANTED_ITEM", 1)]
        );
        assert_eq!(total_quantity, 5);
        assert!((total_share - 1.0).abs() < 1e-9);
        let sum: f64 = rows.iter().map(|r| r.share).sum();
        assert!((sum - total_share).abs() < f64::EPSILON);
        assert!((rows[2].share - 0.2).abs() < 1e-12);
    }

    #[test]
    fn reconcile_fn_returns_placeholder_when_no_returns_match() {
        let (returns, sales) = fixture("mug");
        assert!(returns.is_empty());
        let report = reconcile(&returns, &sales).unwrap();
        assert!(report.is_empty());
        assert!(report.summary.rows.is_empty());
        assert_eq!(report.summary.totals, Totals::default());
        assert_eq!(report.reasons, ReasonBreakdown::NoReturns);
    }

    #[test]
    fn reconcile_fn_only_prices_against_filtered_sales() {
        let (returns, sales) = fixture("acme");
        let report = reconcile(&returns, &sales).unwrap();
        assert_eq!(report.summary.totals.amount, Usd::new(55.0));
        assert_eq!(report.summary.totals.quantity, 4);
    }

    #[test]
    fn reconcile_fn_prices_returns_without_an_order_id_at_the_mean() {
        let dir = fixture_dir(
            &[],
            &[(
                "returns-late.csv",
                b"return-date,order-id,sku,product-name,quantity,reason\n\
                  03/09/2024,,GLX-G,Globex Gadget,3,UNWANTED_ITEM\n",
            )],
        );
        let sources = Sources::load_dir(dir.path()).unwrap();
        let filter = KeywordFilter::new("");
        let sales = sales::prepare(sources.sales, &filter).unwrap();
        let returns = prepare(sources.returns, &filter);
        assert_eq!(returns.len(), 5);

        let report = reconcile(&returns, &sales).unwrap();
        // three extra units at the mean resolved price of 15.00
        assert_eq!(report.summary.totals.quantity, 8);
        assert_eq!(report.summary.totals.amount, Usd::new(115.0));
        let gadget = report
            .summary
            .rows
            .iter()
            .find(|r| r.sku == "GLX-G")
            .unwrap();
        assert_eq!((gadget.amount, gadget.quantity), (Usd::new(60.0), 4));
    }

    #[test]
    fn by_reason_fn_lists_reasons_alphabetically() {
        let returns = [
            ret("1", "A", 1, "UNWANTED_ITEM"),
            ret("2", "A", 5, "DEFECTIVE"),
            ret("3", "B", 3, "UNWANTED_ITEM"),
            ret("4", "B", 2, "APPARENT_DAMAGE"),
        ];
        let ReasonBreakdown::Reasons { rows, .. } = by_reason(&returns).unwrap() else {
            panic!("want reasons");
        };
        let reasons: Vec<_> = rows.iter().map(|r| (r.reason.as_str(), r.quantity)).collect();
        assert_eq!(
            reasons,
            vec![("APPARENT_DAMAGE", 2), ("DEFECTIVE", 5), ("UNWANTED_ITEM", 4)]
        );
    }
}

//! Daily revenue, for charting sales over time.

use chrono::{Days, NaiveDate};

use std::collections::BTreeMap;

use crate::{source::SaleRecord, usd::Usd};

/// Number of days in the trailing moving average.
pub const WINDOW: usize = 7;

/// Revenue on one calendar day.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Usd,
    /// Mean revenue over this day and the previous six, once there are
    /// that many days.
    pub moving_average: Option<Usd>,
}

/// Revenue for every day from the first sale to the last complete day.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DailySeries {
    pub days: Vec<DailyRevenue>,
}

impl DailySeries {
    /// Builds the series from (already filtered) sales.
    ///
    /// Every calendar day between the first and last sale appears, with zero
    /// revenue if nothing sold. If the last sale was today the series stops
    /// the day before, since today's sales are still coming in.
    #[must_use]
    pub fn build(sales: &[SaleRecord], today: NaiveDate) -> Self {
        let mut by_day: BTreeMap<NaiveDate, Usd> = BTreeMap::new();
        for sale in sales {
            *by_day.entry(sale.purchase_date).or_default() += sale.price * sale.quantity;
        }
        let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
            return Self::default();
        };
        let last = if last == today {
            today.pred_opt().unwrap_or(today)
        } else {
            last
        };

        let mut days = Vec::new();
        let mut date = first;
        while date <= last {
            days.push(DailyRevenue {
                date,
                revenue: by_day.get(&date).copied().unwrap_or_default(),
                moving_average: None,
            });
            let Some(next) = date.checked_add_days(Days::new(1)) else {
                break;
            };
            date = next;
        }
        for i in WINDOW - 1..days.len() {
            let average = Usd::mean(days[i + 1 - WINDOW..=i].iter().map(|d| d.revenue));
            days[i].moving_average = average;
        }
        Self { days }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Returns the first and last day of the series.
    #[must_use]
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.days.first()?.date, self.days.last()?.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter::KeywordFilter, sales, source::Sources};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn fixture_series(today: NaiveDate) -> DailySeries {
        let sources = Sources::load_dir("testdata/complete").unwrap();
        let sales = sales::prepare(sources.sales, &KeywordFilter::new("")).unwrap();
        DailySeries::build(&sales, today)
    }

    #[test]
    fn build_fn_has_one_entry_per_calendar_day() {
        let series = fixture_series(date(31));
        assert_eq!(series.len(), 10);
        assert_eq!(series.range(), Some((date(1), date(10))));
        for (i, day) in series.days.iter().enumerate() {
            assert_eq!(day.date, date(u32::try_from(i).unwrap() + 1));
        }
    }

    #[test]
    fn build_fn_fills_days_without_sales_with_zero() {
        let series = fixture_series(date(31));
        assert_eq!(series.days[3].date, date(4));
        assert_eq!(series.days[3].revenue, Usd::ZERO);
        assert_eq!(series.days[0].revenue, Usd::new(55.0));
    }

    #[test]
    fn build_fn_leaves_moving_average_empty_for_first_six_days() {
        let series = fixture_series(date(31));
        assert!(series.days[..6].iter().all(|d| d.moving_average.is_none()));
        let avg = series.days[6].moving_average.unwrap();
        assert!((avg.dollars() - 153.5 / 7.0).abs() < 1e-9);
        let avg = series.days[7].moving_average.unwrap();
        assert!((avg.dollars() - 118.5 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn build_fn_drops_today_when_it_is_the_last_sale_day() {
        let series = fixture_series(date(10));
        assert_eq!(series.range(), Some((date(1), date(9))));
        assert_eq!(series.len(), 9);
    }

    #[test]
    fn build_fn_keeps_later_days_when_today_is_inside_the_range() {
        let series = fixture_series(date(5));
        assert_eq!(series.range(), Some((date(1), date(10))));
        assert_eq!(series.len(), 10);
    }

    #[test]
    fn build_fn_is_empty_for_no_sales() {
        let series = DailySeries::build(&[], date(1));
        assert!(series.is_empty());
        assert_eq!(series.range(), None);
    }
}

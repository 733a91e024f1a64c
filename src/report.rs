use chrono::NaiveDate;
use log::{info, warn};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};

use std::{fmt::Display, path::Path};

use crate::{
    chart::{render_chart, ChartError, DataBlock},
    cost::CostTable,
    daily::DailySeries,
    error::Result,
    filter::KeywordFilter,
    inventory, returns,
    returns::{ReasonBreakdown, ReturnsReport},
    sales,
    source::Sources,
    summary::ProductSummary,
    usd::Usd,
};

const COVER: &str = "cover page";
const IN_STOCK: &str = "in stock";
const GROSS_SALES: &str = "gross sales";
const RETURNS: &str = "returns";
const RETURNS_BY_REASON: &str = "returns by reason";

const GRAND_TOTALS: &str = "Grand Totals";
const NO_RETURNS: &str = "No returns for this brand/timeframe.";

/// Where the daily series is written on the cover page, to the right of the
/// chart.
const DAILY_DATA: DataBlock<'static> = DataBlock {
    sheet: COVER,
    header_row: 0,
    date_col: 15,
    revenue_col: 16,
    average_col: 17,
};

/// Holds the reconciled sales, returns and stock tables for one keyword.
///
/// To build a `Report`, use [`Report::build`].
///
/// To save it as a spreadsheet, use [`Report::write_xlsx`], naming the file
/// with [`Report::file_name`].
///
/// To get a printable summary, use its [`Display`] implementation.
#[derive(Debug)]
pub struct Report {
    keyword: String,
    pub sales: ProductSummary,
    pub returns: ReturnsReport,
    pub inventory: ProductSummary,
    pub daily: DailySeries,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Report {
    /// Runs the whole reconciliation over `sources`, keeping only products
    /// whose names contain `keyword`.
    ///
    /// `today` is used to leave the current, incomplete day out of the
    /// daily series.
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// * There are no usable vendor costs
    /// * No sales match `keyword`
    /// * The return reason breakdown doesn't add up
    pub fn build(sources: Sources, keyword: &str, today: NaiveDate) -> Result<Self> {
        let filter = KeywordFilter::new(keyword);
        let costs = CostTable::build(sources.costs)?;

        let sold = sales::prepare(sources.sales, &filter)?;
        let daily = DailySeries::build(&sold, today);
        let first = sold.iter().map(|s| s.purchase_date).min().unwrap_or(today);
        let last = sold.iter().map(|s| s.purchase_date).max().unwrap_or(today);
        let (start, end) = daily.range().unwrap_or((first, last));

        let stock = inventory::prepare(sources.inventory, &filter);
        let returned = returns::prepare(sources.returns, &filter);

        Ok(Self {
            keyword: filter.keyword().to_string(),
            sales: sales::summarize(&sold),
            returns: returns::reconcile(&returned, &sold)?,
            inventory: inventory::summarize(&stock, &costs),
            daily,
            start,
            end,
        })
    }

    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Returns the report's title, e.g. `"Acme Sales"`.
    #[must_use]
    pub fn title(&self) -> String {
        let keyword = title_case(&self.keyword);
        if keyword.is_empty() {
            "Sales".to_string()
        } else {
            format!("{keyword} Sales")
        }
    }

    /// Returns the spreadsheet file name, e.g.
    /// `"Acme Sales 03-01-2024 through 03-10-2024.xlsx"`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let title: String = self
            .title()
            .chars()
            .map(|c| if r#"/\:*?"<>|"#.contains(c) { '-' } else { c })
            .collect();
        format!(
            "{title} {} through {}.xlsx",
            self.start.format("%m-%d-%Y"),
            self.end.format("%m-%d-%Y")
        )
    }

    /// Returns the headline figures shown on the cover page.
    #[must_use]
    pub fn stats(&self) -> CoverStats {
        let net_revenue = self.sales.totals.amount - self.returns.summary.totals.amount;
        let net_units = self.sales.totals.quantity - self.returns.summary.totals.quantity;
        let days = i64::try_from(self.daily.len().max(1)).unwrap_or(i64::MAX);
        #[allow(clippy::cast_precision_loss)]
        let avg_daily_revenue = Usd::new(net_revenue.dollars() / days as f64);
        #[allow(clippy::cast_precision_loss)]
        let return_rate = (net_units > 0)
            .then(|| self.returns.summary.totals.quantity as f64 / net_units as f64);
        let low = net_units.div_euclid(days);
        let high = low + i64::from(net_units.rem_euclid(days) != 0);
        CoverStats {
            net_revenue,
            net_units,
            avg_daily_revenue,
            avg_daily_units: (low, high),
            return_rate,
        }
    }

    /// Writes the report to a new spreadsheet at `path`.
    ///
    /// The cover page holds the headline figures and the daily revenue
    /// chart. If the chart can't be drawn, the cover page is hidden; if
    /// there were no returns, so is the returns-by-reason sheet.
    ///
    /// # Errors
    ///
    /// Returns any errors from building or saving the spreadsheet.
    pub fn write_xlsx(&self, path: impl AsRef<Path>) -> Result<()> {
        let formats = Formats::new();
        let mut workbook = Workbook::new();

        let cover = workbook.add_worksheet().set_name(COVER)?;
        let charted = self.write_cover(cover, &formats)?;

        let sheet = workbook.add_worksheet().set_name(IN_STOCK)?;
        write_products(
            sheet,
            ["sku", "product-name", "total cost", "quantity"],
            &self.inventory,
            &formats,
        )?;
        let sheet = workbook.add_worksheet().set_name(GROSS_SALES)?;
        write_products(
            sheet,
            ["sku", "product-name", "gross revenue", "quantity"],
            &self.sales,
            &formats,
        )?;
        let sheet = workbook.add_worksheet().set_name(RETURNS)?;
        write_products(
            sheet,
            ["sku", "product-name", "returned revenue", "quantity"],
            &self.returns.summary,
            &formats,
        )?;
        let sheet = workbook.add_worksheet().set_name(RETURNS_BY_REASON)?;
        write_reasons(sheet, &self.returns.reasons, &formats)?;
        if self.returns.is_empty() {
            sheet.set_hidden(true);
        }

        if !charted {
            workbook.worksheet_from_name(IN_STOCK)?.set_active(true);
            workbook.worksheet_from_name(COVER)?.set_hidden(true);
        }
        workbook.save(path.as_ref())?;
        info!("saved {}", path.as_ref().display());
        Ok(())
    }

    /// Fills the cover page, returning `false` if the chart was left out.
    fn write_cover(&self, sheet: &mut Worksheet, formats: &Formats) -> Result<bool> {
        sheet.write_string_with_format(0, 0, self.title(), &formats.title)?;
        sheet.write_string(
            1,
            0,
            format!(
                "{} - {}",
                self.start.format("%B %d, %Y"),
                self.end.format("%B %d, %Y")
            ),
        )?;

        let stats = self.stats();
        sheet.write_string_with_format(3, 0, "Net Revenue", &formats.header)?;
        sheet.write_number_with_format(3, 1, stats.net_revenue.dollars(), &formats.currency)?;
        sheet.write_string_with_format(4, 0, "Net Units Sold", &formats.header)?;
        sheet.write_number_with_format(4, 1, stats.net_units as f64, &formats.count)?;
        sheet.write_string_with_format(5, 0, "Avg Daily Revenue", &formats.header)?;
        sheet.write_number_with_format(5, 1, stats.avg_daily_revenue.dollars(), &formats.currency)?;
        sheet.write_string_with_format(6, 0, "Avg Daily Units Sold", &formats.header)?;
        let (low, high) = stats.avg_daily_units;
        sheet.write_string(6, 1, format!("{low}-{high}"))?;
        sheet.write_string_with_format(7, 0, "Overall Return Rate", &formats.header)?;
        match stats.return_rate {
            Some(rate) => sheet.write_number_with_format(7, 1, rate, &formats.percent)?,
            None => sheet.write_string(7, 1, "n/a")?,
        };

        self.write_daily(sheet, formats)?;
        sheet.set_column_width(0, 22)?;
        sheet.set_column_width(1, 14)?;

        match self.add_chart(sheet) {
            Ok(()) => Ok(true),
            Err(ChartError::InsufficientRange { days }) => {
                warn!("only {days} day(s) of sales, leaving out the chart");
                Ok(false)
            }
            Err(err) => {
                warn!("leaving out the chart: {err}");
                Ok(false)
            }
        }
    }

    fn write_daily(&self, sheet: &mut Worksheet, formats: &Formats) -> Result<()> {
        let data = DAILY_DATA;
        sheet.write_string_with_format(data.header_row, data.date_col, "Date", &formats.header)?;
        sheet.write_string_with_format(data.header_row, data.revenue_col, "Revenue", &formats.header)?;
        sheet.write_string_with_format(data.header_row, data.average_col, "7-Day Average", &formats.header)?;
        for (row, day) in (data.header_row + 1..).zip(&self.daily.days) {
            sheet.write_string(row, data.date_col, day.date.format("%Y-%m-%d").to_string())?;
            sheet.write_number_with_format(row, data.revenue_col, day.revenue.dollars(), &formats.currency)?;
            if let Some(average) = day.moving_average {
                sheet.write_number_with_format(row, data.average_col, average.dollars(), &formats.currency)?;
            }
        }
        sheet.set_column_width(data.date_col, 12)?;
        sheet.set_column_width(data.revenue_col, 12)?;
        sheet.set_column_width(data.average_col, 14)?;
        Ok(())
    }

    fn add_chart(&self, sheet: &mut Worksheet) -> std::result::Result<(), ChartError> {
        let title = format!(
            "{}, {} - {}",
            self.title(),
            self.start.format("%B %d, %Y"),
            self.end.format("%B %d, %Y")
        );
        let chart = render_chart(&self.daily, &title, &DAILY_DATA)?;
        sheet.insert_chart(9, 0, &chart)?;
        Ok(())
    }
}

/// Headline figures for the cover page. Net figures are sales less returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverStats {
    pub net_revenue: Usd,
    pub net_units: i64,
    pub avg_daily_revenue: Usd,
    /// Average net units per day, rounded down and up.
    pub avg_daily_units: (i64, i64),
    /// Units returned per net unit sold; `None` if nothing was sold net.
    pub return_rate: Option<f64>,
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .sales
            .rows
            .iter()
            .map(|r| r.product_name.len())
            .max()
            .unwrap_or_default()
            .max(GRAND_TOTALS.len());
        writeln!(f, "{} ({} to {})", self.title(), self.start, self.end)?;
        writeln!(f, "{:width$} {:>6} {:>12}", "Product", "Units", "Revenue")?;
        let length = width + 20;
        writeln!(f, "{:-<length$}", "")?;
        for row in &self.sales.rows {
            writeln!(f, "{:width$} {:6} {:>12}", row.product_name, row.quantity, row.amount)?;
        }
        writeln!(f, "{:-<length$}", "")?;
        let totals = self.sales.totals;
        writeln!(f, "{GRAND_TOTALS:width$} {:6} {:>12}", totals.quantity, totals.amount)?;
        let returned = self.returns.summary.totals;
        writeln!(f, "{:width$} {:6} {:>12}", "Returned", returned.quantity, returned.amount)?;
        let stock = self.inventory.totals;
        writeln!(f, "{:width$} {:6} {:>12}", "In stock", stock.quantity, stock.amount)?;
        Ok(())
    }
}

struct Formats {
    title: Format,
    header: Format,
    currency: Format,
    count: Format,
    percent: Format,
    total_label: Format,
    total_currency: Format,
    total_count: Format,
    total_percent: Format,
}

impl Formats {
    fn new() -> Self {
        let total = Format::new().set_bold().set_background_color(Color::Yellow);
        Self {
            title: Format::new().set_bold().set_font_size(18),
            header: Format::new().set_bold().set_align(FormatAlign::Center),
            currency: Format::new().set_num_format("$#,##0.00"),
            count: Format::new().set_num_format("#,##0"),
            percent: Format::new().set_num_format("0.00%"),
            total_label: total.clone(),
            total_currency: total.clone().set_num_format("$#,##0.00"),
            total_count: total.clone().set_num_format("#,##0"),
            total_percent: total.set_num_format("0.00%"),
        }
    }
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], formats: &Formats) -> Result<()> {
    for (col, header) in (0..).zip(headers) {
        sheet.write_string_with_format(0, col, *header, &formats.header)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Writes a product table with its grand totals as the last row.
fn write_products(
    sheet: &mut Worksheet,
    headers: [&str; 4],
    summary: &ProductSummary,
    formats: &Formats,
) -> Result<()> {
    write_headers(sheet, &headers, formats)?;
    let mut row = 1;
    for product in &summary.rows {
        sheet.write_string(row, 0, &product.sku)?;
        sheet.write_string(row, 1, &product.product_name)?;
        sheet.write_number_with_format(row, 2, product.amount.dollars(), &formats.currency)?;
        sheet.write_number_with_format(row, 3, product.quantity as f64, &formats.count)?;
        row += 1;
    }
    sheet.write_string_with_format(row, 0, GRAND_TOTALS, &formats.total_label)?;
    sheet.write_string_with_format(row, 1, "", &formats.total_label)?;
    sheet.write_number_with_format(row, 2, summary.totals.amount.dollars(), &formats.total_currency)?;
    sheet.write_number_with_format(row, 3, summary.totals.quantity as f64, &formats.total_count)?;
    sheet.autofit();
    Ok(())
}

fn write_reasons(sheet: &mut Worksheet, reasons: &ReasonBreakdown, formats: &Formats) -> Result<()> {
    write_headers(
        sheet,
        &["reason for return", "quantity", "percent of all returns"],
        formats,
    )?;
    match reasons {
        ReasonBreakdown::Reasons {
            rows,
            total_quantity,
            total_share,
        } => {
            let mut row = 1;
            for reason in rows {
                sheet.write_string(row, 0, &reason.reason)?;
                sheet.write_number_with_format(row, 1, reason.quantity as f64, &formats.count)?;
                sheet.write_number_with_format(row, 2, reason.share, &formats.percent)?;
                row += 1;
            }
            sheet.write_string_with_format(row, 0, GRAND_TOTALS, &formats.total_label)?;
            sheet.write_number_with_format(row, 1, *total_quantity as f64, &formats.total_count)?;
            sheet.write_number_with_format(row, 2, *total_share, &formats.total_percent)?;
        }
        ReasonBreakdown::NoReturns => {
            sheet.write_string(1, 0, NO_RETURNS)?;
            sheet.write_number_with_format(1, 1, 0.0, &formats.count)?;
            sheet.write_number_with_format(1, 2, 0.0, &formats.percent)?;
        }
    }
    sheet.autofit();
    Ok(())
}

/// Capitalises the first letter of each word and lower-cases the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

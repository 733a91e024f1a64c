//! The daily revenue chart on the report's cover page.

use rust_xlsxwriter::{
    Chart, ChartFormat, ChartLegendPosition, ChartLine, ChartType, Color, XlsxError,
};
use thiserror::Error;

use crate::daily::{DailySeries, WINDOW};

#[derive(Error, Debug)]
pub enum ChartError {
    /// The moving average needs at least a full window of days.
    #[error("{days} day(s) of sales is too short a range to chart a {WINDOW}-day average")]
    InsufficientRange { days: usize },

    #[error("couldn't add the chart: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Where the chart's data lives in the workbook.
///
/// The first row holds column headings; the series starts on the row below.
#[derive(Clone, Copy, Debug)]
pub struct DataBlock<'a> {
    pub sheet: &'a str,
    pub header_row: u32,
    pub date_col: u16,
    pub revenue_col: u16,
    pub average_col: u16,
}

/// Builds a line chart of daily revenue and its trailing average.
///
/// # Errors
///
/// Returns [`ChartError::InsufficientRange`] if the series is shorter than
/// the moving average window, since the average line would be empty.
pub fn render_chart(
    series: &DailySeries,
    title: &str,
    data: &DataBlock<'_>,
) -> Result<Chart, ChartError> {
    if series.len() < WINDOW {
        return Err(ChartError::InsufficientRange { days: series.len() });
    }
    let first = data.header_row + 1;
    #[allow(clippy::cast_possible_truncation)]
    let last = data.header_row + series.len() as u32;

    let mut chart = Chart::new(ChartType::Line);
    chart
        .add_series()
        .set_name("Daily Revenue")
        .set_categories((data.sheet, first, data.date_col, last, data.date_col))
        .set_values((data.sheet, first, data.revenue_col, last, data.revenue_col));
    chart
        .add_series()
        .set_name(format!("{WINDOW}-Day Average").as_str())
        .set_categories((data.sheet, first, data.date_col, last, data.date_col))
        .set_values((data.sheet, first, data.average_col, last, data.average_col))
        .set_format(ChartFormat::new().set_line(ChartLine::new().set_color(Color::Red)));
    chart.title().set_name(title);
    chart.y_axis().set_name("Daily Revenue").set_num_format("$#,##0");
    chart.legend().set_position(ChartLegendPosition::Bottom);
    chart.set_width(1100).set_height(480);
    Ok(chart)
}

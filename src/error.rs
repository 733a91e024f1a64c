use std::path::PathBuf;

use thiserror::Error;

use crate::source::Category;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(
        "one or more of the files required to run this report is missing (no {} files found); \
         please check the README and try again",
        list(.0)
    )]
    MissingSources(Vec<Category>),

    #[error(
        "{}: missing column(s) {}; please review your files, one or more columns is missing",
        .path.display(),
        .missing.join(", ")
    )]
    Schema { path: PathBuf, missing: Vec<String> },

    #[error(
        "please review your {category} file(s), it appears you have some non-numeric data in them ({}: {source})",
        .path.display()
    )]
    NonNumeric {
        category: Category,
        path: PathBuf,
        source: csv::Error,
    },

    #[error("your cost file(s) are empty; please supply a file with SKU and VENDOR COST columns")]
    EmptyCost,

    #[error("there are no sales for the keyword/brand name {keyword:?} in your sales file(s)")]
    NoSales { keyword: String },

    #[error("internal consistency check failed: {0}")]
    Inconsistent(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

fn list(categories: &[Category]) -> String {
    categories
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReportError>;

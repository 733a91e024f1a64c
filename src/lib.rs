#![doc = include_str!("../README.md")]
pub mod chart;
pub mod cost;
pub mod daily;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod report;
pub mod returns;
pub mod sales;
pub mod source;
pub mod summary;
pub mod usd;

pub use error::{ReportError, Result};
pub use filter::KeywordFilter;
pub use report::Report;
pub use source::{Category, Sources};
pub use usd::Usd;

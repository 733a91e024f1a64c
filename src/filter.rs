use regex::{Regex, RegexBuilder};

use crate::source::{InventoryRecord, ReturnRecord, SaleRecord};

/// Records that carry a product name the keyword filter can test.
pub trait ProductName {
    fn product_name(&self) -> &str;
}

impl ProductName for SaleRecord {
    fn product_name(&self) -> &str {
        &self.product_name
    }
}

impl ProductName for ReturnRecord {
    fn product_name(&self) -> &str {
        &self.product_name
    }
}

impl ProductName for InventoryRecord {
    fn product_name(&self) -> &str {
        &self.product_name
    }
}

/// Selects products whose name contains a brand or keyword.
///
/// Matching is case-insensitive and by substring, so `"go"` matches
/// `"For the Love of Go"` and `"Gopher plush"`. The keyword is taken
/// literally, never as a pattern. An empty or all-whitespace keyword
/// matches everything.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keyword: String,
    regex: Option<Regex>,
}

impl KeywordFilter {
    /// Creates a filter for `keyword`, ignoring surrounding whitespace.
    ///
    /// # Panics
    ///
    /// If the escaped keyword doesn't compile, which can't happen for a
    /// literal pattern.
    #[must_use]
    pub fn new(keyword: &str) -> Self {
        let keyword = keyword.trim().to_string();
        let regex = (!keyword.is_empty()).then(|| {
            RegexBuilder::new(&regex::escape(&keyword))
                .case_insensitive(true)
                .build()
                .expect("escaped literal is a valid regex")
        });
        Self { keyword, regex }
    }

    /// Returns the trimmed keyword, which is empty when nothing is filtered.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    #[must_use]
    pub fn matches(&self, product_name: &str) -> bool {
        self.regex.as_ref().map_or(true, |re| re.is_match(product_name))
    }

    /// Keeps the records whose product name matches.
    ///
    /// Each table is filtered on its own product names, so a SKU named
    /// differently in two exports can be kept in one and dropped from the
    /// other.
    pub fn apply<T: ProductName>(&self, records: Vec<T>) -> Vec<T> {
        records
            .into_iter()
            .filter(|r| self.matches(r.product_name()))
            .collect()
    }
}

use log::{info, warn};

use std::collections::{hash_map::Entry, HashMap};

use crate::{
    error::{ReportError, Result},
    source::CostRecord,
    usd::Usd,
};

/// Vendor unit costs by SKU.
#[derive(Debug, Default)]
pub struct CostTable {
    costs: HashMap<String, Usd>,
}

impl CostTable {
    /// Builds the lookup from every cost record read.
    ///
    /// When a SKU is listed more than once, its first cost wins. Rows with
    /// a blank cost are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::EmptyCost`] if there are no usable costs.
    pub fn build(records: Vec<CostRecord>) -> Result<Self> {
        let mut costs = HashMap::new();
        for record in records {
            let Some(cost) = record.vendor_cost else {
                continue;
            };
            match costs.entry(record.sku) {
                Entry::Vacant(e) => {
                    e.insert(cost);
                }
                Entry::Occupied(e) => {
                    warn!("duplicate vendor cost for SKU {}, keeping {}", e.key(), e.get());
                }
            }
        }
        if costs.is_empty() {
            return Err(ReportError::EmptyCost);
        }
        info!("{} vendor costs", costs.len());
        Ok(Self { costs })
    }

    #[must_use]
    pub fn get(&self, sku: &str) -> Option<Usd> {
        self.costs.get(sku).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

use tracing::debug;

use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::models::{DateRange, RiskRecord};

/// One store's rows within a month range, oldest first. Never empty.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub range: DateRange,
    rows: Vec<&'a RiskRecord>,
}

impl<'a> Selection<'a> {
    pub fn rows(&self) -> &[&'a RiskRecord] {
        &self.rows
    }

    /// Most recent month inside the range, not necessarily overall.
    pub fn latest(&self) -> &'a RiskRecord {
        // Construction guarantees at least one row.
        self.rows[self.rows.len() - 1]
    }
}

pub fn select<'a>(dataset: &'a Dataset, store_id: &str, range: DateRange) -> Result<Selection<'a>> {
    let mut rows: Vec<&RiskRecord> = dataset
        .records()
        .iter()
        .filter(|record| record.store_id == store_id)
        .collect();
    rows.sort_by_key(|record| record.year_month);
    rows.retain(|record| range.contains(record.year_month));

    debug!(store = store_id, %range, rows = rows.len(), "selection computed");

    if rows.is_empty() {
        return Err(DashboardError::SelectionEmpty {
            store: store_id.to_string(),
            range: range.to_string(),
        });
    }

    Ok(Selection {
        range,
        rows,
    })
}

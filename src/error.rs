use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dataset {} is unavailable: {reason}", .path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("no rows for store {store} in {range}")]
    SelectionEmpty { store: String, range: String },

    #[error("no rows to average for {key}")]
    EmptyGroup { key: String },

    #[error("unknown risk level '{0}'")]
    UnknownRiskLevel(String),

    #[error("invalid year-month '{0}' (expected YYYYMM or YYYY-MM)")]
    InvalidYearMonth(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

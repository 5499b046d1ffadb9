use chrono::NaiveDate;
use thiserror::Error;

/// Request-level failures surfaced to the caller.
///
/// Source outages never appear here; they are absorbed at the adapter
/// boundary (see [`crate::adapter::collect_daily`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("end_date {end} must be on or after start_date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("date range too large: {days} days (max {max})")]
    RangeTooLong { days: i64, max: i64 },

    #[error("invalid {field} '{value}' (expected YYYY-MM-DD)")]
    MalformedDate { field: &'static str, value: String },
}

impl CoreError {
    /// Name of the request field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CoreError::InvalidRange { .. } => Some("end_date"),
            CoreError::RangeTooLong { .. } => Some("start_date"),
            CoreError::MalformedDate { field, .. } => Some(field),
        }
    }
}

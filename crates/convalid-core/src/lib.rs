//! Cross-source conversion reconciliation: source contract, daily alignment,
//! variance and insights.

pub mod adapter;
pub mod aligner;
pub mod comparison;
pub mod config;
pub mod error;
pub mod insights;
pub mod metric;
pub mod range;

pub use adapter::{SourceAdapter, SourceUnavailable};
pub use comparison::{Comparator, ComparisonResult};
pub use error::CoreError;
pub use metric::{DailyMetric, Source};
pub use range::DateRange;

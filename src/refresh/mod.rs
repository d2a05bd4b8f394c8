mod aggregator;
mod fallback;
mod fetch;

pub use aggregator::{DashboardAggregator, PublishedSnapshot, RefreshReport};
pub use fetch::SourceFailure;

pub const HEALTH_STATUS_HEALTHY: &str = "Healthy";
pub const HEALTH_STATUS_ERROR: &str = "Error";

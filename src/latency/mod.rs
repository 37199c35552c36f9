pub mod aggregator;
pub mod buffer;
pub mod report;
pub mod stream;

pub use aggregator::{Aggregator, FlushStats};
pub use buffer::{RouteTally, StagingBuffer};
pub use report::{build_report, format_ms, OverallMean, Report, RouteAverage};

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// A single timing observation handed over by the instrumentation hook.
/// Never persisted; it only lives until it is folded into the staging buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Matched route template, e.g. "/api/users/:id", or the raw path
    pub route: String,
    /// Wall time until the response started sending (ms)
    pub latency_ms: f64,
    pub observed_at: DateTime<Utc>,
}

impl Sample {
    /// Build a sample stamped with the current time.
    ///
    /// Callers are expected to clamp clock skew themselves; a negative or
    /// non-finite latency is rejected rather than silently corrected.
    pub fn new(route: impl Into<String>, latency_ms: f64) -> Result<Self, ValidationError> {
        let route = route.into();
        if route.is_empty() {
            return Err(ValidationError::Sample("route must not be empty"));
        }
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(ValidationError::Sample("latency must be a finite, non-negative number"));
        }
        Ok(Self {
            route,
            latency_ms,
            observed_at: Utc::now(),
        })
    }
}

//! Per-route response latency aggregation.
//!
//! An axum middleware times each response and hands `(route, ms)` to an
//! [`Aggregator`](latency::Aggregator), which stages samples in memory and
//! periodically commits them to an [`AggregateStore`](store::AggregateStore)
//! as commuting count/total increments. The admin surface reads back a
//! ranked [`Report`](latency::Report) of average latency per route.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod latency;
pub mod middleware;
pub mod redis_client;
pub mod server;
pub mod settings;
pub mod store;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Durable owner of the per-route aggregate.
    pub store: Arc<dyn store::AggregateStore>,

    /// Key names under the configured prefix.
    pub keys: store::Keys,

    /// Staging buffer + flush scheduler fed by the timing middleware.
    pub aggregator: Arc<latency::Aggregator>,

    /// Route name the timing hook records for unmatched requests.
    pub unmatched_route: Option<String>,
}

impl AppState {
    pub fn new(aggregator: Arc<latency::Aggregator>) -> Self {
        Self {
            store: aggregator.store().clone(),
            keys: aggregator.keys().clone(),
            aggregator,
            unmatched_route: None,
        }
    }

    pub fn with_unmatched_route(mut self, route: Option<String>) -> Self {
        self.unmatched_route = route;
        self
    }
}

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self as axum_mw, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::latency::Aggregator;
use crate::settings::Settings;

/// State carried by the timing middleware.
#[derive(Clone)]
pub struct TimingHook {
    pub aggregator: Arc<Aggregator>,

    /// Route name recorded for requests no route matched. `None` records the
    /// raw path, which lets arbitrary 404 paths grow the aggregate.
    pub unmatched_route: Option<Arc<str>>,
}

impl TimingHook {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            unmatched_route: None,
        }
    }

    pub fn with_unmatched_route(mut self, route: Option<&str>) -> Self {
        self.unmatched_route = route.map(Arc::from);
        self
    }
}

/// Wrap `router` with latency instrumentation when `settings.enabled`.
///
/// The decision is taken once, here. Saving different settings later does
/// not attach or detach the hook on an already-built router.
pub fn attach<S>(router: Router<S>, hook: TimingHook, settings: &Settings) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if !settings.enabled {
        tracing::info!("latency instrumentation disabled");
        return router;
    }
    tracing::info!(
        unmatched_route = hook.unmatched_route.as_deref(),
        "latency instrumentation attached"
    );
    router.layer(axum_mw::from_fn_with_state(hook, timing_middleware))
}

/// Times every response and hands the result to the aggregator.
///
///   route          — matched template (`/api/users/:id`), else the
///                    configured unmatched name, else the raw path
///   Server-Timing  — the same measurement in the standard header format
///
/// Elapsed time runs until the response head is ready, which is when it
/// starts sending. Recording never blocks or fails the response.
pub async fn timing_middleware(
    State(hook): State<TimingHook>,
    req: Request,
    next: Next,
) -> Response {
    let route = match (req.extensions().get::<MatchedPath>(), &hook.unmatched_route) {
        (Some(matched), _) => matched.as_str().to_owned(),
        (None, Some(fixed)) => fixed.to_string(),
        (None, None) => req.uri().path().to_owned(),
    };

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    hook.aggregator.record(route, elapsed_ms);

    let server_timing = format!("total;dur={elapsed_ms:.3}");
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    response
}

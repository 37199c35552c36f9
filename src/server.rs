use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::admin;
use crate::latency::stream;
use crate::middleware::timing::{self, TimingHook};
use crate::settings::Settings;
use crate::AppState;

/// Builds the full Axum `Router`: admin surface, health check, middleware.
///
/// `settings` are the ones loaded at startup; they decide whether the
/// timing hook wraps the routes.
pub fn create_router(state: Arc<AppState>, settings: &Settings) -> Router {
    let hook = TimingHook::new(state.aggregator.clone())
        .with_unmatched_route(state.unmatched_route.as_deref());

    let router = Router::new()
        // ── Report & admin ──────────────────────────────────────
        .route("/api/admin/latency", get(admin::get_report))
        .route(
            "/api/admin/latency/save",
            get(admin::save_settings_query).post(admin::save_settings_body),
        )
        .route("/api/admin/latency/clear", get(admin::clear_all))
        .route("/api/admin/latency/flush", post(admin::flush))
        .route("/api/admin/latency/stream", get(stream::report_stream))
        // ── Liveness ────────────────────────────────────────────
        .route("/api/health", get(admin::health))
        // ── Provide shared state to all routes above ────────────
        .with_state(state);

    // ── Global middleware (applied bottom-up) ───────────────────
    timing::attach(router, hook, settings)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

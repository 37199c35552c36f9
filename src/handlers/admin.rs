use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::latency::report::{build_report, Report, DEFAULT_LIMIT};
use crate::latency::FlushStats;
use crate::settings::Settings;
use crate::AppState;

use super::{Ack, AppError};

/// Upper bound on `?limit=`; keeps a single report to one bounded range query.
pub const MAX_LIMIT: usize = 1000;

// ─── Request types ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub limit: Option<usize>,
}

impl ReportQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveQuery {
    /// JSON-encoded `Settings`
    pub settings: String,
}

// ─── GET /api/admin/latency ──────────────────────────────────────

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<Report>, AppError> {
    let Query(query) = query?;
    let report = build_report(state.store.as_ref(), &state.keys, query.limit()).await?;
    Ok(Json(report))
}

// ─── GET /api/admin/latency/save?settings=… ──────────────────────

pub async fn save_settings_query(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SaveQuery>, QueryRejection>,
) -> Result<Json<Ack>, AppError> {
    let Query(query) = query?;
    Settings::save(state.store.as_ref(), &state.keys, &query.settings).await?;
    Ok(Ack::ok())
}

// ─── POST /api/admin/latency/save ────────────────────────────────
/// Takes the raw body so malformed JSON surfaces as our own 400 envelope.

pub async fn save_settings_body(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<Ack>, AppError> {
    Settings::save(state.store.as_ref(), &state.keys, &body).await?;
    Ok(Ack::ok())
}

// ─── GET /api/admin/latency/clear ────────────────────────────────

pub async fn clear_all(State(state): State<Arc<AppState>>) -> Result<Json<Ack>, AppError> {
    state.aggregator.clear_all().await?;
    Ok(Ack::ok())
}

// ─── POST /api/admin/latency/flush ───────────────────────────────

pub async fn flush(State(state): State<Arc<AppState>>) -> Result<Json<FlushStats>, AppError> {
    Ok(Json(state.aggregator.flush_now().await?))
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "pending_routes": state.aggregator.pending_routes(),
    }))
}

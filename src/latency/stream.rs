use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::report::build_report;
use crate::handlers::admin::ReportQuery;
use crate::handlers::AppError;
use crate::AppState;

// ─── GET /api/admin/latency/stream ───────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a freshly built `Report` as JSON every second. A store error is
/// sent as an `error` event instead of closing the stream.

pub async fn report_stream(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Query(query) = query?;
    let limit = query.limit();
    let interval = tokio::time::interval(Duration::from_secs(1));

    let stream = IntervalStream::new(interval).then(move |_| {
        let state = state.clone();
        async move {
            let event = match build_report(state.store.as_ref(), &state.keys, limit).await {
                Ok(report) => {
                    let json = serde_json::to_string(&report).unwrap_or_default();
                    Event::default().data(json)
                }
                Err(e) => Event::default().event("error").data(e.to_string()),
            };
            Ok(event)
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

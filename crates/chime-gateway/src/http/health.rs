use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns scheduler counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "passes_run": state.passes_run.load(Ordering::Relaxed),
        "tasks_completed": state.tasks_completed.load(Ordering::Relaxed),
        "cached_entries": state.cache.len(),
    }))
}

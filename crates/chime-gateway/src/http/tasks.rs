use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use chime_scheduler::store::{TaskRegistry, REGISTRY_CACHE_GROUP};
use chime_scheduler::types::TaskKind;

use crate::app::AppState;

/// Tier the gateway serves registry snapshots from.
const GATEWAY_TIER: i64 = 0;

/// GET /tasks — registry listing for operators, served through the cache.
///
/// The cache entry is dropped by the store on every run-state write, so a
/// listing taken after a pass always shows the fresh `last_run` values.
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    if let Some(cached) = state.cache.get(REGISTRY_CACHE_GROUP, GATEWAY_TIER) {
        return Json(cached);
    }

    let tasks = match state.store.load_tasks(TaskKind::Job) {
        Ok(tasks) => tasks,
        Err(e) => return Json(json!({ "error": e.to_string() })),
    };

    let value = json!({ "tasks": tasks });
    state
        .cache
        .put(REGISTRY_CACHE_GROUP, GATEWAY_TIER, value.clone());
    Json(value)
}

use std::sync::Arc;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use tracing::debug;

use crate::app::AppState;

/// Opportunistic scheduler trigger: once the handler has produced its
/// response, kick a self-throttled pass on the blocking pool and return the
/// response untouched. Request latency is unaffected; the driver's own
/// throttle row decides whether anything beyond a single row read happens.
pub async fn after_respond(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    let state = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        if let Some(pass) = state.driver.run_if_due() {
            state.record_pass();
            debug!(
                triggered = pass.triggered.len(),
                elapsed_secs = pass.finished_at - pass.started_at,
                "opportunistic pass completed"
            );
        }
    });

    response
}

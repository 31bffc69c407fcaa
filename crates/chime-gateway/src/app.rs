use axum::{routing::get, Router};
use chime_core::config::ChimeConfig;
use chime_scheduler::driver::SchedulerDriver;
use chime_scheduler::store::SqliteStore;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::cache::RegistryCache;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ChimeConfig,
    pub driver: Arc<SchedulerDriver>,
    pub store: Arc<SqliteStore>,
    pub cache: Arc<RegistryCache>,
    /// Tasks completed since boot, bumped by the TaskCompleted observer.
    pub tasks_completed: Arc<AtomicU64>,
    /// Opportunistic passes that actually fired since boot.
    pub passes_run: AtomicU64,
}

impl AppState {
    pub fn new(
        config: ChimeConfig,
        driver: Arc<SchedulerDriver>,
        store: Arc<SqliteStore>,
        cache: Arc<RegistryCache>,
        tasks_completed: Arc<AtomicU64>,
    ) -> Self {
        Self {
            config,
            driver,
            store,
            cache,
            tasks_completed,
            passes_run: AtomicU64::new(0),
        }
    }

    pub fn record_pass(&self) {
        self.passes_run.fetch_add(1, Ordering::Relaxed);
    }
}

/// Assemble the full Axum router. The after-respond middleware wraps every
/// route, so any request can opportunistically kick a scheduling pass.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/tasks", get(crate::http::tasks::list_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::trigger::after_respond,
        ))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

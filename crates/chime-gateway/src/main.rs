use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

mod app;
mod cache;
mod http;
mod trigger;

use chime_core::config::ChimeConfig;
use chime_core::types::TaskDescriptor;
use chime_hooks::{DispatchEngine, DispatchEvent, HandlerDefinition, TaskHandler};
use chime_scheduler::clock::SystemClock;
use chime_scheduler::db;
use chime_scheduler::driver::{SchedulerDriver, SilentObserver};
use chime_scheduler::invoker::DispatchInvoker;
use chime_scheduler::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chime_gateway=info,scheduler=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > CHIME_CONFIG env > ~/.chime/chime.toml
    let config_path = std::env::var("CHIME_CONFIG").ok();
    let config = ChimeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ChimeConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    config.ensure_db_dir()?;
    let db_path = &config.database.path;
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    db::init_db(&conn)?;
    db::ensure_scheduler_row(
        &conn,
        config.scheduler.cache_timeout,
        config.scheduler.default_unit,
    )?;
    info!("database migrations complete");

    // The cache doubles as the store's invalidation sink: a run-state write
    // anywhere in this process drops the cached registry snapshots.
    let registry_cache = Arc::new(cache::RegistryCache::new());
    let store = Arc::new(SqliteStore::new(conn, registry_cache.clone()));

    let engine = Arc::new(DispatchEngine::new());
    engine.register(HandlerDefinition::new(
        "heartbeat",
        DispatchEvent::ExecuteScheduledTask,
        Arc::new(HeartbeatHandler),
    ));
    let tasks_completed = Arc::new(AtomicU64::new(0));
    engine.register(
        HandlerDefinition::new(
            "completion-counter",
            DispatchEvent::TaskCompleted,
            Arc::new(CompletionCounter {
                counter: tasks_completed.clone(),
            }),
        )
        .with_priority(100),
    );

    let invoker = Arc::new(DispatchInvoker::new(engine));
    let driver = Arc::new(SchedulerDriver::new(
        store.clone(),
        store.clone(),
        invoker,
        Arc::new(SystemClock),
        Arc::new(SilentObserver),
        config.scheduler.default_unit,
    ));

    let state = Arc::new(app::AppState::new(
        config,
        driver,
        store,
        registry_cache,
        tasks_completed,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Chime gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Built-in job handler so a fresh install has something observable to run.
struct HeartbeatHandler;

impl TaskHandler for HeartbeatHandler {
    fn execute(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        info!(task_id = %task.id, name = %task.name, "heartbeat task executed");
        Ok(())
    }
}

/// Feeds the /health counter without sitting in the trigger path.
struct CompletionCounter {
    counter: Arc<AtomicU64>,
}

impl TaskHandler for CompletionCounter {
    fn execute(&self, _task: &TaskDescriptor) -> anyhow::Result<()> {
        self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

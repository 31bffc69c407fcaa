//! Command-line scheduler entry point, intended to be invoked by an
//! OS-level cron. Every run is one unconditional pass; the per-task
//! due-time checks are the only throttle.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use chime_core::config::ChimeConfig;
use chime_core::types::TaskDescriptor;
use chime_hooks::{DispatchEngine, DispatchEvent, HandlerDefinition, TaskHandler};
use chime_scheduler::clock::SystemClock;
use chime_scheduler::db;
use chime_scheduler::driver::{PassObserver, SchedulerDriver};
use chime_scheduler::invoker::DispatchInvoker;
use chime_scheduler::store::{NullInvalidator, SqliteStore};
use chime_scheduler::types::Task;

/// Trigger due scheduled tasks and exit.
#[derive(Parser)]
#[command(name = "chime-cli", version)]
struct Args {
    /// Path to chime.toml (defaults to ~/.chime/chime.toml).
    #[arg(long)]
    config: Option<String>,

    /// Override the database path from config.
    #[arg(long)]
    db: Option<String>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chime_cli=info,scheduler=info".into()),
        )
        .init();

    println!("Chime scheduler");
    println!("============================");

    let started = Instant::now();

    // Failures are reported on the console, never escalated: the summary
    // always prints and the process always exits 0.
    if let Err(e) = run(&args) {
        println!("Scheduler error: {e}");
    }

    println!(
        "Pass complete in {:.3} seconds.",
        started.elapsed().as_secs_f64()
    );
    match peak_rss_bytes() {
        Some(bytes) => println!("Peak memory usage: {} bytes", format_thousands(bytes)),
        None => println!("Peak memory usage: unavailable"),
    }
    println!();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = ChimeConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ChimeConfig::default()
    });

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    db::init_db(&conn)?;

    let store = Arc::new(SqliteStore::new(conn, Arc::new(NullInvalidator)));

    let engine = Arc::new(DispatchEngine::new());
    engine.register(HandlerDefinition::new(
        "heartbeat",
        DispatchEvent::ExecuteScheduledTask,
        Arc::new(HeartbeatHandler),
    ));
    let invoker = Arc::new(DispatchInvoker::new(engine));

    let driver = SchedulerDriver::new(
        store.clone(),
        store,
        invoker,
        Arc::new(SystemClock),
        Arc::new(ConsoleObserver),
        config.scheduler.default_unit,
    );

    let pass = driver.run_pass();
    info!(triggered = pass.triggered.len(), "cli pass finished");
    Ok(())
}

/// Prints the operator-facing per-task lines.
struct ConsoleObserver;

impl PassObserver for ConsoleObserver {
    fn task_scheduled(&self, task: &Task) {
        println!("Scheduling task:{}:{}", task.id, task.name);
    }

    fn task_completed(&self, task: &Task, duration_secs: f64) {
        println!(
            "Ran task:{}:{} took {:.2} seconds",
            task.id, task.name, duration_secs
        );
    }
}

/// Built-in job handler so a fresh install has something observable to run.
struct HeartbeatHandler;

impl TaskHandler for HeartbeatHandler {
    fn execute(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        info!(task_id = %task.id, name = %task.name, "heartbeat task executed");
        Ok(())
    }
}

/// Peak resident set size, read from /proc/self/status. Linux only; other
/// platforms report it as unavailable.
fn peak_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|l| l.starts_with("VmHWM:"))?;
        let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kb * 1024)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// 1234567 -> "1,234,567".
fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(100000000), "100,000,000");
    }
}

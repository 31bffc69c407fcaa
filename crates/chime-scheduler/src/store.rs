use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chime_core::types::TaskId;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::types::{Task, TaskKind, TaskParams};

/// Cache group holding registry snapshots; cleared after every run-state
/// write so no reader serves a stale `last_run`.
pub const REGISTRY_CACHE_GROUP: &str = "registry";

/// Groups invalidated after a write.
pub const CACHE_GROUPS: &[&str] = &[REGISTRY_CACHE_GROUP];

/// Deployment tiers the host serves. Tier 0 is the public surface, tier 1
/// the operator surface.
pub const CACHE_TIERS: &[i64] = &[0, 1];

/// Read access to the task registry.
pub trait TaskRegistry: Send + Sync {
    /// All rows of `kind`, in listing order.
    fn load_tasks(&self, kind: TaskKind) -> Result<Vec<Task>>;

    /// Fetch a single row by id.
    fn find_task(&self, id: &TaskId) -> Result<Option<Task>>;
}

/// What a run-state update attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new `last_run` was committed; the caller owns this interval.
    Applied,
    /// Another pass updated the row after our snapshot was taken. The task
    /// already ran this interval and must be skipped.
    Superseded,
}

/// Write access to a task's run state, under mutual exclusion.
pub trait RunStateStore: Send + Sync {
    /// Persist `last_run = now` for `task`.
    ///
    /// The read-modify-write runs inside an exclusive transaction. A
    /// concurrent pass either fails fast with
    /// [`SchedulerError::LockUnavailable`] while the lock is held, or
    /// observes the committed timestamp afterwards and gets
    /// [`UpdateOutcome::Superseded`]. Either way at most one caller per due
    /// interval sees [`UpdateOutcome::Applied`] and goes on to invoke the
    /// task.
    fn update_last_run(&self, task: &Task, now: i64) -> Result<UpdateOutcome>;
}

/// Downstream cache of registry rows. Invalidation is best-effort:
/// implementations swallow their own failures.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, groups: &[&str], tiers: &[i64]);
}

/// Invalidator for hosts with no registry cache (the CLI).
pub struct NullInvalidator;

impl CacheInvalidator for NullInvalidator {
    fn invalidate(&self, _groups: &[&str], _tiers: &[i64]) {}
}

/// SQLite-backed registry reader and run-state store.
///
/// Mutual exclusion is the database's own: updates run inside a
/// `BEGIN IMMEDIATE` transaction, which takes the writer lock up front and
/// reports SQLITE_BUSY when another connection holds it. The lock is global
/// to the database file, so gateway and CLI passes serialize against each
/// other even across processes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    cache: Arc<dyn CacheInvalidator>,
}

impl SqliteStore {
    pub fn new(conn: Connection, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            conn: Mutex::new(conn),
            cache,
        }
    }
}

impl TaskRegistry for SqliteStore {
    fn load_tasks(&self, kind: TaskKind) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, kind, params FROM registry
                 WHERE kind = ?1 ORDER BY rowid",
            )
            .map_err(|e| SchedulerError::RegistryUnavailable(e.to_string()))?;

        let tasks = stmt
            .query_map([kind.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| SchedulerError::RegistryUnavailable(e.to_string()))?
            .filter_map(|r| r.ok())
            .filter_map(|(id, name, kind_str, params_json)| {
                // Rows with an unknown kind or a non-object params blob are
                // dropped here; the due check fails closed on the rest.
                let kind = TaskKind::from_str(&kind_str).ok()?;
                let params = TaskParams::from_json(&params_json)?;
                Some(Task {
                    id: TaskId::from(id),
                    name,
                    kind,
                    params,
                })
            })
            .collect();

        Ok(tasks)
    }

    fn find_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT id, name, kind, params FROM registry WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(|(id, name, kind_str, params_json)| {
            let kind = TaskKind::from_str(&kind_str).ok()?;
            let params = TaskParams::from_json(&params_json)?;
            Some(Task {
                id: TaskId::from(id),
                name,
                kind,
                params,
            })
        }))
    }
}

impl RunStateStore for SqliteStore {
    fn update_last_run(&self, task: &Task, now: i64) -> Result<UpdateOutcome> {
        let mut conn = self.conn.lock().unwrap();

        // Writer lock up front. Busy here means another pass is mid-update:
        // too risky to continue, the caller skips this task.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::DatabaseBusy
                        || err.code == ErrorCode::DatabaseLocked =>
                {
                    SchedulerError::LockUnavailable {
                        id: task.id.to_string(),
                    }
                }
                other => SchedulerError::Database(other),
            })?;

        match locked_update(&tx, task, now) {
            Ok(UpdateOutcome::Applied) => {
                // Invalidate before release, as part of the exclusion unit,
                // so a reader racing the commit refills from fresh rows.
                self.cache.invalidate(CACHE_GROUPS, CACHE_TIERS);
                tx.commit().map_err(|e| SchedulerError::WriteFailed {
                    id: task.id.to_string(),
                    reason: e.to_string(),
                })?;
                debug!(task_id = %task.id, last_run = now, "run state updated");
                Ok(UpdateOutcome::Applied)
            }
            Ok(UpdateOutcome::Superseded) => {
                // Nothing written; dropping `tx` rolls back and releases.
                Ok(UpdateOutcome::Superseded)
            }
            // Dropping `tx` rolls back, so the lock never outlives this
            // call even on the failure paths.
            Err(reason) => Err(SchedulerError::WriteFailed {
                id: task.id.to_string(),
                reason,
            }),
        }
    }
}

/// The critical section: re-read the row under the lock, detect a
/// concurrent claim, merge the new `last_run`, write the blob back.
fn locked_update(
    tx: &rusqlite::Transaction<'_>,
    task: &Task,
    now: i64,
) -> std::result::Result<UpdateOutcome, String> {
    let stored_json: String = tx
        .query_row(
            "SELECT params FROM registry WHERE id = ?1",
            [task.id.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())?;

    let stored = TaskParams::from_json(&stored_json)
        .ok_or_else(|| "stored params are not a JSON object".to_string())?;

    // Never merge into a pre-lock snapshot: if the stored timestamp moved
    // since the caller evaluated dueness, another pass claimed the interval.
    if stored.last_run() != task.params.last_run() {
        return Ok(UpdateOutcome::Superseded);
    }

    let updated = stored.with_last_run(now);
    let n = tx
        .execute(
            "UPDATE registry SET params = ?1 WHERE id = ?2",
            rusqlite::params![updated.to_json(), task.id.as_str()],
        )
        .map_err(|e| e.to_string())?;
    if n == 0 {
        return Err("no registry row updated".to_string());
    }

    Ok(UpdateOutcome::Applied)
}

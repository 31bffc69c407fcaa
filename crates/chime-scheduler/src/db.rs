use rusqlite::Connection;

use crate::error::Result;
use crate::types::TaskParams;

/// Well-known id of the scheduler's own throttle row. The gateway's
/// opportunistic entry point rate-limits itself against this row's
/// `last_run` / `cache_timeout` pair.
pub const SCHEDULER_TASK_ID: &str = "scheduler";

/// Initialise the registry schema in `conn`.
///
/// Idempotent. The table holds both schedulable `job` rows and `system`
/// infrastructure rows; listing order (rowid) is the execution order
/// within a pass.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS registry (
            id      TEXT NOT NULL PRIMARY KEY,
            name    TEXT NOT NULL,
            kind    TEXT NOT NULL,     -- 'job' or 'system'
            params  TEXT NOT NULL      -- JSON: last_run / cache_timeout / unit + task config
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_registry_kind ON registry (kind);
        ",
    )?;
    Ok(())
}

/// Seed the scheduler's own throttle row if it is missing.
///
/// `last_run` starts at 0 so the first opportunistic pass fires as soon as
/// a request arrives.
pub fn ensure_scheduler_row(conn: &Connection, cache_timeout: i64, unit: i64) -> Result<()> {
    let params = TaskParams::new(0, cache_timeout).with_unit(unit);
    conn.execute(
        "INSERT OR IGNORE INTO registry (id, name, kind, params)
         VALUES (?1, ?2, 'system', ?3)",
        rusqlite::params![SCHEDULER_TASK_ID, "Scheduler", params.to_json()],
    )?;
    Ok(())
}

/// Register a job row. Used by hosts at installation time and by tests;
/// the scheduling core itself never creates tasks.
pub fn register_job(
    conn: &Connection,
    id: &str,
    name: &str,
    params: &TaskParams,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO registry (id, name, kind, params)
         VALUES (?1, ?2, 'job', ?3)",
        rusqlite::params![id, name, params.to_json()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn scheduler_row_is_seeded_once() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();

        ensure_scheduler_row(&conn, 1, 60).unwrap();
        // Pretend a pass ran: move last_run forward.
        conn.execute(
            "UPDATE registry SET params = ?1 WHERE id = ?2",
            rusqlite::params![
                TaskParams::new(12345, 1).with_unit(60).to_json(),
                SCHEDULER_TASK_ID
            ],
        )
        .unwrap();

        // Re-seeding must not clobber the live row.
        ensure_scheduler_row(&conn, 1, 60).unwrap();
        let json: String = conn
            .query_row(
                "SELECT params FROM registry WHERE id = ?1",
                [SCHEDULER_TASK_ID],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(TaskParams::from_json(&json).unwrap().last_run(), Some(12345));
    }
}

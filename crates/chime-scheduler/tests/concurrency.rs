// Cross-process coordination scenarios: independent stores over one SQLite
// file, the way a gateway pass and a cron-invoked CLI pass actually collide.

use std::sync::{Arc, Mutex};

use chime_core::types::{TaskDescriptor, TaskId};
use chime_scheduler::clock::FixedClock;
use chime_scheduler::db;
use chime_scheduler::driver::{SchedulerDriver, SilentObserver};
use chime_scheduler::invoker::{ExecutionOutcome, Invoker};
use chime_scheduler::store::{
    NullInvalidator, RunStateStore, SqliteStore, TaskRegistry, UpdateOutcome,
};
use chime_scheduler::types::TaskParams;
use rusqlite::Connection;

struct RecordingInvoker {
    invoked: Mutex<Vec<String>>,
}

impl RecordingInvoker {
    fn new() -> Self {
        Self {
            invoked: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.invoked.lock().unwrap().len()
    }
}

impl Invoker for RecordingInvoker {
    fn invoke(&self, task: &TaskDescriptor) -> ExecutionOutcome {
        self.invoked.lock().unwrap().push(task.id.to_string());
        ExecutionOutcome {
            duration_secs: 0.0,
            handlers: 1,
            faults: 0,
        }
    }
}

struct TestDb {
    path: std::path::PathBuf,
}

impl TestDb {
    /// Fresh file-backed database with one due job (last_run=1000,
    /// cache_timeout=5, unit=60, i.e. a 300 second interval).
    fn with_due_job() -> Self {
        let path = std::env::temp_dir().join(format!("chime-test-{}.db", uuid::Uuid::new_v4()));
        let conn = Connection::open(&path).unwrap();
        // WAL, same as the production binaries: readers never stall a
        // writer's commit, only writers contend with each other.
        conn.pragma_update(None, "journal_mode", "WAL").unwrap();
        db::init_db(&conn).unwrap();
        db::register_job(
            &conn,
            "t1",
            "Purge expired sessions",
            &TaskParams::new(1000, 5).with_unit(60),
        )
        .unwrap();
        Self { path }
    }

    fn open(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    fn store(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::new(self.open(), Arc::new(NullInvalidator)))
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let base = self.path.display().to_string();
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{base}{suffix}"));
        }
    }
}

fn driver_over(
    store: Arc<SqliteStore>,
    invoker: Arc<RecordingInvoker>,
    now: i64,
) -> SchedulerDriver {
    SchedulerDriver::new(
        store.clone(),
        store,
        invoker,
        Arc::new(FixedClock::new(now)),
        Arc::new(SilentObserver),
        60,
    )
}

#[test]
fn lock_held_elsewhere_skips_the_task() {
    let dbf = TestDb::with_due_job();
    let store = dbf.store();
    let invoker = Arc::new(RecordingInvoker::new());
    let driver = driver_over(store.clone(), invoker.clone(), 1301);

    // A concurrent pass holds the writer lock for its own update.
    let blocker = dbf.open();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let pass = driver.run_pass();
    assert!(pass.triggered.is_empty(), "locked task must be skipped");
    assert_eq!(invoker.count(), 0, "skipped task must not be invoked");

    // last_run is untouched, so the task stays eligible.
    blocker.execute_batch("COMMIT;").unwrap();
    let task = store.find_task(&TaskId::from("t1")).unwrap().unwrap();
    assert_eq!(task.params.last_run(), Some(1000));

    // With the lock released the next pass fires normally.
    let pass = driver.run_pass();
    assert_eq!(pass.triggered.len(), 1);
    assert_eq!(invoker.count(), 1);
}

#[test]
fn interleaved_passes_fire_at_most_once_per_interval() {
    let dbf = TestDb::with_due_job();

    let invoker_a = Arc::new(RecordingInvoker::new());
    let invoker_b = Arc::new(RecordingInvoker::new());
    let driver_a = driver_over(dbf.store(), invoker_a.clone(), 1301);
    let driver_b = driver_over(dbf.store(), invoker_b.clone(), 1302);

    let pass_a = driver_a.run_pass();
    let pass_b = driver_b.run_pass();

    assert_eq!(pass_a.triggered.len(), 1);
    assert!(pass_b.triggered.is_empty(), "second pass must observe the claim");
    assert_eq!(invoker_a.count() + invoker_b.count(), 1);

    let task = dbf.store().find_task(&TaskId::from("t1")).unwrap().unwrap();
    assert_eq!(task.params.last_run(), Some(1301));
}

#[test]
fn stale_snapshot_cannot_double_claim() {
    let dbf = TestDb::with_due_job();
    let store_a = dbf.store();
    let store_b = dbf.store();

    // Both passes read the row before either fires.
    let snap_a = store_a.find_task(&TaskId::from("t1")).unwrap().unwrap();
    let snap_b = store_b.find_task(&TaskId::from("t1")).unwrap().unwrap();

    assert_eq!(
        store_a.update_last_run(&snap_a, 1301).unwrap(),
        UpdateOutcome::Applied
    );
    assert_eq!(
        store_b.update_last_run(&snap_b, 1302).unwrap(),
        UpdateOutcome::Superseded,
        "the loser must not commit over the winner's claim"
    );

    let task = store_a.find_task(&TaskId::from("t1")).unwrap().unwrap();
    assert_eq!(task.params.last_run(), Some(1301));
}

#[test]
fn racing_threads_invoke_exactly_once() {
    let dbf = TestDb::with_due_job();

    let invoker_a = Arc::new(RecordingInvoker::new());
    let invoker_b = Arc::new(RecordingInvoker::new());

    std::thread::scope(|scope| {
        let store_a = dbf.store();
        let store_b = dbf.store();
        let a = invoker_a.clone();
        let b = invoker_b.clone();
        scope.spawn(move || driver_over(store_a, a, 1301).run_pass());
        scope.spawn(move || driver_over(store_b, b, 1301).run_pass());
    });

    assert_eq!(
        invoker_a.count() + invoker_b.count(),
        1,
        "exactly one pass may win the interval"
    );
}

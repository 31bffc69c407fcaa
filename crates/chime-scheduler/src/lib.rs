//! `chime-scheduler` — database-coordinated periodic task trigger.
//!
//! # Overview
//!
//! Registered tasks live in a SQLite `registry` table; each row carries a
//! JSON params blob with `last_run`, `cache_timeout`, and an optional
//! `unit` multiplier. A [`driver::SchedulerDriver`] pass loads the rows,
//! decides which tasks are due, claims each due task's run state inside an
//! exclusive transaction, and dispatches it to the registered handlers.
//!
//! The lock is the database's own writer lock, so any number of processes
//! (the HTTP gateway, a cron-invoked CLI) can race over the same file and a
//! task still fires at most once per due interval.
//!
//! # Entry points
//!
//! | Call                       | Behaviour                                      |
//! |----------------------------|------------------------------------------------|
//! | [`driver::SchedulerDriver::run_pass`]   | Unconditional pass over all job rows  |
//! | [`driver::SchedulerDriver::run_if_due`] | Pass only when the scheduler's own throttle row says so |

pub mod clock;
pub mod db;
pub mod driver;
pub mod due;
pub mod error;
pub mod invoker;
pub mod store;
pub mod types;

pub use driver::{SchedulerDriver, SchedulingPass};
pub use error::{Result, SchedulerError};
pub use types::{Task, TaskKind, TaskParams};

/// Fixed tracing target for per-task scheduling lines, so operators can
/// filter the scheduler's activity out of the host's log stream.
pub const LOG_CHANNEL: &str = "scheduler";

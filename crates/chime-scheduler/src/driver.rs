//! One scheduling pass: load tasks, evaluate due-ness, and for each due
//! task claim its run state, invoke it, and log the outcome.

use std::sync::Arc;

use chime_core::types::TaskId;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::due::{self, Dueness};
use crate::error::SchedulerError;
use crate::invoker::Invoker;
use crate::store::{RunStateStore, TaskRegistry, UpdateOutcome};
use crate::types::{Task, TaskKind};
use crate::LOG_CHANNEL;

/// One executed task within a pass.
#[derive(Debug, Clone)]
pub struct TriggeredTask {
    pub id: TaskId,
    pub name: String,
    pub duration_secs: f64,
}

/// Transient record of one evaluation cycle. Not persisted anywhere;
/// entry points surface it to logs or the operator console.
#[derive(Debug, Clone)]
pub struct SchedulingPass {
    pub started_at: i64,
    pub finished_at: i64,
    /// Executed tasks in registry listing order.
    pub triggered: Vec<TriggeredTask>,
}

/// Console seam for the operator-facing entry points. The driver logs
/// through `tracing` regardless; an observer only adds a surface.
pub trait PassObserver: Send + Sync {
    fn task_scheduled(&self, _task: &Task) {}
    fn task_completed(&self, _task: &Task, _duration_secs: f64) {}
}

/// Observer for hosts with no console of their own (the gateway).
pub struct SilentObserver;

impl PassObserver for SilentObserver {}

/// Orchestrates scheduling passes. Everything it touches is injected:
/// registry, run-state store, invoker, clock, console.
pub struct SchedulerDriver {
    registry: Arc<dyn TaskRegistry>,
    store: Arc<dyn RunStateStore>,
    invoker: Arc<dyn Invoker>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn PassObserver>,
    /// Seconds-per-unit fallback for tasks whose params omit `unit`.
    default_unit: i64,
}

impl SchedulerDriver {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        store: Arc<dyn RunStateStore>,
        invoker: Arc<dyn Invoker>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn PassObserver>,
        default_unit: i64,
    ) -> Self {
        Self {
            registry,
            store,
            invoker,
            clock,
            observer,
            default_unit,
        }
    }

    /// Run one unconditional pass over all job rows.
    ///
    /// Never fails: a registry outage degrades to an empty pass, and each
    /// task's lock or handler trouble only skips that task.
    pub fn run_pass(&self) -> SchedulingPass {
        let started_at = self.clock.now();
        info!(target: LOG_CHANNEL, "scheduling pass started");

        let tasks = match self.registry.load_tasks(TaskKind::Job) {
            Ok(tasks) => tasks,
            Err(e) => {
                // Equivalent to "no tasks found"; nothing user-facing.
                debug!(target: LOG_CHANNEL, error = %e, "registry unavailable, aborting pass");
                return SchedulingPass {
                    started_at,
                    finished_at: self.clock.now(),
                    triggered: Vec::new(),
                };
            }
        };

        let mut triggered = Vec::new();
        for task in &tasks {
            let now = self.clock.now();
            match due::evaluate(&task.params, now, self.default_unit) {
                Dueness::MissingParams => {
                    debug!(
                        target: LOG_CHANNEL,
                        task_id = %task.id,
                        "scheduling params missing or malformed, skipping"
                    );
                }
                Dueness::NotYet => {}
                Dueness::Due { clock_skew } => {
                    if clock_skew {
                        warn!(
                            target: LOG_CHANNEL,
                            task_id = %task.id,
                            last_run = task.params.last_run(),
                            "last_run is in the future, treating as due"
                        );
                    }
                    if let Some(run) = self.fire(task, now) {
                        triggered.push(run);
                    }
                }
            }
        }

        let pass = SchedulingPass {
            started_at,
            finished_at: self.clock.now(),
            triggered,
        };
        info!(
            target: LOG_CHANNEL,
            triggered = pass.triggered.len(),
            elapsed_secs = pass.finished_at - pass.started_at,
            "scheduling pass finished"
        );
        pass
    }

    /// Opportunistic entry point: run a pass only when the scheduler's own
    /// throttle row says the window has elapsed.
    ///
    /// The throttle check costs one row read, so hosts can call this after
    /// every request; the full registry scan happens only when a pass
    /// actually fires. Returns `None` when throttled, unconfigured, or when
    /// the throttle row is contended (a concurrent entry point owns the
    /// window).
    pub fn run_if_due(&self) -> Option<SchedulingPass> {
        let own = match self.registry.find_task(&TaskId::from(crate::db::SCHEDULER_TASK_ID)) {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!(target: LOG_CHANNEL, "no scheduler throttle row, opportunistic pass disabled");
                return None;
            }
            Err(e) => {
                debug!(target: LOG_CHANNEL, error = %e, "throttle row unavailable");
                return None;
            }
        };

        let now = self.clock.now();
        match due::evaluate(&own.params, now, self.default_unit) {
            Dueness::NotYet => return None,
            Dueness::MissingParams => {
                debug!(target: LOG_CHANNEL, "throttle row params malformed, opportunistic pass disabled");
                return None;
            }
            Dueness::Due { clock_skew } => {
                if clock_skew {
                    warn!(
                        target: LOG_CHANNEL,
                        last_run = own.params.last_run(),
                        "scheduler throttle last_run is in the future"
                    );
                }
            }
        }

        // Claim the window before scanning; an entry point that loses this
        // update sits the pass out.
        match self.store.update_last_run(&own, now) {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::Superseded) => {
                debug!(target: LOG_CHANNEL, "pass window claimed by a concurrent entry point");
                return None;
            }
            Err(e) => {
                info!(target: LOG_CHANNEL, error = %e, "throttle update failed, skipping opportunistic pass");
                return None;
            }
        }

        Some(self.run_pass())
    }

    /// Claim the task's run state, then dispatch it. Returns `None` when
    /// the task was skipped.
    fn fire(&self, task: &Task, now: i64) -> Option<TriggeredTask> {
        info!(
            target: LOG_CHANNEL,
            task_id = %task.id,
            name = %task.name,
            "scheduling task"
        );
        self.observer.task_scheduled(task);

        match self.store.update_last_run(task, now) {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::Superseded) => {
                info!(
                    target: LOG_CHANNEL,
                    task_id = %task.id,
                    "task already claimed by a concurrent pass, skipping"
                );
                return None;
            }
            Err(SchedulerError::LockUnavailable { .. }) => {
                info!(
                    target: LOG_CHANNEL,
                    task_id = %task.id,
                    "registry lock unavailable, task skipped"
                );
                return None;
            }
            Err(e) => {
                info!(
                    target: LOG_CHANNEL,
                    task_id = %task.id,
                    error = %e,
                    "run-state update failed, task skipped"
                );
                return None;
            }
        }

        let outcome = self.invoker.invoke(&task.descriptor());
        info!(
            target: LOG_CHANNEL,
            task_id = %task.id,
            name = %task.name,
            duration_secs = outcome.duration_secs,
            faults = outcome.faults,
            "task completed"
        );
        self.observer.task_completed(task, outcome.duration_secs);

        Some(TriggeredTask {
            id: task.id.clone(),
            name: task.name.clone(),
            duration_secs: outcome.duration_secs,
        })
    }
}

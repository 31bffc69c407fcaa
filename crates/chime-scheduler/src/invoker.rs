use std::sync::Arc;
use std::time::Instant;

use chime_core::types::TaskDescriptor;
use chime_hooks::{DispatchEngine, DispatchEvent};
use tracing::info;

use crate::LOG_CHANNEL;

/// Result of one task invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    /// Wall-clock duration of the dispatch, measured regardless of outcome.
    pub duration_secs: f64,
    /// Handlers that ran for the event.
    pub handlers: usize,
    /// Handlers that returned an error or panicked.
    pub faults: usize,
}

/// Dispatches a due task to whatever is registered to run it.
pub trait Invoker: Send + Sync {
    fn invoke(&self, task: &TaskDescriptor) -> ExecutionOutcome;
}

/// Invoker backed by the hook engine's `ExecuteScheduledTask` event.
///
/// After the main dispatch it fires `TaskCompleted` so observers can react
/// off the trigger path; faults in either round stay inside the engine.
pub struct DispatchInvoker {
    engine: Arc<DispatchEngine>,
}

impl DispatchInvoker {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }
}

impl Invoker for DispatchInvoker {
    fn invoke(&self, task: &TaskDescriptor) -> ExecutionOutcome {
        let t = Instant::now();
        let summary = self
            .engine
            .trigger(DispatchEvent::ExecuteScheduledTask, task);
        let duration_secs = t.elapsed().as_secs_f64();

        info!(
            target: LOG_CHANNEL,
            task_id = %task.id,
            handlers = summary.handlers,
            faults = summary.faults,
            duration_secs,
            "task dispatched"
        );

        self.engine.trigger(DispatchEvent::TaskCompleted, task);

        ExecutionOutcome {
            duration_secs,
            handlers: summary.handlers,
            faults: summary.faults,
        }
    }
}

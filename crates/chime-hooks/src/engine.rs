use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;
use std::time::Instant;

use chime_core::types::TaskDescriptor;
use tracing::{debug, error, warn};

use crate::types::{DispatchEvent, DispatchSummary, HandlerDefinition};

/// Central registry and dispatcher for task handlers.
///
/// Designed to be shared across the whole process as Arc<DispatchEngine>;
/// registration and dispatch are both safe from any thread.
pub struct DispatchEngine {
    /// Sorted by priority ascending after every registration.
    handlers: RwLock<Vec<HandlerDefinition>>,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler. Re-sorts the list so priority order is always
    /// correct.
    pub fn register(&self, handler: HandlerDefinition) {
        let mut handlers = self.handlers.write().expect("handler registry poisoned");
        debug!(name = %handler.name, event = ?handler.event, "handler registered");
        handlers.push(handler);
        // Stable sort preserves registration order within the same priority.
        handlers.sort_by_key(|h| h.priority);
    }

    /// Remove a handler by name. Silent no-op if the name is not found.
    pub fn unregister(&self, name: &str) {
        let mut handlers = self.handlers.write().expect("handler registry poisoned");
        let before = handlers.len();
        handlers.retain(|h| h.name != name);
        if handlers.len() < before {
            debug!(name, "handler unregistered");
        }
    }

    /// Run every handler registered for `event`, in priority order.
    ///
    /// Handler errors and panics are caught here and never propagate; the
    /// summary reports how many handlers ran and how many faulted.
    pub fn trigger(&self, event: DispatchEvent, task: &TaskDescriptor) -> DispatchSummary {
        let handlers = self.handlers.read().expect("handler registry poisoned");
        let mut summary = DispatchSummary::default();

        for def in handlers.iter().filter(|h| h.event == event) {
            let t = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| def.handler.execute(task)));
            let elapsed_ms = t.elapsed().as_millis() as u64;
            summary.handlers += 1;

            match result {
                Ok(Ok(())) => {
                    debug!(handler = %def.name, duration_ms = elapsed_ms, "handler completed");
                }
                Ok(Err(e)) => {
                    summary.faults += 1;
                    warn!(
                        handler = %def.name,
                        task_id = %task.id,
                        duration_ms = elapsed_ms,
                        error = %e,
                        "handler failed"
                    );
                }
                Err(_) => {
                    summary.faults += 1;
                    error!(
                        handler = %def.name,
                        task_id = %task.id,
                        duration_ms = elapsed_ms,
                        "handler panicked"
                    );
                }
            }
        }

        summary
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

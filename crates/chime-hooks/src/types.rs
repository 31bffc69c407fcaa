use chime_core::types::TaskDescriptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events the scheduler emits to registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchEvent {
    /// The well-known trigger every job handler subscribes to. Fired once
    /// per due task, after its run state has been claimed.
    ExecuteScheduledTask,
    /// Fired after a task's dispatch finishes, for observers that want to
    /// react without sitting in the trigger path.
    TaskCompleted,
}

/// Synchronous task handler trait.
///
/// The engine never inspects a handler's output beyond logging failures;
/// a fault in one handler must not reach the others.
pub trait TaskHandler: Send + Sync {
    fn execute(&self, task: &TaskDescriptor) -> anyhow::Result<()>;
}

/// A registered handler binding a name, event filter, and priority.
pub struct HandlerDefinition {
    /// Unique name used for deregistration and log correlation.
    pub name: String,
    pub event: DispatchEvent,
    /// Wrapped in Arc so definitions can be cloned across the registry.
    pub handler: Arc<dyn TaskHandler>,
    /// Lower value = earlier execution. Ties broken by registration order.
    pub priority: i32,
}

impl HandlerDefinition {
    pub fn new(
        name: impl Into<String>,
        event: DispatchEvent,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            event,
            handler,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// What one trigger call did: how many handlers ran and how many faulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub handlers: usize,
    pub faults: usize,
}

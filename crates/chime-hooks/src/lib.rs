//! `chime-hooks` — handler registry and event dispatch for scheduled tasks.
//!
//! Task handlers are arbitrary external collaborators registered against a
//! well-known event. The [`engine::DispatchEngine`] runs every handler for
//! an event in priority order and catches faults (errors and panics) at the
//! boundary, so one broken handler never takes down a scheduling pass.

pub mod engine;
pub mod types;

pub use engine::DispatchEngine;
pub use types::{DispatchEvent, DispatchSummary, HandlerDefinition, TaskHandler};

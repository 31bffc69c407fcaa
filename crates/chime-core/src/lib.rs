//! `chime-core` — shared types, configuration, and errors for the Chime
//! workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::ChimeConfig;
pub use error::{ChimeError, Result};
pub use types::{TaskDescriptor, TaskId};

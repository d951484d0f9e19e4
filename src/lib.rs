//! fxproject - effect project state & command engine
//!
//! Re-exports all modules for use by the binary target.

// Core engine (store, commands, events)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod paths;

// Re-export commonly used types from core
pub use core::{CommandService, EffectOperationsService, EventBus, ProjectStateStore};

// Re-export entities
pub use entities::{Attrs, AttrValue, Effect, Project};
pub use error::{EngineError, EngineResult};

//! Core engine: document store, commands, undo history, events.
//!
//! Nothing here reaches for globals; the binary (or a test) builds one
//! [`EventBus`], hands clones to the services and owns the store.

pub mod command_service;
pub mod commands;
pub mod effect_events;
pub mod effect_ops;
pub mod event_bus;
pub mod project_state;

// Re-exports for convenience
pub use command_service::CommandService;
pub use commands::{Command, EffectCommand};
pub use effect_events::{Event, EventKind, EventPayload};
pub use effect_ops::{EffectCatalog, EffectDefaults, EffectOperationsService, OperationMetrics};
pub use event_bus::{EventBus, Subscription};
pub use project_state::ProjectStateStore;

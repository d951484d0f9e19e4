//! Engine error taxonomy.
//!
//! - `Validation`: malformed document or argument, rejected before any mutation.
//! - `IndexOutOfRange` / `StaleIndex`: a command addressed a position that no
//!   longer exists or now holds a different effect.
//! - `MissingDependency`: façade built or invoked without a required collaborator.
//! - `Handler`: a bus subscriber failed. Only ever recorded by the bus, never
//!   returned from `emit`.

use crate::core::effect_events::EventKind;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{what} at index {index} is no longer '{expected}'")]
    StaleIndex {
        what: &'static str,
        index: usize,
        expected: String,
    },

    #[error("{0} is required")]
    MissingDependency(&'static str),

    #[error("handler for '{kind}' failed: {message}")]
    Handler { kind: EventKind, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Bounds check shared by every index-addressed mutator.
    pub fn check_index(what: &'static str, index: usize, len: usize) -> EngineResult<()> {
        if index < len {
            Ok(())
        } else {
            Err(Self::IndexOutOfRange { what, index, len })
        }
    }

    pub fn is_index_error(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. } | Self::StaleIndex { .. })
    }
}

//! Entities module - document types and canvas geometry
//!
//! Plain data with serde boundaries; no knowledge of commands or events.

pub mod attrs;
pub mod center;
pub mod effect;
pub mod keys;
pub mod position;
pub mod project;

pub use attrs::{AttrValue, Attrs};
pub use effect::{CatalogEntry, Effect, EffectType, KeyframeEffect};
pub use position::{ArcPath, Derivation, PositionShape, PositionValue};
pub use project::{Dimensions, Project, ProjectUpdate, Resolution};

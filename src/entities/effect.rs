//! Effect tree nodes.
//!
//! A project holds an ordered list of primary effects. Each may carry one
//! level of nested modifiers:
//!
//! ```text
//! Project
//!   └── effects: Vec<Effect>
//!         ├── Effect { type: primary, config: {...} }
//!         │     ├── secondary_effects: Vec<Effect>          (no further nesting)
//!         │     └── keyframe_effects: Vec<KeyframeEffect>   (frame + Effect)
//!         └── Effect { type: final, ... }
//! ```
//!
//! Ids are opaque strings. New effects get a UUID v4; ids loaded from disk are
//! kept verbatim and never regenerated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attrs::Attrs;

/// Role of an effect in the render stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    #[default]
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "secondary")]
    Secondary,
    #[serde(rename = "keyFrame")]
    KeyFrame,
    #[serde(rename = "final")]
    Final,
}

impl EffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::Primary => "primary",
            EffectType::Secondary => "secondary",
            EffectType::KeyFrame => "keyFrame",
            EffectType::Final => "final",
        }
    }
}

/// Catalog description of an available effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub class_name: String,
    pub registry_key: String,
    #[serde(default)]
    pub category: EffectType,
}

impl CatalogEntry {
    pub fn new(name: &str, class_name: &str, registry_key: &str, category: EffectType) -> Self {
        Self {
            name: name.to_string(),
            class_name: class_name.to_string(),
            registry_key: registry_key.to_string(),
            category,
        }
    }
}

fn default_visible() -> bool {
    true
}

/// Effect instance in the project tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    /// Opaque identifier, fixed for the life of the effect
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub registry_key: String,
    #[serde(rename = "type", default)]
    pub effect_type: EffectType,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Chance (0-100) that the effect is applied on a given render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_chance: Option<f64>,
    #[serde(default)]
    pub config: Attrs,
    #[serde(default)]
    pub secondary_effects: Vec<Effect>,
    #[serde(default)]
    pub keyframe_effects: Vec<KeyframeEffect>,
}

/// Effect applied from a specific frame onward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeEffect {
    pub frame: u32,
    #[serde(flatten)]
    pub effect: Effect,
}

impl KeyframeEffect {
    pub fn new(frame: u32, effect: Effect) -> Self {
        Self { frame, effect }
    }
}

impl Effect {
    /// Fresh, visible effect built from a catalog entry.
    pub fn new(entry: &CatalogEntry, effect_type: EffectType, config: Attrs) -> Self {
        Self {
            id: Self::generate_id(),
            name: entry.name.clone(),
            class_name: entry.class_name.clone(),
            registry_key: entry.registry_key.clone(),
            effect_type,
            visible: true,
            percent_chance: None,
            config,
            secondary_effects: Vec::new(),
            keyframe_effects: Vec::new(),
        }
    }

    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn with_percent_chance(mut self, percent_chance: Option<f64>) -> Self {
        self.percent_chance = percent_chance;
        self
    }

    /// True when the effect carries nested secondary or keyframe effects.
    pub fn has_children(&self) -> bool {
        !self.secondary_effects.is_empty() || !self.keyframe_effects.is_empty()
    }

    /// Nested effects in tree order: secondaries first, then keyframes.
    pub fn children(&self) -> impl Iterator<Item = &Effect> {
        self.secondary_effects
            .iter()
            .chain(self.keyframe_effects.iter().map(|k| &k.effect))
    }

    /// Mutable counterpart of [`Effect::children`].
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Effect> {
        self.secondary_effects
            .iter_mut()
            .chain(self.keyframe_effects.iter_mut().map(|k| &mut k.effect))
    }

    /// Human-readable label for undo history.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.class_name } else { &self.name }
    }
}

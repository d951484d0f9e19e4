//! Reversible commands over the project document.
//!
//! Each command is an immutable value object: it holds the indices it
//! addresses plus whatever "before" data its inverse needs (a deleted
//! effect, the previous version of an updated one). It never holds a
//! reference into the store.
//!
//! | Command | execute | undo |
//! |---------|---------|------|
//! | AddEffect | insert at index | remove at index |
//! | UpdateEffect | replace with updated | replace with previous |
//! | DeleteEffect | remove at index | re-insert at the same index |
//! | ReorderEffects(from, to) | move from -> to | move to -> from |
//!
//! Secondary and keyframe variants mirror these inside one parent's list.
//! Commands that capture ids check them again before mutating, so a command
//! replayed against a reshuffled list fails with `StaleIndex` instead of
//! touching the wrong effect.

use enum_dispatch::enum_dispatch;

use super::project_state::ProjectStateStore;
use crate::entities::effect::{Effect, KeyframeEffect};
use crate::error::{EngineError, EngineResult};

/// Executable, reversible unit of state mutation.
#[enum_dispatch]
pub trait Command {
    /// Human-readable label for undo history
    fn description(&self) -> &str;

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()>;

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()>;
}

/// All command variants, dispatched statically.
#[enum_dispatch(Command)]
#[derive(Clone, Debug)]
pub enum EffectCommand {
    AddEffectCommand,
    UpdateEffectCommand,
    DeleteEffectCommand,
    ReorderEffectsCommand,
    AddSecondaryEffectCommand,
    DeleteSecondaryEffectCommand,
    ReorderSecondaryEffectsCommand,
    AddKeyframeEffectCommand,
    DeleteKeyframeEffectCommand,
    ReorderKeyframeEffectsCommand,
}

fn expect_id(what: &'static str, index: usize, actual: &str, expected: &str) -> EngineResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::StaleIndex { what, index, expected: expected.to_string() })
    }
}

// ============================================================================
// Primary effects
// ============================================================================

#[derive(Clone, Debug)]
pub struct AddEffectCommand {
    index: usize,
    effect: Effect,
    description: String,
}

impl AddEffectCommand {
    pub fn new(index: usize, effect: Effect) -> Self {
        let description = format!("Add effect '{}'", effect.label());
        Self { index, effect, description }
    }

    /// Append after the current last effect.
    pub fn append(store: &ProjectStateStore, effect: Effect) -> Self {
        Self::new(store.effects_len(), effect)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl Command for AddEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.insert_effect(self.index, self.effect.clone())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        expect_id("effect", self.index, &store.effect(self.index)?.id, &self.effect.id)?;
        store.remove_effect(self.index).map(|_| ())
    }
}

#[derive(Clone, Debug)]
pub struct UpdateEffectCommand {
    index: usize,
    previous: Effect,
    updated: Effect,
    description: String,
}

impl UpdateEffectCommand {
    /// Capture the current effect at `index` as the undo target.
    ///
    /// `updated` must keep the id of the effect it replaces.
    pub fn new(store: &ProjectStateStore, index: usize, updated: Effect, description: Option<String>) -> EngineResult<Self> {
        let previous = store.effect(index)?.clone();
        expect_id("effect", index, &updated.id, &previous.id)?;
        let description = description.unwrap_or_else(|| format!("Update effect '{}'", updated.label()));
        Ok(Self { index, previous, updated, description })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn previous(&self) -> &Effect {
        &self.previous
    }

    pub fn updated(&self) -> &Effect {
        &self.updated
    }
}

impl Command for UpdateEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.replace_effect(self.index, self.updated.clone()).map(|_| ())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.replace_effect(self.index, self.previous.clone()).map(|_| ())
    }
}

#[derive(Clone, Debug)]
pub struct DeleteEffectCommand {
    index: usize,
    effect: Effect,
    description: String,
}

impl DeleteEffectCommand {
    /// Capture the effect at `index` so undo can restore it in place.
    pub fn new(store: &ProjectStateStore, index: usize) -> EngineResult<Self> {
        let effect = store.effect(index)?.clone();
        let description = format!("Delete effect '{}'", effect.label());
        Ok(Self { index, effect, description })
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl Command for DeleteEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        expect_id("effect", self.index, &store.effect(self.index)?.id, &self.effect.id)?;
        store.remove_effect(self.index).map(|_| ())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.insert_effect(self.index, self.effect.clone())
    }
}

#[derive(Clone, Debug)]
pub struct ReorderEffectsCommand {
    from: usize,
    to: usize,
    description: String,
}

impl ReorderEffectsCommand {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to, description: format!("Move effect {from} -> {to}") }
    }
}

impl Command for ReorderEffectsCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_effects(self.from, self.to)
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_effects(self.to, self.from)
    }
}

// ============================================================================
// Secondary effects
// ============================================================================

#[derive(Clone, Debug)]
pub struct AddSecondaryEffectCommand {
    parent: usize,
    parent_id: String,
    index: usize,
    effect: Effect,
    description: String,
}

impl AddSecondaryEffectCommand {
    /// Insert at `index`, or append when `None`.
    pub fn new(store: &ProjectStateStore, parent: usize, index: Option<usize>, effect: Effect) -> EngineResult<Self> {
        let parent_fx = store.effect(parent)?;
        let index = index.unwrap_or(parent_fx.secondary_effects.len());
        let description = format!("Add secondary effect '{}' to '{}'", effect.label(), parent_fx.label());
        Ok(Self { parent, parent_id: parent_fx.id.clone(), index, effect, description })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Command for AddSecondaryEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        expect_id("parent effect", self.parent, &store.effect(self.parent)?.id, &self.parent_id)?;
        store.insert_secondary(self.parent, self.index, self.effect.clone())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        let current = store.secondary_effect(self.parent, self.index)?;
        expect_id("secondary effect", self.index, &current.id, &self.effect.id)?;
        store.remove_secondary(self.parent, self.index).map(|_| ())
    }
}

#[derive(Clone, Debug)]
pub struct DeleteSecondaryEffectCommand {
    parent: usize,
    index: usize,
    effect: Effect,
    description: String,
}

impl DeleteSecondaryEffectCommand {
    pub fn new(store: &ProjectStateStore, parent: usize, index: usize) -> EngineResult<Self> {
        let effect = store.secondary_effect(parent, index)?.clone();
        let description = format!("Delete secondary effect '{}'", effect.label());
        Ok(Self { parent, index, effect, description })
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl Command for DeleteSecondaryEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        let current = store.secondary_effect(self.parent, self.index)?;
        expect_id("secondary effect", self.index, &current.id, &self.effect.id)?;
        store.remove_secondary(self.parent, self.index).map(|_| ())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.insert_secondary(self.parent, self.index, self.effect.clone())
    }
}

#[derive(Clone, Debug)]
pub struct ReorderSecondaryEffectsCommand {
    parent: usize,
    from: usize,
    to: usize,
    description: String,
}

impl ReorderSecondaryEffectsCommand {
    pub fn new(parent: usize, from: usize, to: usize) -> Self {
        Self { parent, from, to, description: format!("Move secondary effect {from} -> {to}") }
    }
}

impl Command for ReorderSecondaryEffectsCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_secondary(self.parent, self.from, self.to)
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_secondary(self.parent, self.to, self.from)
    }
}

// ============================================================================
// Keyframe effects
// ============================================================================

#[derive(Clone, Debug)]
pub struct AddKeyframeEffectCommand {
    parent: usize,
    parent_id: String,
    index: usize,
    keyframe: KeyframeEffect,
    description: String,
}

impl AddKeyframeEffectCommand {
    /// Insert at `index`, or append when `None`.
    pub fn new(store: &ProjectStateStore, parent: usize, index: Option<usize>, keyframe: KeyframeEffect) -> EngineResult<Self> {
        let parent_fx = store.effect(parent)?;
        let index = index.unwrap_or(parent_fx.keyframe_effects.len());
        let description = format!(
            "Add keyframe effect '{}' at frame {} to '{}'",
            keyframe.effect.label(),
            keyframe.frame,
            parent_fx.label()
        );
        Ok(Self { parent, parent_id: parent_fx.id.clone(), index, keyframe, description })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Command for AddKeyframeEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        expect_id("parent effect", self.parent, &store.effect(self.parent)?.id, &self.parent_id)?;
        store.insert_keyframe(self.parent, self.index, self.keyframe.clone())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        let current = store.keyframe_effect(self.parent, self.index)?;
        expect_id("keyframe effect", self.index, &current.effect.id, &self.keyframe.effect.id)?;
        store.remove_keyframe(self.parent, self.index).map(|_| ())
    }
}

#[derive(Clone, Debug)]
pub struct DeleteKeyframeEffectCommand {
    parent: usize,
    index: usize,
    keyframe: KeyframeEffect,
    description: String,
}

impl DeleteKeyframeEffectCommand {
    pub fn new(store: &ProjectStateStore, parent: usize, index: usize) -> EngineResult<Self> {
        let keyframe = store.keyframe_effect(parent, index)?.clone();
        let description = format!("Delete keyframe effect '{}' at frame {}", keyframe.effect.label(), keyframe.frame);
        Ok(Self { parent, index, keyframe, description })
    }

    pub fn keyframe(&self) -> &KeyframeEffect {
        &self.keyframe
    }
}

impl Command for DeleteKeyframeEffectCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        let current = store.keyframe_effect(self.parent, self.index)?;
        expect_id("keyframe effect", self.index, &current.effect.id, &self.keyframe.effect.id)?;
        store.remove_keyframe(self.parent, self.index).map(|_| ())
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.insert_keyframe(self.parent, self.index, self.keyframe.clone())
    }
}

#[derive(Clone, Debug)]
pub struct ReorderKeyframeEffectsCommand {
    parent: usize,
    from: usize,
    to: usize,
    description: String,
}

impl ReorderKeyframeEffectsCommand {
    pub fn new(parent: usize, from: usize, to: usize) -> Self {
        Self { parent, from, to, description: format!("Move keyframe effect {from} -> {to}") }
    }
}

impl Command for ReorderKeyframeEffectsCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_keyframes(self.parent, self.from, self.to)
    }

    fn undo(&self, store: &mut ProjectStateStore) -> EngineResult<()> {
        store.reorder_keyframes(self.parent, self.to, self.from)
    }
}

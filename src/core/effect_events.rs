//! Effect and command events.
//!
//! One [`EventKind`] per observable mutation, one payload variant per kind.
//! Subscribers register by kind; the payload is matched exhaustively on the
//! receiving side.
//!
//! | Kind | Emitted by |
//! |------|------------|
//! | `effectCreated`, `effectCreatedWithConfig` | `EffectOperationsService::create_effect*` |
//! | `effectUpdated`, `effectDeleted`, `effectsReordered` | update / delete / reorder |
//! | `effectVisibilityToggled` | `toggle_effect_visibility` |
//! | `secondaryEffect*`, `keyframeEffect*` | nested create / delete / reorder |
//! | `command:executed`, `command:undone`, `command:redone` | `CommandService` |
//! | `projectUpdated` | `EffectOperationsService::update_project` |

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::entities::effect::Effect;
use crate::entities::project::Dimensions;

/// Event type key used for subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    EffectCreated,
    EffectCreatedWithConfig,
    EffectUpdated,
    EffectDeleted,
    EffectsReordered,
    EffectVisibilityToggled,
    SecondaryEffectCreated,
    SecondaryEffectDeleted,
    SecondaryEffectsReordered,
    KeyframeEffectCreated,
    KeyframeEffectDeleted,
    KeyframeEffectsReordered,
    CommandExecuted,
    CommandUndone,
    CommandRedone,
    ProjectUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::EffectCreated => "effectCreated",
            EventKind::EffectCreatedWithConfig => "effectCreatedWithConfig",
            EventKind::EffectUpdated => "effectUpdated",
            EventKind::EffectDeleted => "effectDeleted",
            EventKind::EffectsReordered => "effectsReordered",
            EventKind::EffectVisibilityToggled => "effectVisibilityToggled",
            EventKind::SecondaryEffectCreated => "secondaryEffectCreated",
            EventKind::SecondaryEffectDeleted => "secondaryEffectDeleted",
            EventKind::SecondaryEffectsReordered => "secondaryEffectsReordered",
            EventKind::KeyframeEffectCreated => "keyframeEffectCreated",
            EventKind::KeyframeEffectDeleted => "keyframeEffectDeleted",
            EventKind::KeyframeEffectsReordered => "keyframeEffectsReordered",
            EventKind::CommandExecuted => "command:executed",
            EventKind::CommandUndone => "command:undone",
            EventKind::CommandRedone => "command:redone",
            EventKind::ProjectUpdated => "projectUpdated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Event payload, one schema per kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum EventPayload {
    EffectCreated { index: usize, effect: Effect },
    EffectCreatedWithConfig { index: usize, effect: Effect },
    EffectUpdated { index: usize, effect: Effect },
    EffectDeleted { index: usize, effect: Effect },
    EffectsReordered { from: usize, to: usize },
    EffectVisibilityToggled { index: usize, effect_id: String, visible: bool },
    SecondaryEffectCreated { parent_index: usize, index: usize, effect: Effect },
    SecondaryEffectDeleted { parent_index: usize, index: usize, effect: Effect },
    SecondaryEffectsReordered { parent_index: usize, from: usize, to: usize },
    KeyframeEffectCreated { parent_index: usize, index: usize, frame: u32, effect: Effect },
    KeyframeEffectDeleted { parent_index: usize, index: usize, frame: u32, effect: Effect },
    KeyframeEffectsReordered { parent_index: usize, from: usize, to: usize },
    CommandExecuted { description: String, undo_depth: usize },
    CommandUndone { description: String, undo_depth: usize },
    CommandRedone { description: String, undo_depth: usize },
    ProjectUpdated { dimensions: Dimensions, rescaled: bool },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::EffectCreated { .. } => EventKind::EffectCreated,
            EventPayload::EffectCreatedWithConfig { .. } => EventKind::EffectCreatedWithConfig,
            EventPayload::EffectUpdated { .. } => EventKind::EffectUpdated,
            EventPayload::EffectDeleted { .. } => EventKind::EffectDeleted,
            EventPayload::EffectsReordered { .. } => EventKind::EffectsReordered,
            EventPayload::EffectVisibilityToggled { .. } => EventKind::EffectVisibilityToggled,
            EventPayload::SecondaryEffectCreated { .. } => EventKind::SecondaryEffectCreated,
            EventPayload::SecondaryEffectDeleted { .. } => EventKind::SecondaryEffectDeleted,
            EventPayload::SecondaryEffectsReordered { .. } => EventKind::SecondaryEffectsReordered,
            EventPayload::KeyframeEffectCreated { .. } => EventKind::KeyframeEffectCreated,
            EventPayload::KeyframeEffectDeleted { .. } => EventKind::KeyframeEffectDeleted,
            EventPayload::KeyframeEffectsReordered { .. } => EventKind::KeyframeEffectsReordered,
            EventPayload::CommandExecuted { .. } => EventKind::CommandExecuted,
            EventPayload::CommandUndone { .. } => EventKind::CommandUndone,
            EventPayload::CommandRedone { .. } => EventKind::CommandRedone,
            EventPayload::ProjectUpdated { .. } => EventKind::ProjectUpdated,
        }
    }
}

/// Published event. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: EventPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl Event {
    pub fn new(payload: EventPayload, meta: Option<serde_json::Value>) -> Self {
        Self {
            kind: payload.kind(),
            payload,
            meta,
            timestamp: now_millis(),
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_payload() {
        let event = Event::new(EventPayload::EffectsReordered { from: 0, to: 2 }, None);
        assert_eq!(event.kind, EventKind::EffectsReordered);
        assert_eq!(event.kind.to_string(), "effectsReordered");
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new(
            EventPayload::SecondaryEffectsReordered { parent_index: 1, from: 0, to: 3 },
            Some(serde_json::json!({"source": "test"})),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "secondaryEffectsReordered");
        assert_eq!(value["payload"]["parentIndex"], 1);
        assert_eq!(value["meta"]["source"], "test");
    }
}

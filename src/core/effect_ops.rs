//! EffectOperationsService: the entry point for every effect mutation.
//!
//! Each operation follows the same pipeline:
//!
//! ```text
//! validate args -> build command -> CommandService::execute -> emit event -> bump metric
//! ```
//!
//! Failures surface to the caller unchanged and bump the error counter; the
//! document and history are untouched by a failed operation.
//!
//! Effect creation additionally resolves the catalog entry, asks the
//! [`EffectDefaults`] provider for a default config and seeds its positions
//! for the project's canvas via [`center::detect_and_apply_center`].

use log::{debug, error, info};
use serde::Serialize;

use super::command_service::CommandService;
use super::commands::{
    AddEffectCommand, AddKeyframeEffectCommand, AddSecondaryEffectCommand, DeleteEffectCommand,
    DeleteKeyframeEffectCommand, DeleteSecondaryEffectCommand, ReorderEffectsCommand,
    ReorderKeyframeEffectsCommand, ReorderSecondaryEffectsCommand, UpdateEffectCommand,
};
use super::effect_events::{now_millis, EventPayload};
use super::event_bus::EventBus;
use super::project_state::ProjectStateStore;
use crate::entities::attrs::Attrs;
use crate::entities::center;
use crate::entities::effect::{CatalogEntry, Effect, EffectType, KeyframeEffect};
use crate::entities::project::ProjectUpdate;
use crate::error::{EngineError, EngineResult};

// ============================================================================
// External providers
// ============================================================================

/// Resolves effect names to catalog entries.
pub trait EffectCatalog {
    fn lookup(&self, name: &str) -> Option<CatalogEntry>;
}

/// Matches on catalog name first, then registry key.
impl EffectCatalog for Vec<CatalogEntry> {
    fn lookup(&self, name: &str) -> Option<CatalogEntry> {
        self.iter()
            .find(|e| e.name == name)
            .or_else(|| self.iter().find(|e| e.registry_key == name))
            .cloned()
    }
}

/// Supplies the default config of a freshly created effect.
///
/// Configs are authored against the reference canvas; the service rescales
/// them for the project.
pub trait EffectDefaults {
    fn default_config(&self, effect_name: &str) -> anyhow::Result<Attrs>;
}

impl<F> EffectDefaults for F
where
    F: Fn(&str) -> anyhow::Result<Attrs>,
{
    fn default_config(&self, effect_name: &str) -> anyhow::Result<Attrs> {
        self(effect_name)
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Operation counters since creation or the last reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetrics {
    pub effects_created: u64,
    pub effects_updated: u64,
    pub effects_deleted: u64,
    pub effects_reordered: u64,
    pub visibility_toggled: u64,
    pub secondary_created: u64,
    pub secondary_deleted: u64,
    pub secondary_reordered: u64,
    pub keyframe_created: u64,
    pub keyframe_deleted: u64,
    pub keyframe_reordered: u64,
    pub project_updates: u64,
    pub errors: u64,
    /// Unix millis of the last successful operation
    pub last_operation: Option<u64>,
}

// ============================================================================
// Builder
// ============================================================================

type BoxedCatalog = Box<dyn EffectCatalog + Send + Sync>;
type BoxedDefaults = Box<dyn EffectDefaults + Send + Sync>;

/// Collects the service's collaborators. `build` fails with
/// `MissingDependency` naming the first one absent.
#[derive(Default)]
pub struct EffectOperationsBuilder {
    commands: Option<CommandService>,
    bus: Option<EventBus>,
    catalog: Option<BoxedCatalog>,
    defaults: Option<BoxedDefaults>,
}

impl EffectOperationsBuilder {
    pub fn command_service(mut self, commands: CommandService) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn catalog(mut self, catalog: impl EffectCatalog + Send + Sync + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    pub fn defaults(mut self, defaults: impl EffectDefaults + Send + Sync + 'static) -> Self {
        self.defaults = Some(Box::new(defaults));
        self
    }

    pub fn build(self) -> EngineResult<EffectOperationsService> {
        Ok(EffectOperationsService {
            commands: self.commands.ok_or(EngineError::MissingDependency("commandService"))?,
            bus: self.bus.ok_or(EngineError::MissingDependency("eventBus"))?,
            catalog: self.catalog.ok_or(EngineError::MissingDependency("availableEffects"))?,
            defaults: self.defaults.ok_or(EngineError::MissingDependency("defaultsProvider"))?,
            metrics: OperationMetrics::default(),
        })
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct EffectOperationsService {
    commands: CommandService,
    bus: EventBus,
    catalog: BoxedCatalog,
    defaults: BoxedDefaults,
    metrics: OperationMetrics,
}

impl std::fmt::Debug for EffectOperationsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectOperationsService")
            .field("commands", &self.commands)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl EffectOperationsService {
    pub fn builder() -> EffectOperationsBuilder {
        EffectOperationsBuilder::default()
    }

    pub fn command_service(&self) -> &CommandService {
        &self.commands
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn get_operation_metrics(&self) -> OperationMetrics {
        self.metrics.clone()
    }

    pub fn reset_operation_metrics(&mut self) {
        self.metrics = OperationMetrics::default();
    }

    // ---------- primary effects ----------

    /// Create `effect_name` from the catalog with its default config and
    /// append it to the project. Returns the new effect.
    pub fn create_effect(
        &mut self,
        store: &mut ProjectStateStore,
        effect_name: &str,
        effect_type: EffectType,
    ) -> EngineResult<Effect> {
        let result = self.run_create_effect(store, effect_name, effect_type);
        self.track("createEffect", result)
    }

    fn run_create_effect(
        &mut self,
        store: &mut ProjectStateStore,
        effect_name: &str,
        effect_type: EffectType,
    ) -> EngineResult<Effect> {
        let effect = self.instantiate(store, effect_name, effect_type)?;
        let index = store.effects_len();
        self.commands.execute(store, AddEffectCommand::new(index, effect.clone()))?;
        self.bus.emit(EventPayload::EffectCreated { index, effect: effect.clone() });
        self.metrics.effects_created += 1;
        Ok(effect)
    }

    /// Create `effect_name` with a caller-built config, used verbatim.
    pub fn create_effect_with_config(
        &mut self,
        store: &mut ProjectStateStore,
        effect_name: &str,
        effect_type: EffectType,
        config: Attrs,
        percent_chance: Option<f64>,
    ) -> EngineResult<Effect> {
        let result = self.run_create_effect_with_config(store, effect_name, effect_type, config, percent_chance);
        self.track("createEffectWithConfig", result)
    }

    fn run_create_effect_with_config(
        &mut self,
        store: &mut ProjectStateStore,
        effect_name: &str,
        effect_type: EffectType,
        config: Attrs,
        percent_chance: Option<f64>,
    ) -> EngineResult<Effect> {
        let entry = self.resolve(effect_name)?;
        if let Some(chance) = percent_chance {
            if !(0.0..=100.0).contains(&chance) {
                return Err(EngineError::validation(format!("percentChance {chance} outside 0..=100")));
            }
        }
        let effect = Effect::new(&entry, effect_type, config).with_percent_chance(percent_chance);
        let index = store.effects_len();
        self.commands.execute(store, AddEffectCommand::new(index, effect.clone()))?;
        self.bus.emit(EventPayload::EffectCreatedWithConfig { index, effect: effect.clone() });
        self.metrics.effects_created += 1;
        Ok(effect)
    }

    /// Replace the effect at `index` with `updated`.
    ///
    /// The stored id always wins over `updated.id`. Position values the
    /// caller moved lose their derivation tags.
    pub fn update_effect(&mut self, store: &mut ProjectStateStore, index: usize, updated: Effect) -> EngineResult<()> {
        let result = self.run_update_effect(store, index, updated);
        self.track("updateEffect", result)
    }

    fn run_update_effect(&mut self, store: &mut ProjectStateStore, index: usize, mut updated: Effect) -> EngineResult<()> {
        let current = store.effect(index)?;
        updated.id = current.id.clone();
        center::clear_moved_tags(&current.config, &mut updated.config);

        let command = UpdateEffectCommand::new(store, index, updated.clone(), None)?;
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::EffectUpdated { index, effect: updated });
        self.metrics.effects_updated += 1;
        Ok(())
    }

    /// Remove the effect at `index`. Returns the removed effect.
    pub fn delete_effect(&mut self, store: &mut ProjectStateStore, index: usize) -> EngineResult<Effect> {
        let result = self.run_delete_effect(store, index);
        self.track("deleteEffect", result)
    }

    fn run_delete_effect(&mut self, store: &mut ProjectStateStore, index: usize) -> EngineResult<Effect> {
        let command = DeleteEffectCommand::new(store, index)?;
        let effect = command.effect().clone();
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::EffectDeleted { index, effect: effect.clone() });
        self.metrics.effects_deleted += 1;
        Ok(effect)
    }

    pub fn reorder_effects(&mut self, store: &mut ProjectStateStore, from: usize, to: usize) -> EngineResult<()> {
        let result = self
            .commands
            .execute(store, ReorderEffectsCommand::new(from, to))
            .map(|()| {
                self.bus.emit(EventPayload::EffectsReordered { from, to });
                self.metrics.effects_reordered += 1;
            });
        self.track("reorderEffects", result)
    }

    /// Flip `visible` on the effect at `index`. Returns the new state.
    pub fn toggle_effect_visibility(&mut self, store: &mut ProjectStateStore, index: usize) -> EngineResult<bool> {
        let result = self.run_toggle_visibility(store, index);
        self.track("toggleEffectVisibility", result)
    }

    fn run_toggle_visibility(&mut self, store: &mut ProjectStateStore, index: usize) -> EngineResult<bool> {
        let mut updated = store.effect(index)?.clone();
        updated.visible = !updated.visible;
        let verb = if updated.visible { "Shown" } else { "Hid" };
        let description = format!("{verb} effect '{}'", updated.label());
        let (effect_id, visible) = (updated.id.clone(), updated.visible);

        let command = UpdateEffectCommand::new(store, index, updated, Some(description))?;
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::EffectVisibilityToggled { index, effect_id, visible });
        self.metrics.visibility_toggled += 1;
        Ok(visible)
    }

    // ---------- secondary effects ----------

    /// Create `effect_name` from the catalog and append it to the secondary
    /// effects of the effect at `parent`.
    pub fn create_secondary_effect(
        &mut self,
        store: &mut ProjectStateStore,
        parent: usize,
        effect_name: &str,
    ) -> EngineResult<Effect> {
        let result = self.run_create_secondary(store, parent, effect_name);
        self.track("createSecondaryEffect", result)
    }

    fn run_create_secondary(&mut self, store: &mut ProjectStateStore, parent: usize, effect_name: &str) -> EngineResult<Effect> {
        store.effect(parent)?;
        let effect = self.instantiate(store, effect_name, EffectType::Secondary)?;
        let command = AddSecondaryEffectCommand::new(store, parent, None, effect.clone())?;
        let index = command.index();
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::SecondaryEffectCreated { parent_index: parent, index, effect: effect.clone() });
        self.metrics.secondary_created += 1;
        Ok(effect)
    }

    pub fn delete_secondary_effect(&mut self, store: &mut ProjectStateStore, parent: usize, index: usize) -> EngineResult<Effect> {
        let result = self.run_delete_secondary(store, parent, index);
        self.track("deleteSecondaryEffect", result)
    }

    fn run_delete_secondary(&mut self, store: &mut ProjectStateStore, parent: usize, index: usize) -> EngineResult<Effect> {
        let command = DeleteSecondaryEffectCommand::new(store, parent, index)?;
        let effect = command.effect().clone();
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::SecondaryEffectDeleted { parent_index: parent, index, effect: effect.clone() });
        self.metrics.secondary_deleted += 1;
        Ok(effect)
    }

    pub fn reorder_secondary_effects(
        &mut self,
        store: &mut ProjectStateStore,
        parent: usize,
        from: usize,
        to: usize,
    ) -> EngineResult<()> {
        let result = self
            .commands
            .execute(store, ReorderSecondaryEffectsCommand::new(parent, from, to))
            .map(|()| {
                self.bus.emit(EventPayload::SecondaryEffectsReordered { parent_index: parent, from, to });
                self.metrics.secondary_reordered += 1;
            });
        self.track("reorderSecondaryEffects", result)
    }

    // ---------- keyframe effects ----------

    /// Create `effect_name` from the catalog as a keyframe effect starting at
    /// `frame` under the effect at `parent`.
    pub fn create_keyframe_effect(
        &mut self,
        store: &mut ProjectStateStore,
        parent: usize,
        effect_name: &str,
        frame: u32,
    ) -> EngineResult<Effect> {
        let result = self.run_create_keyframe(store, parent, effect_name, frame);
        self.track("createKeyframeEffect", result)
    }

    fn run_create_keyframe(
        &mut self,
        store: &mut ProjectStateStore,
        parent: usize,
        effect_name: &str,
        frame: u32,
    ) -> EngineResult<Effect> {
        store.effect(parent)?;
        let frames = store.project().number_of_frames;
        if frame >= frames {
            return Err(EngineError::validation(format!("frame {frame} beyond project length {frames}")));
        }
        let effect = self.instantiate(store, effect_name, EffectType::KeyFrame)?;
        let command = AddKeyframeEffectCommand::new(store, parent, None, KeyframeEffect::new(frame, effect.clone()))?;
        let index = command.index();
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::KeyframeEffectCreated {
            parent_index: parent,
            index,
            frame,
            effect: effect.clone(),
        });
        self.metrics.keyframe_created += 1;
        Ok(effect)
    }

    pub fn delete_keyframe_effect(&mut self, store: &mut ProjectStateStore, parent: usize, index: usize) -> EngineResult<Effect> {
        let result = self.run_delete_keyframe(store, parent, index);
        self.track("deleteKeyframeEffect", result)
    }

    fn run_delete_keyframe(&mut self, store: &mut ProjectStateStore, parent: usize, index: usize) -> EngineResult<Effect> {
        let command = DeleteKeyframeEffectCommand::new(store, parent, index)?;
        let KeyframeEffect { frame, effect } = command.keyframe().clone();
        self.commands.execute(store, command)?;
        self.bus.emit(EventPayload::KeyframeEffectDeleted {
            parent_index: parent,
            index,
            frame,
            effect: effect.clone(),
        });
        self.metrics.keyframe_deleted += 1;
        Ok(effect)
    }

    pub fn reorder_keyframe_effects(
        &mut self,
        store: &mut ProjectStateStore,
        parent: usize,
        from: usize,
        to: usize,
    ) -> EngineResult<()> {
        let result = self
            .commands
            .execute(store, ReorderKeyframeEffectsCommand::new(parent, from, to))
            .map(|()| {
                self.bus.emit(EventPayload::KeyframeEffectsReordered { parent_index: parent, from, to });
                self.metrics.keyframe_reordered += 1;
            });
        self.track("reorderKeyframeEffects", result)
    }

    // ---------- project & history ----------

    /// Apply project settings. A canvas change rescales the effect tree.
    ///
    /// Settings changes are not recorded in undo history. A rescale drops
    /// the history, since its snapshots hold the old canvas's coordinates.
    pub fn update_project(&mut self, store: &mut ProjectStateStore, update: &ProjectUpdate) -> EngineResult<bool> {
        let result = store.update(update).map(|rescaled| {
            if rescaled && (self.commands.can_undo() || self.commands.can_redo()) {
                info!(
                    "Canvas changed, dropping {} undo / {} redo entries",
                    self.commands.undo_len(),
                    self.commands.redo_len()
                );
                self.commands.clear();
            }
            let dimensions = store.get_resolution_dimensions();
            self.bus.emit(EventPayload::ProjectUpdated { dimensions, rescaled });
            self.metrics.project_updates += 1;
            rescaled
        });
        self.track("updateProject", result)
    }

    pub fn undo(&mut self, store: &mut ProjectStateStore) -> EngineResult<bool> {
        let result = self.commands.undo(store);
        self.track("undo", result)
    }

    pub fn redo(&mut self, store: &mut ProjectStateStore) -> EngineResult<bool> {
        let result = self.commands.redo(store);
        self.track("redo", result)
    }

    pub fn can_undo(&self) -> bool {
        self.commands.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.commands.can_redo()
    }

    // ---------- helpers ----------

    fn resolve(&self, effect_name: &str) -> EngineResult<CatalogEntry> {
        if effect_name.trim().is_empty() {
            return Err(EngineError::MissingDependency("effectName"));
        }
        self.catalog
            .lookup(effect_name)
            .ok_or_else(|| EngineError::validation(format!("effect '{effect_name}' not found in catalog")))
    }

    /// Fresh effect with defaults seeded for the project's canvas.
    fn instantiate(&self, store: &ProjectStateStore, effect_name: &str, effect_type: EffectType) -> EngineResult<Effect> {
        let entry = self.resolve(effect_name)?;
        let defaults = self.defaults.default_config(&entry.name)?;
        let config = center::detect_and_apply_center(&defaults, store.get_resolution_dimensions(), store.center_config());
        debug!("Instantiated '{}' for {}", entry.name, store.get_resolution_dimensions());
        Ok(Effect::new(&entry, effect_type, config))
    }

    fn track<T>(&mut self, op: &str, result: EngineResult<T>) -> EngineResult<T> {
        match &result {
            Ok(_) => self.metrics.last_operation = Some(now_millis()),
            Err(err) => {
                self.metrics.errors += 1;
                error!("{op} failed: {err}");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::effect_events::{Event, EventKind};
    use crate::entities::position::PositionValue;
    use crate::entities::project::{Project, Resolution};
    use glam::DVec2;
    use std::sync::{Arc, Mutex};

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("glow", "GlowEffect", "glow", EffectType::Primary),
            CatalogEntry::new("blur", "BlurEffect", "blur", EffectType::Primary),
            CatalogEntry::new("fade", "FadeEffect", "fade", EffectType::Secondary),
        ]
    }

    fn defaults(name: &str) -> anyhow::Result<Attrs> {
        let mut config = Attrs::new();
        if name == "glow" {
            config.set("position", PositionValue::position(960.0, 540.0).into());
            config.set("offset", PositionValue::position(100.0, 200.0).into());
        }
        Ok(config)
    }

    fn service() -> EffectOperationsService {
        let bus = EventBus::new();
        EffectOperationsService::builder()
            .command_service(CommandService::new(bus.clone()))
            .event_bus(bus)
            .catalog(catalog())
            .defaults(defaults)
            .build()
            .unwrap()
    }

    fn store(is_horizontal: bool) -> ProjectStateStore {
        ProjectStateStore::new(Project::new("ops", Resolution::Fhd, is_horizontal)).unwrap()
    }

    fn ids(store: &ProjectStateStore) -> Vec<String> {
        store.project().effects.iter().map(|e| e.id.clone()).collect()
    }

    fn record(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(kind, move |e| {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_builder_reports_missing_dependency() {
        let err = EffectOperationsService::builder()
            .event_bus(EventBus::new())
            .catalog(catalog())
            .defaults(defaults)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "commandService is required");

        let err = EffectOperationsService::builder()
            .command_service(CommandService::new(EventBus::new()))
            .event_bus(EventBus::new())
            .defaults(defaults)
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency("availableEffects")));
    }

    #[test]
    fn test_create_requires_effect_name() {
        let mut ops = service();
        let mut store = store(true);
        let err = ops.create_effect(&mut store, "", EffectType::Primary).unwrap_err();
        assert_eq!(err.to_string(), "effectName is required");
        assert_eq!(store.effects_len(), 0);
        assert!(!ops.can_undo());
        assert_eq!(ops.get_operation_metrics().errors, 1);
    }

    #[test]
    fn test_create_undo_redo_keeps_id() {
        let mut ops = service();
        let mut store = store(true);
        let created = record(ops.event_bus(), EventKind::EffectCreated);

        let effect = ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        assert!(ops.can_undo());
        assert!(effect.visible);
        assert_eq!(created.lock().unwrap().len(), 1);

        assert!(ops.undo(&mut store).unwrap());
        assert_eq!(store.effects_len(), 0);
        assert!(!ops.can_undo());

        assert!(ops.redo(&mut store).unwrap());
        assert_eq!(store.effect(0).unwrap().id, effect.id);
        assert_eq!(ops.get_operation_metrics().effects_created, 1);
    }

    #[test]
    fn test_create_seeds_defaults_for_canvas() {
        let mut ops = service();
        let mut store = store(false);

        let effect = ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        let center = effect.config.get_position("position").unwrap();
        assert_eq!(center.anchor(), DVec2::new(540.0, 960.0));
        assert!(center.is_center_override());
        let offset = effect.config.get_position("offset").unwrap();
        assert_eq!(offset.anchor(), DVec2::new(56.0, 356.0));
    }

    #[test]
    fn test_unknown_effect_is_validation_error() {
        let mut ops = service();
        let mut store = store(true);
        let err = ops.create_effect(&mut store, "sparkle", EffectType::Primary).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(ops.get_operation_metrics().errors, 1);
    }

    #[test]
    fn test_defaults_failure_surfaces() {
        let bus = EventBus::new();
        let mut ops = EffectOperationsService::builder()
            .command_service(CommandService::new(bus.clone()))
            .event_bus(bus)
            .catalog(catalog())
            .defaults(|_: &str| -> anyhow::Result<Attrs> { anyhow::bail!("defaults offline") })
            .build()
            .unwrap();
        let mut store = store(true);
        let err = ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap_err();
        assert!(err.to_string().contains("defaults offline"));
        assert_eq!(store.effects_len(), 0);
    }

    #[test]
    fn test_create_with_config() {
        let mut ops = service();
        let mut store = store(true);
        let events = record(ops.event_bus(), EventKind::EffectCreatedWithConfig);

        let mut config = Attrs::new();
        config.set("position", PositionValue::position(10.0, 20.0).into());
        let effect = ops
            .create_effect_with_config(&mut store, "blur", EffectType::Final, config.clone(), Some(25.0))
            .unwrap();
        assert_eq!(effect.config, config);
        assert_eq!(effect.percent_chance, Some(25.0));
        assert_eq!(effect.effect_type, EffectType::Final);
        assert_eq!(events.lock().unwrap().len(), 1);

        assert!(ops.create_effect_with_config(&mut store, "blur", EffectType::Primary, Attrs::new(), Some(101.0)).is_err());
        assert_eq!(store.effects_len(), 1);
    }

    #[test]
    fn test_delete_undo_restores_at_index() {
        let mut ops = service();
        let mut store = store(true);
        let first = ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        ops.create_effect(&mut store, "blur", EffectType::Primary).unwrap();

        let deleted = ops.delete_effect(&mut store, 0).unwrap();
        assert_eq!(deleted.id, first.id);
        assert_eq!(store.effects_len(), 1);

        ops.undo(&mut store).unwrap();
        assert_eq!(store.effect(0).unwrap().id, first.id);
        assert_eq!(store.effects_len(), 2);
    }

    #[test]
    fn test_reorder_and_undo() {
        let mut ops = service();
        let mut store = store(true);
        for name in ["glow", "blur", "glow"] {
            ops.create_effect(&mut store, name, EffectType::Primary).unwrap();
        }
        let original = ids(&store);

        ops.reorder_effects(&mut store, 0, 2).unwrap();
        assert_eq!(ids(&store), vec![original[1].clone(), original[2].clone(), original[0].clone()]);

        ops.undo(&mut store).unwrap();
        assert_eq!(ids(&store), original);
        assert_eq!(ops.get_operation_metrics().effects_reordered, 1);
    }

    #[test]
    fn test_toggle_visibility_descriptions() {
        let mut ops = service();
        let mut store = store(true);
        let toggles = record(ops.event_bus(), EventKind::EffectVisibilityToggled);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();

        assert!(!ops.toggle_effect_visibility(&mut store, 0).unwrap());
        assert_eq!(ops.command_service().undo_descriptions()[0], "Hid effect 'glow'");
        assert!(ops.toggle_effect_visibility(&mut store, 0).unwrap());
        assert_eq!(ops.command_service().undo_descriptions()[0], "Shown effect 'glow'");

        ops.undo(&mut store).unwrap();
        assert!(!store.effect(0).unwrap().visible);
        assert_eq!(toggles.lock().unwrap().len(), 2);
        assert_eq!(ops.get_operation_metrics().visibility_toggled, 2);
    }

    #[test]
    fn test_update_preserves_id_and_clears_moved_tags() {
        let mut ops = service();
        let mut store = store(false);
        let created = ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();

        let moved = created.config.get_position("offset").unwrap().with_anchor(DVec2::new(5.0, 5.0));
        assert!(moved.is_proportionally_scaled());
        let mut edited = created.clone();
        edited.id = "something-else".into();
        edited.config.set("offset", moved.into());
        ops.update_effect(&mut store, 0, edited).unwrap();

        let stored = store.effect(0).unwrap();
        assert_eq!(stored.id, created.id);
        assert!(stored.config.get_position("position").unwrap().is_center_override());
        assert!(stored.config.get_position("offset").unwrap().derived.is_none());

        ops.undo(&mut store).unwrap();
        assert_eq!(store.effect(0).unwrap(), &created);
    }

    #[test]
    fn test_index_errors_count() {
        let mut ops = service();
        let mut store = store(true);
        assert!(ops.delete_effect(&mut store, 0).unwrap_err().is_index_error());
        assert!(ops.reorder_effects(&mut store, 0, 1).unwrap_err().is_index_error());
        assert!(ops.toggle_effect_visibility(&mut store, 4).is_err());
        let metrics = ops.get_operation_metrics();
        assert_eq!(metrics.errors, 3);
        assert_eq!(metrics.last_operation, None);
    }

    #[test]
    fn test_nested_operations() {
        let mut ops = service();
        let mut store = store(true);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();

        let s1 = ops.create_secondary_effect(&mut store, 0, "fade").unwrap();
        let s2 = ops.create_secondary_effect(&mut store, 0, "blur").unwrap();
        assert_eq!(s1.effect_type, EffectType::Secondary);
        ops.reorder_secondary_effects(&mut store, 0, 0, 1).unwrap();
        assert_eq!(store.secondary_effect(0, 0).unwrap().id, s2.id);
        ops.delete_secondary_effect(&mut store, 0, 1).unwrap();
        ops.undo(&mut store).unwrap();
        assert_eq!(store.secondary_effect(0, 1).unwrap().id, s1.id);

        let k1 = ops.create_keyframe_effect(&mut store, 0, "blur", 10).unwrap();
        ops.create_keyframe_effect(&mut store, 0, "fade", 20).unwrap();
        ops.reorder_keyframe_effects(&mut store, 0, 1, 0).unwrap();
        assert_eq!(store.keyframe_effect(0, 1).unwrap().effect.id, k1.id);
        ops.delete_keyframe_effect(&mut store, 0, 1).unwrap();
        assert_eq!(store.keyframe_len(0).unwrap(), 1);

        assert!(ops.create_keyframe_effect(&mut store, 0, "blur", 500).is_err());
        assert!(ops.create_secondary_effect(&mut store, 3, "fade").unwrap_err().is_index_error());

        let metrics = ops.get_operation_metrics();
        assert_eq!(metrics.secondary_created, 2);
        assert_eq!(metrics.secondary_reordered, 1);
        assert_eq!(metrics.secondary_deleted, 1);
        assert_eq!(metrics.keyframe_created, 2);
        assert_eq!(metrics.keyframe_reordered, 1);
        assert_eq!(metrics.keyframe_deleted, 1);
        assert_eq!(metrics.errors, 2);
    }

    #[test]
    fn test_update_project_emits_and_rescales() {
        let mut ops = service();
        let mut store = store(true);
        let updates = record(ops.event_bus(), EventKind::ProjectUpdated);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();

        assert!(ops.update_project(&mut store, &ProjectUpdate::default().horizontal(false)).unwrap());
        let center = *store.effect(0).unwrap().config.get_position("position").unwrap();
        assert_eq!(center.anchor(), DVec2::new(540.0, 960.0));

        let events = updates.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].payload, EventPayload::ProjectUpdated { rescaled: true, .. }));
    }

    #[test]
    fn test_canvas_change_drops_stale_history() {
        let mut ops = service();
        let mut store = store(true);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        ops.toggle_effect_visibility(&mut store, 0).unwrap();
        assert!(ops.can_undo());

        ops.update_project(&mut store, &ProjectUpdate::default().horizontal(false)).unwrap();
        assert!(!ops.can_undo());
        assert!(!ops.can_redo());
        assert!(!ops.undo(&mut store).unwrap());

        let position = *store.effect(0).unwrap().config.get_position("position").unwrap();
        assert_eq!(position.anchor(), DVec2::new(540.0, 960.0));
        assert!(center::is_center_position(
            position.anchor(),
            Some(store.get_resolution_dimensions()),
            store.center_config()
        ));
    }

    #[test]
    fn test_settings_only_update_keeps_history() {
        let mut ops = service();
        let mut store = store(true);
        ops.create_effect(&mut store, "blur", EffectType::Primary).unwrap();
        assert!(!ops.update_project(&mut store, &ProjectUpdate::default().frames(200)).unwrap());
        assert!(ops.can_undo());
    }

    #[test]
    fn test_update_rejects_child_reusing_sibling_id() {
        let mut ops = service();
        let mut store = store(true);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        ops.create_effect(&mut store, "blur", EffectType::Primary).unwrap();

        let mut edited = store.effect(0).unwrap().clone();
        edited.secondary_effects.push(store.effect(1).unwrap().clone());
        let err = ops.update_effect(&mut store, 0, edited).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(store.secondary_len(0).unwrap(), 0);
        assert!(store.get_state().validate().is_ok());
        assert_eq!(ops.get_operation_metrics().errors, 1);
    }

    #[test]
    fn test_failing_observer_does_not_break_operation() {
        let mut ops = service();
        let mut store = store(true);
        ops.event_bus().subscribe(EventKind::EffectCreated, |_| anyhow::bail!("observer broke"));
        let after = record(ops.event_bus(), EventKind::EffectCreated);

        ops.create_effect(&mut store, "blur", EffectType::Primary).unwrap();
        assert_eq!(after.lock().unwrap().len(), 1);
        assert_eq!(ops.event_bus().handler_error_count(), 1);
        assert_eq!(ops.get_operation_metrics().errors, 0);
    }

    #[test]
    fn test_reset_metrics() {
        let mut ops = service();
        let mut store = store(true);
        ops.create_effect(&mut store, "glow", EffectType::Primary).unwrap();
        assert!(ops.get_operation_metrics().last_operation.is_some());
        ops.reset_operation_metrics();
        assert_eq!(ops.get_operation_metrics(), OperationMetrics::default());
    }
}

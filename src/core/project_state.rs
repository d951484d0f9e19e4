//! ProjectStateStore: sole owner of the project document.
//!
//! Readers get copies ([`ProjectStateStore::get_state`]) or shared borrows;
//! writers go through [`ProjectStateStore::update`] (settings, with canvas
//! rescale) or the index-addressed structural mutators used by commands.
//!
//! Every mutator validates before touching the document, so a failed call
//! leaves the state exactly as it was.

use std::collections::HashSet;

use log::{debug, info};

use crate::config::CenterConfig;
use crate::entities::center::{self, ScaleContext};
use crate::entities::effect::{Effect, KeyframeEffect};
use crate::entities::project::{Dimensions, Project, ProjectUpdate};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, Default)]
pub struct ProjectStateStore {
    project: Project,
    center: CenterConfig,
}

impl ProjectStateStore {
    /// Store holding a validated `project`.
    pub fn new(project: Project) -> EngineResult<Self> {
        Self::with_config(project, CenterConfig::default())
    }

    pub fn with_config(project: Project, center: CenterConfig) -> EngineResult<Self> {
        project.validate()?;
        Ok(Self { project, center })
    }

    // ========== Whole-document access ==========

    /// Replace the whole document. Invalid input leaves the current one in place.
    pub fn initialize_project(&mut self, project: Project) -> EngineResult<()> {
        project.validate()?;
        info!(
            "Project '{}' initialized: {} {} effects",
            project.name,
            project.dimensions(),
            project.effects.len()
        );
        self.project = project;
        Ok(())
    }

    /// Parse and install a JSON document.
    pub fn initialize_from_json(&mut self, json: &str) -> EngineResult<()> {
        let project: Project =
            serde_json::from_str(json).map_err(|e| EngineError::validation(format!("malformed project: {e}")))?;
        self.initialize_project(project)
    }

    /// Snapshot copy of the document.
    pub fn get_state(&self) -> Project {
        self.project.clone()
    }

    /// Read-only view, for callers that don't need an owned copy.
    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn center_config(&self) -> &CenterConfig {
        &self.center
    }

    pub fn get_resolution_dimensions(&self) -> Dimensions {
        self.project.dimensions()
    }

    /// Merge `update` into the document.
    ///
    /// When the canvas dimensions change, every position-like value in the
    /// effect tree (nested effects included) is rewritten for the new canvas.
    /// The new tree is built on a copy and swapped in whole.
    ///
    /// Returns true if a rescale happened.
    pub fn update(&mut self, update: &ProjectUpdate) -> EngineResult<bool> {
        if update.number_of_frames == Some(0) {
            return Err(EngineError::validation("numberOfFrames must be at least 1"));
        }

        let old_dims = self.project.dimensions();
        let mut next = self.project.clone();
        update.apply_to(&mut next);
        let new_dims = next.dimensions();

        let rescaled = update.touches_canvas() && old_dims != new_dims;
        if rescaled {
            let ctx = ScaleContext::new(old_dims, new_dims);
            for effect in next.effects.iter_mut() {
                rescale_effect(effect, &ctx, &self.center);
            }
            info!("Rescaled {} effects: {} -> {}", next.effects.len(), old_dims, new_dims);
        } else {
            debug!("Project settings updated, canvas unchanged ({})", new_dims);
        }

        self.project = next;
        Ok(rescaled)
    }

    /// True if any effect in the tree carries `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.project
            .effects
            .iter()
            .any(|e| e.id == id || e.children().any(|c| c.id == id))
    }

    // ========== Primary effects ==========

    pub fn effects_len(&self) -> usize {
        self.project.effects.len()
    }

    pub fn effect(&self, index: usize) -> EngineResult<&Effect> {
        let len = self.project.effects.len();
        self.project
            .effects
            .get(index)
            .ok_or(EngineError::IndexOutOfRange { what: "effect", index, len })
    }

    pub fn insert_effect(&mut self, index: usize, effect: Effect) -> EngineResult<()> {
        self.check_new_id(&effect)?;
        insert_at(&mut self.project.effects, "effect", index, effect)
    }

    pub fn remove_effect(&mut self, index: usize) -> EngineResult<Effect> {
        remove_at(&mut self.project.effects, "effect", index)
    }

    /// Swap in `effect` at `index`; the slot must still hold the same id.
    /// Returns the replaced effect.
    pub fn replace_effect(&mut self, index: usize, effect: Effect) -> EngineResult<Effect> {
        let current = self.effect(index)?;
        if current.id != effect.id {
            return Err(EngineError::StaleIndex { what: "effect", index, expected: effect.id });
        }
        if effect.children().any(Effect::has_children) {
            return Err(EngineError::validation(format!("effect '{}' nests deeper than one level", effect.id)));
        }
        self.check_ids_free(&effect, Some(index))?;
        Ok(std::mem::replace(&mut self.project.effects[index], effect))
    }

    /// Move the effect at `from` so it ends up at `to` (remove, then insert).
    pub fn reorder_effects(&mut self, from: usize, to: usize) -> EngineResult<()> {
        move_item(&mut self.project.effects, "effect", from, to)
    }

    // ========== Secondary effects ==========

    pub fn secondary_len(&self, parent: usize) -> EngineResult<usize> {
        Ok(self.effect(parent)?.secondary_effects.len())
    }

    pub fn secondary_effect(&self, parent: usize, index: usize) -> EngineResult<&Effect> {
        let list = &self.effect(parent)?.secondary_effects;
        list.get(index)
            .ok_or(EngineError::IndexOutOfRange { what: "secondary effect", index, len: list.len() })
    }

    pub fn insert_secondary(&mut self, parent: usize, index: usize, effect: Effect) -> EngineResult<()> {
        self.check_new_id(&effect)?;
        self.check_leaf(&effect)?;
        insert_at(&mut self.parent_mut(parent)?.secondary_effects, "secondary effect", index, effect)
    }

    pub fn remove_secondary(&mut self, parent: usize, index: usize) -> EngineResult<Effect> {
        remove_at(&mut self.parent_mut(parent)?.secondary_effects, "secondary effect", index)
    }

    pub fn reorder_secondary(&mut self, parent: usize, from: usize, to: usize) -> EngineResult<()> {
        move_item(&mut self.parent_mut(parent)?.secondary_effects, "secondary effect", from, to)
    }

    // ========== Keyframe effects ==========

    pub fn keyframe_len(&self, parent: usize) -> EngineResult<usize> {
        Ok(self.effect(parent)?.keyframe_effects.len())
    }

    pub fn keyframe_effect(&self, parent: usize, index: usize) -> EngineResult<&KeyframeEffect> {
        let list = &self.effect(parent)?.keyframe_effects;
        list.get(index)
            .ok_or(EngineError::IndexOutOfRange { what: "keyframe effect", index, len: list.len() })
    }

    pub fn insert_keyframe(&mut self, parent: usize, index: usize, keyframe: KeyframeEffect) -> EngineResult<()> {
        self.check_new_id(&keyframe.effect)?;
        self.check_leaf(&keyframe.effect)?;
        insert_at(&mut self.parent_mut(parent)?.keyframe_effects, "keyframe effect", index, keyframe)
    }

    pub fn remove_keyframe(&mut self, parent: usize, index: usize) -> EngineResult<KeyframeEffect> {
        remove_at(&mut self.parent_mut(parent)?.keyframe_effects, "keyframe effect", index)
    }

    pub fn reorder_keyframes(&mut self, parent: usize, from: usize, to: usize) -> EngineResult<()> {
        move_item(&mut self.parent_mut(parent)?.keyframe_effects, "keyframe effect", from, to)
    }

    // ========== Helpers ==========

    fn parent_mut(&mut self, parent: usize) -> EngineResult<&mut Effect> {
        let len = self.project.effects.len();
        self.project
            .effects
            .get_mut(parent)
            .ok_or(EngineError::IndexOutOfRange { what: "parent effect", index: parent, len })
    }

    fn check_new_id(&self, effect: &Effect) -> EngineResult<()> {
        self.check_ids_free(effect, None)
    }

    /// Ids of `effect` and its children must be non-empty, distinct, and
    /// unused by the tree outside the primary slot `skip`.
    fn check_ids_free(&self, effect: &Effect, skip: Option<usize>) -> EngineResult<()> {
        let mut incoming: HashSet<&str> = HashSet::new();
        for e in std::iter::once(effect).chain(effect.children()) {
            if e.id.is_empty() {
                return Err(EngineError::validation("effect id must not be empty"));
            }
            if !incoming.insert(e.id.as_str()) {
                return Err(EngineError::validation(format!("duplicate effect id '{}'", e.id)));
            }
        }
        let taken = self
            .project
            .effects
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .flat_map(|(_, e)| std::iter::once(e).chain(e.children()))
            .find(|e| incoming.contains(e.id.as_str()));
        match taken {
            Some(e) => Err(EngineError::validation(format!("duplicate effect id '{}'", e.id))),
            None => Ok(()),
        }
    }

    fn check_leaf(&self, effect: &Effect) -> EngineResult<()> {
        if effect.has_children() {
            return Err(EngineError::validation(format!(
                "nested effect '{}' cannot carry its own children",
                effect.id
            )));
        }
        Ok(())
    }
}

fn rescale_effect(effect: &mut Effect, ctx: &ScaleContext, cfg: &CenterConfig) {
    effect.config = center::rescale_attrs(&effect.config, ctx, cfg);
    for child in effect.children_mut() {
        rescale_effect(child, ctx, cfg);
    }
}

fn insert_at<T>(list: &mut Vec<T>, what: &'static str, index: usize, item: T) -> EngineResult<()> {
    // Insert positions run 0..=len
    EngineError::check_index(what, index, list.len() + 1)?;
    list.insert(index, item);
    Ok(())
}

fn remove_at<T>(list: &mut Vec<T>, what: &'static str, index: usize) -> EngineResult<T> {
    EngineError::check_index(what, index, list.len())?;
    Ok(list.remove(index))
}

fn move_item<T>(list: &mut Vec<T>, what: &'static str, from: usize, to: usize) -> EngineResult<()> {
    EngineError::check_index(what, from, list.len())?;
    EngineError::check_index(what, to, list.len())?;
    let item = list.remove(from);
    list.insert(to, item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attrs::{AttrValue, Attrs};
    use crate::entities::effect::{CatalogEntry, EffectType};
    use crate::entities::position::{ArcPath, PositionShape, PositionValue};
    use crate::entities::project::Resolution;
    use glam::DVec2;

    fn fx(id: &str) -> Effect {
        let entry = CatalogEntry::new("hex", "HexEffect", "hex", EffectType::Primary);
        let mut e = Effect::new(&entry, EffectType::Primary, Attrs::new());
        e.id = id.to_string();
        e
    }

    fn fx_at(id: &str, x: f64, y: f64) -> Effect {
        let mut e = fx(id);
        e.config.set("position", PositionValue::position(x, y).into());
        e
    }

    fn store_with(effects: Vec<Effect>) -> ProjectStateStore {
        let mut project = Project::new("test", Resolution::Fhd, true);
        project.effects = effects;
        ProjectStateStore::new(project).unwrap()
    }

    fn ids(store: &ProjectStateStore) -> Vec<String> {
        store.project().effects.iter().map(|e| e.id.clone()).collect()
    }

    fn pos(effect: &Effect) -> PositionValue {
        *effect.config.get_position("position").unwrap()
    }

    #[test]
    fn test_initialize_rejects_without_partial_write() {
        let mut store = store_with(vec![fx("a")]);
        let before = store.get_state();

        let mut bad = Project::default();
        bad.effects = vec![fx("x"), fx("x")];
        assert!(matches!(store.initialize_project(bad), Err(EngineError::Validation(_))));
        assert_eq!(store.get_state(), before);

        assert!(store.initialize_from_json(r#"{"name": "p", "effects": {}}"#).is_err());
        assert!(store.initialize_from_json(r#"{"name": "p", "targetResolution": "giant"}"#).is_err());
        assert_eq!(store.get_state(), before);
    }

    #[test]
    fn test_initialize_from_json() {
        let mut store = ProjectStateStore::default();
        store
            .initialize_from_json(
                r#"{"name": "p", "targetResolution": 1280, "isHorizontal": false,
                    "effects": [{"id": "e1", "name": "glow", "config": {"position": {"name": "position", "x": 360, "y": 640}}}]}"#,
            )
            .unwrap();
        assert_eq!(store.get_resolution_dimensions(), Dimensions::new(720, 1280));
        assert_eq!(store.effects_len(), 1);
        assert_eq!(pos(store.effect(0).unwrap()).anchor(), DVec2::new(360.0, 640.0));
    }

    #[test]
    fn test_get_state_is_a_copy() {
        let store = store_with(vec![fx("a")]);
        let mut snapshot = store.get_state();
        snapshot.effects.clear();
        snapshot.name = "changed".into();
        assert_eq!(store.effects_len(), 1);
        assert_eq!(store.project().name, "test");
    }

    #[test]
    fn test_centered_position_follows_orientation() {
        let mut store = store_with(vec![fx_at("a", 960.0, 540.0)]);

        let rescaled = store.update(&ProjectUpdate::default().horizontal(false)).unwrap();
        assert!(rescaled);
        assert_eq!(store.get_resolution_dimensions(), Dimensions::new(1080, 1920));

        let p = pos(store.effect(0).unwrap());
        assert_eq!(p.anchor(), DVec2::new(540.0, 960.0));
        assert!(p.is_center_override());
        assert!(center::is_center_position(p.anchor(), Some(Dimensions::new(1080, 1920)), store.center_config()));
    }

    #[test]
    fn test_arbitrary_position_scales() {
        let mut store = store_with(vec![fx_at("a", 100.0, 200.0)]);
        store.update(&ProjectUpdate::default().horizontal(false)).unwrap();

        let p = pos(store.effect(0).unwrap());
        assert_eq!(p.anchor(), DVec2::new(56.0, 356.0));
        assert!(p.is_proportionally_scaled());
    }

    #[test]
    fn test_round_trip_resolution_change() {
        let mut store = store_with(vec![fx_at("c", 960.0, 540.0), fx_at("a", 333.0, 777.0)]);

        store.update(&ProjectUpdate::default().resolution(Resolution::Qvga)).unwrap();
        store.update(&ProjectUpdate::default().resolution(Resolution::Fhd)).unwrap();

        assert_eq!(pos(store.effect(0).unwrap()).anchor(), DVec2::new(960.0, 540.0));
        let back = pos(store.effect(1).unwrap()).anchor();
        // 6x down and back up: within one source pixel of the scale step
        assert!((back.x - 333.0).abs() <= 6.0, "x drifted to {}", back.x);
        assert!((back.y - 777.0).abs() <= 6.0, "y drifted to {}", back.y);

        let mut store = store_with(vec![fx_at("a", 100.0, 200.0)]);
        store.update(&ProjectUpdate::default().horizontal(false)).unwrap();
        store.update(&ProjectUpdate::default().horizontal(true)).unwrap();
        assert_eq!(pos(store.effect(0).unwrap()).anchor(), DVec2::new(100.0, 200.0));
    }

    #[test]
    fn test_nested_effects_rescale() {
        let mut parent = fx_at("p", 10.0, 10.0);
        let mut arc = fx("s");
        arc.config.set(
            "arc",
            AttrValue::Position(PositionValue::arc_path(ArcPath::new(DVec2::new(960.0, 540.0), 400.0))),
        );
        parent.secondary_effects.push(arc);
        parent.keyframe_effects.push(KeyframeEffect::new(4, fx_at("k", 1900.0, 1000.0)));
        let mut store = store_with(vec![parent]);

        store.update(&ProjectUpdate::default().resolution(Resolution::Hd)).unwrap();

        let p = store.effect(0).unwrap();
        let arc = *p.secondary_effects[0].config.get_position("arc").unwrap();
        let PositionShape::ArcPath(arc) = arc.shape else { panic!("arc lost its shape") };
        assert_eq!(arc.center, DVec2::new(640.0, 360.0));
        assert!(arc.radius >= 10.0 && arc.radius <= 360.0);

        let k = pos(&p.keyframe_effects[0].effect);
        assert_eq!(k.anchor(), DVec2::new(1267.0, 667.0));
    }

    #[test]
    fn test_square_orientation_is_noop() {
        let mut project = Project::new("sq", Resolution::Square1080, true);
        project.effects = vec![fx_at("a", 100.0, 200.0)];
        let mut store = ProjectStateStore::new(project).unwrap();

        assert!(!store.update(&ProjectUpdate::default().horizontal(false)).unwrap());
        let p = pos(store.effect(0).unwrap());
        assert_eq!(p.anchor(), DVec2::new(100.0, 200.0));
        assert!(p.derived.is_none());
    }

    #[test]
    fn test_update_rejects_zero_frames() {
        let mut store = store_with(vec![]);
        let update = ProjectUpdate::default().frames(0).horizontal(false);
        assert!(store.update(&update).is_err());
        assert!(store.project().is_horizontal);
        assert_eq!(store.project().number_of_frames, 100);
    }

    #[test]
    fn test_structural_bounds() {
        let mut store = store_with(vec![fx("a")]);
        assert!(store.insert_effect(2, fx("b")).unwrap_err().is_index_error());
        assert!(store.remove_effect(1).unwrap_err().is_index_error());
        assert!(store.reorder_effects(0, 1).unwrap_err().is_index_error());
        assert!(store.insert_secondary(3, 0, fx("s")).unwrap_err().is_index_error());
        assert!(matches!(store.insert_effect(0, fx("a")), Err(EngineError::Validation(_))));
        assert_eq!(ids(&store), vec!["a"]);
    }

    #[test]
    fn test_reorder_is_remove_then_insert() {
        let mut store = store_with(vec![fx("A"), fx("B"), fx("C")]);
        store.reorder_effects(0, 2).unwrap();
        assert_eq!(ids(&store), vec!["B", "C", "A"]);
        store.reorder_effects(2, 0).unwrap();
        assert_eq!(ids(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_replace_checks_identity() {
        let mut store = store_with(vec![fx("a"), fx("b")]);
        let mut edited = fx("a");
        edited.visible = false;
        let previous = store.replace_effect(0, edited.clone()).unwrap();
        assert!(previous.visible);
        assert!(!store.effect(0).unwrap().visible);

        let err = store.replace_effect(1, edited).unwrap_err();
        assert!(matches!(err, EngineError::StaleIndex { index: 1, .. }));
    }

    #[test]
    fn test_replace_rejects_borrowed_child_ids() {
        let mut store = store_with(vec![fx("a"), fx("b")]);
        store.insert_secondary(0, 0, fx("a-s")).unwrap();

        let mut edited = store.effect(0).unwrap().clone();
        edited.secondary_effects.push(fx("b"));
        assert!(matches!(store.replace_effect(0, edited), Err(EngineError::Validation(_))));

        let mut twice = store.effect(0).unwrap().clone();
        twice.keyframe_effects.push(KeyframeEffect::new(3, fx("a-s")));
        assert!(matches!(store.replace_effect(0, twice), Err(EngineError::Validation(_))));

        assert_eq!(store.secondary_len(0).unwrap(), 1);
        assert_eq!(store.keyframe_len(0).unwrap(), 0);
        assert!(store.get_state().validate().is_ok());

        // Children the slot already owns may be kept or renamed freely.
        let mut renamed = store.effect(0).unwrap().clone();
        renamed.secondary_effects[0].id = "a-s2".to_string();
        renamed.secondary_effects.push(fx("a-s3"));
        store.replace_effect(0, renamed).unwrap();
        assert_eq!(store.secondary_len(0).unwrap(), 2);
        assert!(store.get_state().validate().is_ok());
    }

    #[test]
    fn test_nested_mutators() {
        let mut store = store_with(vec![fx("p")]);
        store.insert_secondary(0, 0, fx("s1")).unwrap();
        store.insert_secondary(0, 1, fx("s2")).unwrap();
        store.reorder_secondary(0, 0, 1).unwrap();
        assert_eq!(store.secondary_effect(0, 0).unwrap().id, "s2");

        store.insert_keyframe(0, 0, KeyframeEffect::new(10, fx("k1"))).unwrap();
        assert_eq!(store.keyframe_len(0).unwrap(), 1);
        let removed = store.remove_keyframe(0, 0).unwrap();
        assert_eq!(removed.frame, 10);

        let mut deep = fx("deep");
        deep.secondary_effects.push(fx("deeper"));
        assert!(store.insert_secondary(0, 0, deep).is_err());
        assert_eq!(store.secondary_len(0).unwrap(), 2);
    }
}

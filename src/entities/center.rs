//! Canvas-center classification and resolution-change geometry.
//!
//! Two separate questions are answered here:
//!
//! 1. **Is this value centered?** ([`should_apply_center`]) A position within
//!    tolerance of the canvas center (1% of each axis, 5% when no canvas is
//!    known), a field whose name says "center", or a value previously snapped
//!    by this module (`__centerOverrideApplied`).
//! 2. **How is it transformed?** ([`process_field_value`]) Centered values are
//!    snapped to the exact center of the new canvas; every other position-like
//!    value is scaled per axis by `new / old`.
//!
//! ```text
//! 1920x1080 -> 1080x1920
//!   (960, 540) centered  -> (540, 960)          __centerOverrideApplied
//!   (100, 200) arbitrary -> (56, 356)           __proportionallyScaled
//!   arc r=100            -> r = 100 * avg(0.5625, 1.7778), clamped to [10, 540]
//! ```
//!
//! All outputs are rounded to whole pixels, so R1 -> R2 -> R1 restores centered
//! values exactly and arbitrary ones within rounding error.

use std::sync::LazyLock;

use glam::DVec2;
use regex::Regex;

use super::attrs::{AttrValue, Attrs};
use super::position::{ArcPath, Derivation, PositionShape, PositionValue};
use super::project::Dimensions;
use crate::config::CenterConfig;

/// Slack for float noise on the tolerance boundary
const EPSILON: f64 = 1e-6;

static CENTER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cent(er|re)").expect("center field pattern"));

/// Old and new canvas for a rescale pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleContext {
    pub from: Dimensions,
    pub to: Dimensions,
}

impl ScaleContext {
    pub fn new(from: Dimensions, to: Dimensions) -> Self {
        Self { from, to }
    }

    /// Per-axis scale factors (new / old).
    pub fn factors(&self) -> DVec2 {
        self.to.as_vec2() / self.from.as_vec2().max(DVec2::ONE)
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

/// Canvas center, rounded to whole pixels.
pub fn get_center_position(dims: Dimensions) -> DVec2 {
    (dims.as_vec2() * 0.5).round()
}

/// True if `point` lies within tolerance of the canvas center on both axes.
///
/// With `dims == None` the reference canvas and the wider fallback tolerance
/// are used.
pub fn is_center_position(point: DVec2, dims: Option<Dimensions>, cfg: &CenterConfig) -> bool {
    let (dims, tolerance) = match dims {
        Some(d) => (d, cfg.tolerance),
        None => (cfg.reference_canvas, cfg.fallback_tolerance),
    };
    let delta = (point - get_center_position(dims)).abs();
    let limit = dims.as_vec2() * tolerance + DVec2::splat(EPSILON);
    delta.x <= limit.x && delta.y <= limit.y
}

/// True if a field name reads as a center marker ("center", "centre", "arcCenter", ...).
pub fn is_center_field_name(field_name: &str) -> bool {
    CENTER_NAME.is_match(field_name)
}

/// Classify a config value as intentionally centered.
///
/// Only position-like values can match; a field called "center" holding a
/// number does not.
pub fn should_apply_center(
    field_name: &str,
    value: &AttrValue,
    dims: Option<Dimensions>,
    cfg: &CenterConfig,
) -> bool {
    let Some(pos) = value.as_position() else {
        return false;
    };
    is_center_field_name(field_name) || pos.is_center_override() || is_center_position(pos.anchor(), dims, cfg)
}

fn clamp_radius(radius: f64, dims: Dimensions, cfg: &CenterConfig) -> f64 {
    let upper = (dims.min_side() as f64 / 2.0).max(cfg.min_arc_radius);
    radius.clamp(cfg.min_arc_radius, upper)
}

/// Proportionally remap a position-like value from `ctx.from` to `ctx.to`.
///
/// - Position / Point: each axis scaled independently; Point is additionally
///   clamped to `[0, dim - 1]`.
/// - ArcPath: center scaled like a Position, radius scaled by the mean of both
///   axis factors and clamped to `[min_arc_radius, min(w, h) / 2]`.
///
/// An identity context returns the value untouched.
pub fn scale_field_value(value: &PositionValue, ctx: &ScaleContext, cfg: &CenterConfig) -> PositionValue {
    if ctx.is_identity() {
        return *value;
    }
    let s = ctx.factors();
    let shape = match value.shape {
        PositionShape::Position(p) => PositionShape::Position((p * s).round()),
        PositionShape::Point(p) => {
            let max = (ctx.to.as_vec2() - DVec2::ONE).max(DVec2::ZERO);
            PositionShape::Point((p * s).round().clamp(DVec2::ZERO, max))
        }
        PositionShape::ArcPath(arc) => {
            let radius = (arc.radius * (s.x + s.y) / 2.0).round();
            PositionShape::ArcPath(ArcPath {
                center: (arc.center * s).round(),
                radius: clamp_radius(radius, ctx.to, cfg),
                ..arc
            })
        }
    };
    PositionValue { shape, derived: Some(Derivation::ProportionallyScaled) }
}

/// Snap a value to the exact center of `ctx.to`. Arc radii still scale.
fn recenter(value: &PositionValue, ctx: &ScaleContext, cfg: &CenterConfig) -> PositionValue {
    scale_field_value(value, ctx, cfg)
        .with_anchor(get_center_position(ctx.to))
        .with_derivation(Derivation::CenterOverride)
}

/// Rewrite a single field for a canvas change.
///
/// Centered values are recomputed at the new center, other position-like
/// values are scaled, anything else passes through unchanged.
pub fn process_field_value(field_name: &str, value: &AttrValue, ctx: &ScaleContext, cfg: &CenterConfig) -> AttrValue {
    match value {
        AttrValue::Position(pos) => {
            if should_apply_center(field_name, value, Some(ctx.from), cfg) {
                AttrValue::Position(recenter(pos, ctx, cfg))
            } else {
                AttrValue::Position(scale_field_value(pos, ctx, cfg))
            }
        }
        other => other.clone(),
    }
}

fn rescale_value(field_name: &str, value: &AttrValue, ctx: &ScaleContext, cfg: &CenterConfig) -> AttrValue {
    match value {
        AttrValue::Map(nested) => AttrValue::Map(rescale_attrs(nested, ctx, cfg)),
        // List items inherit the list's field name
        AttrValue::List(items) => {
            AttrValue::List(items.iter().map(|v| rescale_value(field_name, v, ctx, cfg)).collect())
        }
        leaf => process_field_value(field_name, leaf, ctx, cfg),
    }
}

/// Apply [`process_field_value`] to every field of an arbitrarily nested config.
pub fn rescale_attrs(attrs: &Attrs, ctx: &ScaleContext, cfg: &CenterConfig) -> Attrs {
    attrs
        .iter()
        .map(|(key, value)| (key.clone(), rescale_value(key, value, ctx, cfg)))
        .collect()
}

/// Seed a freshly created effect's default config for the target canvas.
///
/// Defaults are authored against `cfg.reference_canvas`.
pub fn detect_and_apply_center(config: &Attrs, target: Dimensions, cfg: &CenterConfig) -> Attrs {
    rescale_attrs(config, &ScaleContext::new(cfg.reference_canvas, target), cfg)
}

/// Drop derivation tags from position values the user moved.
///
/// A tag describes what the engine did last; once `after` differs from
/// `before` the value is user-placed again.
pub fn clear_moved_tags(before: &Attrs, after: &mut Attrs) {
    for (key, value) in after.iter_mut() {
        match (before.get(key), value) {
            (Some(AttrValue::Position(old)), AttrValue::Position(new)) => {
                if old.shape != new.shape {
                    new.derived = None;
                }
            }
            (Some(AttrValue::Map(old)), AttrValue::Map(new)) => clear_moved_tags(old, new),
            (None, AttrValue::Position(new)) => new.derived = None,
            _ => {}
        }
    }
}

//! Position-like config values.
//!
//! Three shapes carry canvas coordinates:
//!
//! | Shape | JSON | Notes |
//! |-------|------|-------|
//! | **Point** | `{x, y}` | legacy, unnamed; clamped to the canvas when scaled |
//! | **Position** | `{name: "position", x, y}` | named position |
//! | **ArcPath** | `{name: "arc-path", center: {x, y}, radius, startAngle, endAngle, direction}` | circular motion path |
//!
//! Any of them may carry a [`Derivation`] tag recording how the geometry engine
//! last rewrote it.

use glam::DVec2;

/// How a value was last rewritten by the geometry engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Derivation {
    /// Snapped to the exact canvas center
    CenterOverride,
    /// Remapped by the ratio of new to old canvas extent
    ProportionallyScaled,
}

/// Circular motion path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcPath {
    pub center: DVec2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub direction: f64,
}

impl ArcPath {
    pub fn new(center: DVec2, radius: f64) -> Self {
        Self {
            center,
            radius,
            start_angle: 0.0,
            end_angle: 360.0,
            direction: 1.0,
        }
    }
}

/// The coordinate-bearing shape itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PositionShape {
    /// Bare `{x, y}` (legacy)
    Point(DVec2),
    /// Named `position`
    Position(DVec2),
    /// Named `arc-path`
    ArcPath(ArcPath),
}

/// Position-like value plus its derivation tag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionValue {
    pub shape: PositionShape,
    pub derived: Option<Derivation>,
}

impl PositionValue {
    pub fn point(x: f64, y: f64) -> Self {
        Self { shape: PositionShape::Point(DVec2::new(x, y)), derived: None }
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self { shape: PositionShape::Position(DVec2::new(x, y)), derived: None }
    }

    pub fn arc_path(arc: ArcPath) -> Self {
        Self { shape: PositionShape::ArcPath(arc), derived: None }
    }

    pub fn with_derivation(mut self, derived: Derivation) -> Self {
        self.derived = Some(derived);
        self
    }

    /// Reference point used for center classification: the point itself, or the arc center.
    pub fn anchor(&self) -> DVec2 {
        match self.shape {
            PositionShape::Point(p) | PositionShape::Position(p) => p,
            PositionShape::ArcPath(arc) => arc.center,
        }
    }

    /// Same shape with its anchor moved to `anchor`.
    pub fn with_anchor(&self, anchor: DVec2) -> Self {
        let shape = match self.shape {
            PositionShape::Point(_) => PositionShape::Point(anchor),
            PositionShape::Position(_) => PositionShape::Position(anchor),
            PositionShape::ArcPath(arc) => PositionShape::ArcPath(ArcPath { center: anchor, ..arc }),
        };
        Self { shape, derived: self.derived }
    }

    pub fn is_center_override(&self) -> bool {
        self.derived == Some(Derivation::CenterOverride)
    }

    pub fn is_proportionally_scaled(&self) -> bool {
        self.derived == Some(Derivation::ProportionallyScaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_per_shape() {
        assert_eq!(PositionValue::point(1.0, 2.0).anchor(), DVec2::new(1.0, 2.0));
        assert_eq!(PositionValue::position(3.0, 4.0).anchor(), DVec2::new(3.0, 4.0));
        let arc = PositionValue::arc_path(ArcPath::new(DVec2::new(5.0, 6.0), 50.0));
        assert_eq!(arc.anchor(), DVec2::new(5.0, 6.0));
    }

    #[test]
    fn test_with_anchor_keeps_shape_and_tag() {
        let arc = PositionValue::arc_path(ArcPath::new(DVec2::new(5.0, 6.0), 50.0))
            .with_derivation(Derivation::ProportionallyScaled);
        let moved = arc.with_anchor(DVec2::new(10.0, 20.0));
        match moved.shape {
            PositionShape::ArcPath(a) => {
                assert_eq!(a.center, DVec2::new(10.0, 20.0));
                assert_eq!(a.radius, 50.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!(moved.is_proportionally_scaled());
    }
}

//! Field-name constants for config bags and persisted documents.
//!
//! Avoid string typos at the JSON boundary.
//! Usage: `obj.get(K_RADIUS)`

// === Position-like shape names ===
/// `name` discriminator of a named Position
pub const SHAPE_POSITION: &str = "position";
/// `name` discriminator of an ArcPath
pub const SHAPE_ARC_PATH: &str = "arc-path";

// === Position-like fields ===
/// Shape discriminator key
pub const K_NAME: &str = "name";
pub const K_X: &str = "x";
pub const K_Y: &str = "y";
/// ArcPath center point
pub const K_CENTER: &str = "center";
/// ArcPath radius (pixels)
pub const K_RADIUS: &str = "radius";
/// ArcPath start angle (degrees)
pub const K_START_ANGLE: &str = "startAngle";
/// ArcPath end angle (degrees)
pub const K_END_ANGLE: &str = "endAngle";
/// ArcPath travel direction (1 = clockwise, -1 = counter-clockwise)
pub const K_DIRECTION: &str = "direction";

// === Derivation tags ===
/// Set when a value was snapped to the exact canvas center
pub const TAG_CENTER_OVERRIDE: &str = "__centerOverrideApplied";
/// Set when a value was remapped proportionally to a new canvas
pub const TAG_PROPORTIONALLY_SCALED: &str = "__proportionallyScaled";

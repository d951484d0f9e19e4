//! Effect config storage: ordered string key -> typed value.
//!
//! Config bags arrive as free-form JSON from the defaults provider and from
//! persisted projects. They are converted once, at the serde boundary, into
//! [`AttrValue`] so that geometry code can match exhaustively on
//! [`AttrValue::Position`] instead of probing object shapes.
//!
//! Recognised position-like objects (see [`super::position`]):
//! - `{name: "position", x, y}` -> `PositionShape::Position`
//! - `{name: "arc-path", center: {x, y}, radius, ...}` -> `PositionShape::ArcPath`
//! - `{x, y}` with no other keys -> `PositionShape::Point`
//!
//! Anything else stays an ordinary nested map. Key order is preserved so a
//! project written back to disk diffs cleanly against its source.

use glam::DVec2;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::keys::*;
use super::position::{ArcPath, Derivation, PositionShape, PositionValue};

/// Generic config value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Position(PositionValue),
    List(Vec<AttrValue>),
    Map(Attrs),
}

impl AttrValue {
    pub fn as_position(&self) -> Option<&PositionValue> {
        match self {
            AttrValue::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON value, recognising position-like objects.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => n.as_f64().map(AttrValue::Float).unwrap_or(AttrValue::Null),
            },
            Value::String(s) => AttrValue::Str(s),
            Value::Array(items) => AttrValue::List(items.into_iter().map(AttrValue::from_json).collect()),
            Value::Object(obj) => match position_from_object(&obj) {
                Some(pos) => AttrValue::Position(pos),
                None => AttrValue::Map(Attrs::from_object(obj)),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::from(*i),
            AttrValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttrValue::Str(s) => Value::String(s.clone()),
            AttrValue::Position(p) => position_to_json(p),
            AttrValue::List(items) => Value::Array(items.iter().map(AttrValue::to_json).collect()),
            AttrValue::Map(attrs) => Value::Object(attrs.to_object()),
        }
    }
}

impl From<PositionValue> for AttrValue {
    fn from(value: PositionValue) -> Self {
        AttrValue::Position(value)
    }
}

/// Attribute container: string key -> typed value, insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Attrs {
    map: IndexMap<String, AttrValue>,
}

impl Attrs {
    pub fn new() -> Self {
        Self { map: IndexMap::new() }
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttrValue) {
        self.map.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut AttrValue> {
        self.map.get_mut(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.map.get(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(AttrValue::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.map.get(key) {
            Some(AttrValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_position(&self, key: &str) -> Option<&PositionValue> {
        self.map.get(key).and_then(AttrValue::as_position)
    }

    /// Remove attribute by key, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.map.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut AttrValue)> {
        self.map.iter_mut()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn from_object(obj: Map<String, Value>) -> Self {
        obj.into_iter()
            .map(|(k, v)| (k, AttrValue::from_json(v)))
            .collect()
    }

    fn to_object(&self) -> Map<String, Value> {
        self.map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
    }
}

impl FromIterator<(String, AttrValue)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self { map: iter.into_iter().collect() }
    }
}

impl TryFrom<Value> for Attrs {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(obj) => Ok(Attrs::from_object(obj)),
            Value::Null => Ok(Attrs::new()),
            other => Err(format!("config must be an object, got {other}")),
        }
    }
}

impl From<Attrs> for Value {
    fn from(attrs: Attrs) -> Self {
        Value::Object(attrs.to_object())
    }
}

// ============================================================================
// Position-like JSON boundary
// ============================================================================

const POINT_KEYS: &[&str] = &[K_X, K_Y, TAG_CENTER_OVERRIDE, TAG_PROPORTIONALLY_SCALED];
// Derivation tags live on the outer arc object only.
const ARC_CENTER_KEYS: &[&str] = &[K_X, K_Y];
const POSITION_KEYS: &[&str] = &[K_NAME, K_X, K_Y, TAG_CENTER_OVERRIDE, TAG_PROPORTIONALLY_SCALED];
const ARC_KEYS: &[&str] = &[
    K_NAME,
    K_CENTER,
    K_RADIUS,
    K_START_ANGLE,
    K_END_ANGLE,
    K_DIRECTION,
    TAG_CENTER_OVERRIDE,
    TAG_PROPORTIONALLY_SCALED,
];

fn only_keys(obj: &Map<String, Value>, allowed: &[&str]) -> bool {
    obj.keys().all(|k| allowed.contains(&k.as_str()))
}

fn xy(obj: &Map<String, Value>) -> Option<DVec2> {
    let x = obj.get(K_X)?.as_f64()?;
    let y = obj.get(K_Y)?.as_f64()?;
    Some(DVec2::new(x, y))
}

fn derivation(obj: &Map<String, Value>) -> Option<Derivation> {
    let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flag(TAG_CENTER_OVERRIDE) {
        Some(Derivation::CenterOverride)
    } else if flag(TAG_PROPORTIONALLY_SCALED) {
        Some(Derivation::ProportionallyScaled)
    } else {
        None
    }
}

fn position_from_object(obj: &Map<String, Value>) -> Option<PositionValue> {
    let shape = match obj.get(K_NAME) {
        Some(Value::String(name)) if name == SHAPE_POSITION && only_keys(obj, POSITION_KEYS) => {
            PositionShape::Position(xy(obj)?)
        }
        Some(Value::String(name)) if name == SHAPE_ARC_PATH && only_keys(obj, ARC_KEYS) => {
            let center = match obj.get(K_CENTER)? {
                Value::Object(c) if only_keys(c, ARC_CENTER_KEYS) => xy(c)?,
                _ => return None,
            };
            let num = |key: &str, default: f64| obj.get(key).and_then(Value::as_f64).unwrap_or(default);
            PositionShape::ArcPath(ArcPath {
                center,
                radius: obj.get(K_RADIUS)?.as_f64()?,
                start_angle: num(K_START_ANGLE, 0.0),
                end_angle: num(K_END_ANGLE, 360.0),
                direction: num(K_DIRECTION, 1.0),
            })
        }
        Some(_) => return None,
        None if only_keys(obj, POINT_KEYS) => PositionShape::Point(xy(obj)?),
        None => return None,
    };
    Some(PositionValue { shape, derived: derivation(obj) })
}

/// Whole-number coordinates are written as JSON integers.
fn coord(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn point_json(p: DVec2) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert(K_X.into(), coord(p.x));
    obj.insert(K_Y.into(), coord(p.y));
    obj
}

fn position_to_json(pos: &PositionValue) -> Value {
    let mut obj = match pos.shape {
        PositionShape::Point(p) => point_json(p),
        PositionShape::Position(p) => {
            let mut obj = Map::new();
            obj.insert(K_NAME.into(), Value::from(SHAPE_POSITION));
            obj.extend(point_json(p));
            obj
        }
        PositionShape::ArcPath(arc) => {
            let mut obj = Map::new();
            obj.insert(K_NAME.into(), Value::from(SHAPE_ARC_PATH));
            obj.insert(K_CENTER.into(), Value::Object(point_json(arc.center)));
            obj.insert(K_RADIUS.into(), coord(arc.radius));
            obj.insert(K_START_ANGLE.into(), coord(arc.start_angle));
            obj.insert(K_END_ANGLE.into(), coord(arc.end_angle));
            obj.insert(K_DIRECTION.into(), coord(arc.direction));
            obj
        }
    };
    match pos.derived {
        Some(Derivation::CenterOverride) => {
            obj.insert(TAG_CENTER_OVERRIDE.into(), Value::Bool(true));
        }
        Some(Derivation::ProportionallyScaled) => {
            obj.insert(TAG_PROPORTIONALLY_SCALED.into(), Value::Bool(true));
        }
        None => {}
    }
    Value::Object(obj)
}

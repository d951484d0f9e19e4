//! Project: top-level document (aggregate root).
//!
//! Holds the output settings (resolution bucket, orientation, frame count) and
//! the ordered effect tree. Project is the unit of serialization: documents are
//! saved and loaded via `Project::to_json_file` / `Project::from_json_file`.
//!
//! Canvas dimensions are never stored. They are a pure function of
//! `(target_resolution, is_horizontal)`; square buckets ignore orientation.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use glam::DVec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::effect::Effect;
use crate::error::{EngineError, EngineResult};

// ============================================================================
// Dimensions
// ============================================================================

/// Canvas size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(&self) -> DVec2 {
        DVec2::new(self.width as f64, self.height as f64)
    }

    pub fn swapped(&self) -> Self {
        Self { width: self.height, height: self.width }
    }

    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ============================================================================
// Resolution buckets
// ============================================================================

/// Named output resolution bucket. Dimensions are given in landscape form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Resolution {
    Qvga,
    Vga,
    Svga,
    Xga,
    Hd,
    Wxga,
    HdPlus,
    #[default]
    Fhd,
    Qhd,
    Uhd,
    Square720,
    Square1080,
    Square2048,
}

impl Resolution {
    pub const ALL: &'static [Resolution] = &[
        Resolution::Qvga,
        Resolution::Vga,
        Resolution::Svga,
        Resolution::Xga,
        Resolution::Hd,
        Resolution::Wxga,
        Resolution::HdPlus,
        Resolution::Fhd,
        Resolution::Qhd,
        Resolution::Uhd,
        Resolution::Square720,
        Resolution::Square1080,
        Resolution::Square2048,
    ];

    /// Canonical name used when serializing
    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Qvga => "qvga",
            Resolution::Vga => "vga",
            Resolution::Svga => "svga",
            Resolution::Xga => "xga",
            Resolution::Hd => "hd",
            Resolution::Wxga => "wxga",
            Resolution::HdPlus => "hdplus",
            Resolution::Fhd => "fhd",
            Resolution::Qhd => "qhd",
            Resolution::Uhd => "uhd",
            Resolution::Square720 => "square_720",
            Resolution::Square1080 => "square_1080",
            Resolution::Square2048 => "square_2048",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Resolution::Hd => &["720p"],
            Resolution::Fhd => &["1080p"],
            Resolution::Qhd => &["1440p"],
            Resolution::Uhd => &["4k", "2160p"],
            Resolution::Square1080 => &["square"],
            _ => &[],
        }
    }

    /// Landscape dimensions of the bucket
    pub fn base_dimensions(&self) -> Dimensions {
        match self {
            Resolution::Qvga => Dimensions::new(320, 240),
            Resolution::Vga => Dimensions::new(640, 480),
            Resolution::Svga => Dimensions::new(800, 600),
            Resolution::Xga => Dimensions::new(1024, 768),
            Resolution::Hd => Dimensions::new(1280, 720),
            Resolution::Wxga => Dimensions::new(1366, 768),
            Resolution::HdPlus => Dimensions::new(1600, 900),
            Resolution::Fhd => Dimensions::new(1920, 1080),
            Resolution::Qhd => Dimensions::new(2560, 1440),
            Resolution::Uhd => Dimensions::new(3840, 2160),
            Resolution::Square720 => Dimensions::new(720, 720),
            Resolution::Square1080 => Dimensions::new(1080, 1080),
            Resolution::Square2048 => Dimensions::new(2048, 2048),
        }
    }

    /// Numeric key: landscape width (side length for squares)
    pub fn key(&self) -> u32 {
        self.base_dimensions().width
    }

    pub fn is_square(&self) -> bool {
        self.base_dimensions().is_square()
    }

    /// Dimensions for the given orientation. Square buckets never swap.
    pub fn dimensions(&self, is_horizontal: bool) -> Dimensions {
        let base = self.base_dimensions();
        if is_horizontal || self.is_square() { base } else { base.swapped() }
    }

    pub fn from_key(key: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| u64::from(r.key()) == key)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resolution {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Ok(key) = s.parse::<u64>() {
            return Self::from_key(key)
                .ok_or_else(|| EngineError::validation(format!("unknown resolution key {key}")));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s || r.aliases().contains(&s.as_str()))
            .ok_or_else(|| EngineError::validation(format!("unknown resolution '{s}'")))
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Key(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Key(key) => Resolution::from_key(key)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown resolution key {key}"))),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Project
// ============================================================================

fn default_horizontal() -> bool {
    true
}

fn default_frames() -> u32 {
    100
}

/// Top-level project document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub target_resolution: Resolution,
    #[serde(default = "default_horizontal")]
    pub is_horizontal: bool,
    #[serde(default = "default_frames")]
    pub number_of_frames: u32,
    /// Name of the color scheme used by color-picking effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            artist: String::new(),
            target_resolution: Resolution::default(),
            is_horizontal: default_horizontal(),
            number_of_frames: default_frames(),
            color_scheme: None,
            effects: Vec::new(),
        }
    }
}

impl Project {
    pub fn new(name: &str, target_resolution: Resolution, is_horizontal: bool) -> Self {
        Self {
            name: name.to_string(),
            target_resolution,
            is_horizontal,
            ..Default::default()
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.target_resolution.dimensions(self.is_horizontal)
    }

    /// Check document invariants: frame count, id uniqueness, nesting depth.
    pub fn validate(&self) -> EngineResult<()> {
        if self.number_of_frames == 0 {
            return Err(EngineError::validation("numberOfFrames must be at least 1"));
        }
        let mut seen = HashSet::new();
        for effect in &self.effects {
            validate_effect(effect, 0, &mut seen)?;
        }
        Ok(())
    }

    /// Serialize project to a pretty JSON file (`.json` extension enforced).
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<PathBuf> {
        let json = serde_json::to_string_pretty(self).context("Serialize project")?;

        let path = path.as_ref();
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };

        fs::write(&path, json).with_context(|| format!("Write project {}", path.display()))?;
        Ok(path)
    }

    /// Load and validate a project from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("Read project {}", path.display()))?;
        let project: Project =
            serde_json::from_str(&json).with_context(|| format!("Parse project {}", path.display()))?;
        project.validate()?;
        Ok(project)
    }
}

fn validate_effect<'a>(effect: &'a Effect, depth: usize, seen: &mut HashSet<&'a str>) -> EngineResult<()> {
    if effect.id.is_empty() {
        return Err(EngineError::validation(format!("effect '{}' has an empty id", effect.label())));
    }
    if !seen.insert(effect.id.as_str()) {
        return Err(EngineError::validation(format!("duplicate effect id '{}'", effect.id)));
    }
    if let Some(chance) = effect.percent_chance {
        if !(0.0..=100.0).contains(&chance) {
            return Err(EngineError::validation(format!(
                "effect '{}' percentChance {chance} outside 0..=100",
                effect.id
            )));
        }
    }
    if depth > 0 && effect.has_children() {
        return Err(EngineError::validation(format!(
            "effect '{}' nests deeper than one level",
            effect.id
        )));
    }
    for child in effect.children() {
        validate_effect(child, depth + 1, seen)?;
    }
    Ok(())
}

// ============================================================================
// Partial update
// ============================================================================

/// Partial project update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub target_resolution: Option<Resolution>,
    pub is_horizontal: Option<bool>,
    pub number_of_frames: Option<u32>,
    pub color_scheme: Option<String>,
}

impl ProjectUpdate {
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.target_resolution = Some(resolution);
        self
    }

    pub fn horizontal(mut self, is_horizontal: bool) -> Self {
        self.is_horizontal = Some(is_horizontal);
        self
    }

    pub fn frames(mut self, number_of_frames: u32) -> Self {
        self.number_of_frames = Some(number_of_frames);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// True if the update touches resolution or orientation.
    pub fn touches_canvas(&self) -> bool {
        self.target_resolution.is_some() || self.is_horizontal.is_some()
    }

    /// Merge scalar fields into `project` (effects untouched).
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(artist) = &self.artist {
            project.artist = artist.clone();
        }
        if let Some(res) = self.target_resolution {
            project.target_resolution = res;
        }
        if let Some(h) = self.is_horizontal {
            project.is_horizontal = h;
        }
        if let Some(n) = self.number_of_frames {
            project.number_of_frames = n;
        }
        if let Some(scheme) = &self.color_scheme {
            project.color_scheme = Some(scheme.clone());
        }
    }
}

// src/dressing/registry.rs
//! Data-driven feature manifest + loader.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::anchor::AnchorSampler;
use super::core::{CellCoord, IntRange, StartPlates};

/// Manifest shipped with the game; also the fallback when the asset fails to load.
const BUILTIN_MANIFEST: &str = include_str!("../../assets/dressing/desert.dressing.ron");

// ---------- Public plugin to register asset+loader ----------

pub struct DressingManifestAssetPlugin;

impl Plugin for DressingManifestAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<DressingManifest>()
            .register_asset_loader(DressingManifestLoader);
    }
}

// ---------- Cluster shape (data form) ----------

/// Irregular-rectangle growth: footprint extents, per-row skew,
/// edge-row holes and the height random walk step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterShape {
    pub footprint: IntRange,
    #[serde(default = "default_skew")]
    pub skew: IntRange,
    #[serde(default = "default_hole")]
    pub hole: IntRange,
    #[serde(default = "default_height_step")]
    pub height_step: IntRange,
}

fn default_skew() -> IntRange {
    IntRange::new(-1, 1)
}
fn default_hole() -> IntRange {
    IntRange::new(0, 1)
}
fn default_height_step() -> IntRange {
    IntRange::new(-2, 2)
}

impl ClusterShape {
    pub fn with_footprint(footprint: IntRange) -> Self {
        Self {
            footprint,
            skew: default_skew(),
            hole: default_hole(),
            height_step: default_height_step(),
        }
    }
}

/// A cluster whose anchor and extents are pinned (the first sand bed).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedCluster {
    pub anchor: CellCoord,
    pub extents: (i32, i32),
}

// ---------- Render (data form) ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RenderDef {
    /// Box of CELL x CELL*h x CELL.
    Column {
        color: (f32, f32, f32),
        #[serde(default)]
        texture: Option<String>,
        #[serde(default)]
        y_offset: f32,
    },
    /// Flat tile covering one cell; height is recorded but not drawn.
    Tile {
        color: (f32, f32, f32),
        #[serde(default)]
        texture: Option<String>,
        #[serde(default)]
        y_offset: f32,
    },
}

// ---------- Feature definition (data form) ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    /// Name registered in the occupancy grid and stored on records.
    pub name: String,
    /// Clusters generated per session.
    pub count: u32,
    /// Cells already holding any of these names are skipped.
    #[serde(default)]
    pub conflicts: Vec<String>,
    pub anchor: AnchorSampler,
    pub shape: ClusterShape,
    #[serde(default)]
    pub fixed_first: Option<FixedCluster>,
    #[serde(default)]
    pub avoid_start_plates: bool,
    pub render: RenderDef,
}

/// Square of reserved cells around a spawn point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateDef {
    pub center: CellCoord,
    #[serde(default)]
    pub radius: i32,
}

// ---------- Runtime manifest asset ----------

#[derive(Asset, TypePath, Clone, Debug, Serialize, Deserialize)]
pub struct DressingManifest {
    #[serde(default)]
    pub start_plates: Vec<PlateDef>,
    /// Generation order; the anchor pool is shared front to back.
    pub features: Vec<FeatureDef>,
}

impl DressingManifest {
    pub fn from_ron_bytes(bytes: &[u8]) -> Result<Self, DressingManifestError> {
        let manifest: DressingManifest =
            ron::de::from_bytes(bytes).map_err(|e| DressingManifestError::Ron(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The bundled desert manifest.
    pub fn builtin() -> Result<Self, DressingManifestError> {
        Self::from_ron_bytes(BUILTIN_MANIFEST.as_bytes())
    }

    pub fn get(&self, name: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn start_plates(&self) -> StartPlates {
        let mut plates = StartPlates::new();
        for p in &self.start_plates {
            plates.reserve_square(p.center, p.radius);
        }
        plates
    }

    pub fn validate(&self) -> Result<(), DressingManifestError> {
        let mut names = HashSet::with_capacity(self.features.len());
        for (i, def) in self.features.iter().enumerate() {
            if !names.insert(def.name.as_str()) {
                let first = self
                    .features
                    .iter()
                    .position(|f| f.name == def.name)
                    .unwrap_or(i);
                return Err(DressingManifestError::DuplicateName {
                    name: def.name.clone(),
                    first: first as u32,
                    second: i as u32,
                });
            }
        }

        for def in &self.features {
            let invalid = |reason: &str| DressingManifestError::Invalid {
                name: def.name.clone(),
                reason: reason.to_string(),
            };

            if def.count == 0 {
                return Err(invalid("count must be at least 1"));
            }
            let s = &def.shape;
            if !s.footprint.is_valid() || s.footprint.min < 1 {
                return Err(invalid("footprint must be a range with min >= 1"));
            }
            if !s.skew.is_valid() || !s.hole.is_valid() || !s.height_step.is_valid() {
                return Err(invalid("skew/hole/height_step ranges need min <= max"));
            }
            let a = &def.anchor;
            if !(a.radius.is_finite() && a.radius >= 0.0)
                || !(a.min_separation.is_finite() && a.min_separation >= 0.0)
            {
                return Err(invalid("anchor radius and min_separation must be finite and >= 0"));
            }
            if let Some(fixed) = def.fixed_first {
                if fixed.extents.0 < 1 || fixed.extents.1 < 1 {
                    return Err(invalid("fixed_first extents must be >= 1"));
                }
            }
            if let Some(unknown) = def.conflicts.iter().find(|c| !names.contains(c.as_str())) {
                return Err(invalid(&format!("conflicts with unknown feature '{unknown}'")));
            }
        }
        Ok(())
    }
}

// ---------- Asset loader for `.dressing.ron` ----------

#[derive(Default)]
pub struct DressingManifestLoader;

impl AssetLoader for DressingManifestLoader {
    type Asset = DressingManifest;
    type Settings = ();
    type Error = DressingManifestError;

    fn extensions(&self) -> &[&str] {
        &["dressing.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        DressingManifest::from_ron_bytes(&bytes)
    }
}

// ---------- Loader errors ----------

#[derive(thiserror::Error, Debug)]
pub enum DressingManifestError {
    #[error("I/O while reading manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Duplicate feature name '{name}' (first idx {first}, second idx {second})")]
    DuplicateName { name: String, first: u32, second: u32 },
    #[error("Feature '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

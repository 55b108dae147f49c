// src/dressing/core.rs
//! Core types for cell-based terrain dressing.
//! Keep this file engine-light; placement, replay and the store build on it.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// World units per grid cell.
pub const CELL_SIZE: f32 = 20.0;

/// Feature name used by the stone-cluster pass.
pub const STONES: &str = "stones";
/// Feature name used by the sand-bed pass.
pub const SANDS: &str = "sands";

/// Seed for a generation session; changing it reshuffles every cluster.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(pub u64);

// ---------- Cells ----------

/// Integer cell coordinate on the XZ plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub const fn new(x: i32, z: i32) -> Self { Self { x, z } }

    /// Canonical key, e.g. `"-7/12"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.x, self.z)
    }

    /// Inverse of [`CellCoord::key`].
    pub fn from_key(key: &str) -> Result<Self, GridKeyError> {
        let malformed = || GridKeyError::Malformed(key.to_string());
        let (x, z) = key.split_once('/').ok_or_else(malformed)?;
        let x = x.parse::<i32>().map_err(|_| malformed())?;
        let z = z.parse::<i32>().map_err(|_| malformed())?;
        Ok(Self { x, z })
    }

    /// Euclidean distance in cell units.
    pub fn distance(&self, other: CellCoord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }

    /// World-space center of the cell at ground level.
    pub fn to_world(&self) -> Vec3 {
        Vec3::new(self.x as f32 * CELL_SIZE, 0.0, self.z as f32 * CELL_SIZE)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GridKeyError {
    #[error("malformed cell key '{0}' (expected 'x/z')")]
    Malformed(String),
}

// ---------- Records ----------

/// One placed cell of a cluster with its height class (>= 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterCell {
    pub x: i32,
    pub z: i32,
    pub h: u32,
}

impl ClusterCell {
    pub fn coord(&self) -> CellCoord { CellCoord::new(self.x, self.z) }
}

/// Everything needed to rebuild one cluster without re-rolling randomness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub name: String,
    /// Placeholder; generation leaves it empty.
    #[serde(default)]
    pub id: String,
    #[serde(alias = "data")]
    pub cells: Vec<ClusterCell>,
}

impl ClusterRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: String::new(), cells: Vec::new() }
    }
}

// ---------- Ranges ----------

/// Inclusive integer range drawn uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: i32,
    pub max: i32,
}

impl IntRange {
    pub const fn new(min: i32, max: i32) -> Self { Self { min, max } }
    pub const fn fixed(v: i32) -> Self { Self { min: v, max: v } }

    pub fn is_valid(&self) -> bool { self.min <= self.max }

    #[inline]
    pub fn sample<R: Rng>(&self, rng: &mut R) -> i32 {
        if self.min >= self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }
}

// ---------- Start plates ----------

/// Reserved cells near spawn points that must stay clear of obstacles.
#[derive(Clone, Debug, Default)]
pub struct StartPlates {
    cells: HashSet<CellCoord>,
}

impl StartPlates {
    pub fn new() -> Self { Self::default() }

    /// Reserve the `(2r+1)²` square of cells around `center`.
    pub fn reserve_square(&mut self, center: CellCoord, radius: i32) {
        let r = radius.max(0);
        for x in -r..=r {
            for z in -r..=r {
                self.cells.insert(CellCoord::new(center.x + x, center.z + z));
            }
        }
    }

    #[inline]
    pub fn contains(&self, c: CellCoord) -> bool { self.cells.contains(&c) }

    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
}

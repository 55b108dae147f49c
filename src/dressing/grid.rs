// src/dressing/grid.rs
//! Sparse occupancy grid: which feature names already claim a cell.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::core::{CellCoord, GridKeyError};

/// One grid update, forwarded to listeners as it happens.
#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct CellRegistration {
    pub coord: CellCoord,
    pub feature: String,
}

/// Cell -> feature names. Each entry is treated as a set.
/// Serialized as `"x/z" -> [names]` so snapshots stay readable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, Vec<String>>", try_from = "BTreeMap<String, Vec<String>>")]
pub struct OccupancyGrid {
    cells: HashMap<CellCoord, Vec<String>>,
}

impl OccupancyGrid {
    pub fn new() -> Self { Self::default() }

    /// Canonical key for a cell.
    #[inline]
    pub fn key(c: CellCoord) -> String { c.key() }

    /// True iff `feature` is registered at `c`. Unknown cells are empty.
    pub fn has(&self, c: CellCoord, feature: &str) -> bool {
        self.cells
            .get(&c)
            .is_some_and(|names| names.iter().any(|n| n == feature))
    }

    /// True iff any of `features` is registered at `c`.
    pub fn has_any<S: AsRef<str>>(&self, c: CellCoord, features: &[S]) -> bool {
        let Some(names) = self.cells.get(&c) else { return false };
        features
            .iter()
            .any(|f| names.iter().any(|n| n == f.as_ref()))
    }

    /// Add `feature` to the set at `c`. Returns false if it was already there.
    pub fn register(&mut self, c: CellCoord, feature: &str) -> bool {
        let names = self.cells.entry(c).or_default();
        if names.iter().any(|n| n == feature) {
            return false;
        }
        names.push(feature.to_string());
        true
    }

    pub fn features_at(&self, c: CellCoord) -> &[String] {
        self.cells.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    /// Cells carrying `feature`.
    pub fn count_feature(&self, feature: &str) -> usize {
        self.cells
            .values()
            .filter(|names| names.iter().any(|n| n == feature))
            .count()
    }
}

impl From<OccupancyGrid> for BTreeMap<String, Vec<String>> {
    fn from(grid: OccupancyGrid) -> Self {
        grid.cells
            .into_iter()
            .map(|(c, names)| (OccupancyGrid::key(c), names))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for OccupancyGrid {
    type Error = GridKeyError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let mut grid = OccupancyGrid::new();
        for (key, names) in map {
            let c = CellCoord::from_key(&key)?;
            for name in names {
                grid.register(c, &name);
            }
        }
        Ok(grid)
    }
}

// src/dressing/store.rs
//! Persistence of generated dressing: records per feature plus the grid.
//!
//! A missing save means "first run". Writes go to a temp file and are renamed
//! into place so a crash mid-write never leaves a half-written save.

use bevy::prelude::*;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::core::ClusterRecord;
use super::grid::OccupancyGrid;

pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Everything that survives a reload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DressingSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Feature name -> clusters, in generation order.
    #[serde(default)]
    pub objects: BTreeMap<String, Vec<ClusterRecord>>,
    #[serde(default)]
    pub grid: OccupancyGrid,
}

impl Default for DressingSnapshot {
    fn default() -> Self {
        Self { version: SNAPSHOT_VERSION, objects: BTreeMap::new(), grid: OccupancyGrid::new() }
    }
}

impl DressingSnapshot {
    /// No records stored yet: generate instead of replaying.
    pub fn is_start(&self) -> bool {
        self.objects.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error in {path}: {message}")]
    Ron { path: String, message: String },
    #[error("serialize error: {0}")]
    Encode(String),
    #[error("save version mismatch: found v{found}, expected v{expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// Backend the plugin hands generated dressing to.
pub trait DressingStore: Send + Sync + 'static {
    fn load(&self) -> Result<DressingSnapshot, StoreError>;
    fn save_objects(&self, feature: &str, records: &[ClusterRecord]) -> Result<(), StoreError>;
    fn save_grid(&self, grid: &OccupancyGrid) -> Result<(), StoreError>;
    /// Forget everything so the next start regenerates.
    fn reset(&self) -> Result<(), StoreError>;
}

/// Shared handle stored as a resource and cloned into IO tasks.
#[derive(Resource, Clone)]
pub struct DressingStoreHandle(pub Arc<dyn DressingStore>);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------- In-memory ----------

#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<DressingSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl DressingStore for MemoryStore {
    fn load(&self) -> Result<DressingSnapshot, StoreError> {
        Ok(lock(&self.snapshot).clone())
    }

    fn save_objects(&self, feature: &str, records: &[ClusterRecord]) -> Result<(), StoreError> {
        lock(&self.snapshot).objects.insert(feature.to_string(), records.to_vec());
        Ok(())
    }

    fn save_grid(&self, grid: &OccupancyGrid) -> Result<(), StoreError> {
        lock(&self.snapshot).grid = grid.clone();
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        *lock(&self.snapshot) = DressingSnapshot::default();
        Ok(())
    }
}

// ---------- RON file ----------

pub struct RonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles from concurrent save tasks.
    io: Mutex<()>,
}

impl RonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), io: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dressing".to_string());
        self.path.with_file_name(format!("{stem}.{suffix}"))
    }

    fn read(&self) -> Result<DressingSnapshot, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DressingSnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: DressingSnapshot = ron::from_str(&text).map_err(|e| StoreError::Ron {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            let backup = self.sibling(&format!("v{}.backup", snapshot.version));
            if let Err(e) = std::fs::copy(&self.path, &backup) {
                warn!("Dressing: failed to back up old save to {:?}: {}", backup, e);
            }
            return Err(StoreError::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        Ok(snapshot)
    }

    fn write(&self, snapshot: &DressingSnapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let text = ron::ser::to_string_pretty(snapshot, PrettyConfig::default())
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        let tmp = self.sibling("tmp");
        std::fs::write(&tmp, text.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Dressing: saved {:?} ({} bytes)", self.path, text.len());
        Ok(())
    }

    /// Read the current save, falling back to empty if it is unreadable.
    fn read_for_update(&self) -> DressingSnapshot {
        match self.read() {
            Ok(s) => s,
            Err(e) => {
                warn!("Dressing: overwriting unreadable save {:?}: {}", self.path, e);
                DressingSnapshot::default()
            }
        }
    }
}

impl DressingStore for RonFileStore {
    fn load(&self) -> Result<DressingSnapshot, StoreError> {
        let _guard = lock(&self.io);
        self.read()
    }

    fn save_objects(&self, feature: &str, records: &[ClusterRecord]) -> Result<(), StoreError> {
        let _guard = lock(&self.io);
        let mut snapshot = self.read_for_update();
        snapshot.objects.insert(feature.to_string(), records.to_vec());
        self.write(&snapshot)
    }

    fn save_grid(&self, grid: &OccupancyGrid) -> Result<(), StoreError> {
        let _guard = lock(&self.io);
        let mut snapshot = self.read_for_update();
        snapshot.grid = grid.clone();
        self.write(&snapshot)
    }

    fn reset(&self) -> Result<(), StoreError> {
        let _guard = lock(&self.io);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dressing::core::{CellCoord, ClusterCell, SANDS, STONES};

    fn temp_save(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("dunethree-tests")
            .join(format!("{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("dressing.ron")
    }

    fn stones() -> Vec<ClusterRecord> {
        vec![ClusterRecord {
            name: STONES.to_string(),
            id: String::new(),
            cells: vec![ClusterCell { x: 3, z: 4, h: 2 }, ClusterCell { x: 3, z: 5, h: 1 }],
        }]
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_start());

        store.save_objects(STONES, &stones()).unwrap();
        let mut grid = OccupancyGrid::new();
        grid.register(CellCoord::new(3, 4), STONES);
        store.save_grid(&grid).unwrap();

        let snap = store.load().unwrap();
        assert!(!snap.is_start());
        assert_eq!(snap.objects[STONES], stones());
        assert_eq!(snap.grid, grid);

        store.reset().unwrap();
        assert!(store.load().unwrap().is_start());
    }

    #[test]
    fn file_store_missing_file_is_start() {
        let store = RonFileStore::new(temp_save("missing"));
        let snap = store.load().unwrap();
        assert!(snap.is_start());
        assert_eq!(snap.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn file_store_persists_each_feature() {
        let path = temp_save("persist");
        let store = RonFileStore::new(&path);
        store.save_objects(STONES, &stones()).unwrap();
        store.save_objects(SANDS, &[]).unwrap();

        // a fresh handle sees both features
        let reopened = RonFileStore::new(&path);
        let snap = reopened.load().unwrap();
        assert_eq!(snap.objects.len(), 2);
        assert_eq!(snap.objects[STONES], stones());
        assert!(snap.objects[SANDS].is_empty());
        assert!(!path.with_file_name("dressing.tmp").exists());

        reopened.reset().unwrap();
        assert!(!path.exists());
        assert!(reopened.load().unwrap().is_start());
        // resetting twice is fine
        reopened.reset().unwrap();
    }

    #[test]
    fn file_store_version_mismatch_backs_up() {
        let path = temp_save("version");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "(version: 99, objects: {}, grid: {})").unwrap();

        let store = RonFileStore::new(&path);
        match store.load() {
            Err(StoreError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, SNAPSHOT_VERSION);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(path.with_file_name("dressing.v99.backup").exists());
    }

    #[test]
    fn file_store_reports_corrupt_save() {
        let path = temp_save("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not ron at all {").unwrap();
        let store = RonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Ron { .. })));

        // saving over it starts from a clean snapshot
        store.save_objects(STONES, &stones()).unwrap();
        assert_eq!(store.load().unwrap().objects[STONES], stones());
    }
}

// src/dressing/replay.rs
//! Rebuild geometry from stored cluster records. No randomness, no grid checks.

use super::core::{CellCoord, ClusterRecord};
use super::grid::OccupancyGrid;
use super::store::DressingSnapshot;

/// One renderable cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellPrimitive {
    pub feature: String,
    /// Index of the owning cluster within its feature.
    pub cluster: usize,
    pub coord: CellCoord,
    pub height: u32,
}

/// One primitive per stored cell, in stored order.
pub fn replay(records: &[ClusterRecord]) -> Vec<CellPrimitive> {
    let total = records.iter().map(|r| r.cells.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (cluster, rec) in records.iter().enumerate() {
        for cell in &rec.cells {
            out.push(CellPrimitive {
                feature: rec.name.clone(),
                cluster,
                coord: cell.coord(),
                height: cell.h,
            });
        }
    }
    out
}

/// Replay every feature of a snapshot in `order`; features without records are skipped.
pub fn replay_snapshot<'a>(
    snapshot: &DressingSnapshot,
    order: impl IntoIterator<Item = &'a str>,
) -> Vec<CellPrimitive> {
    order
        .into_iter()
        .filter_map(|name| snapshot.objects.get(name))
        .flat_map(|records| replay(records))
        .collect()
}

/// Grid implied by the stored records (for snapshots saved without one).
pub fn rebuild_grid(snapshot: &DressingSnapshot) -> OccupancyGrid {
    let mut grid = OccupancyGrid::new();
    for records in snapshot.objects.values() {
        for rec in records {
            for cell in &rec.cells {
                grid.register(cell.coord(), &rec.name);
            }
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dressing::core::{ClusterCell, WorldSeed, SANDS, STONES};
    use crate::dressing::placer::PlacementSession;
    use crate::dressing::registry::DressingManifest;
    use std::collections::HashSet;

    fn record(name: &str, cells: &[(i32, i32, u32)]) -> ClusterRecord {
        ClusterRecord {
            name: name.to_string(),
            id: String::new(),
            cells: cells.iter().map(|&(x, z, h)| ClusterCell { x, z, h }).collect(),
        }
    }

    #[test]
    fn replay_emits_stored_cells_in_order() {
        let records = vec![
            record(STONES, &[(1, 2, 1), (1, 3, 3)]),
            record(STONES, &[(9, 9, 2)]),
        ];
        let prims = replay(&records);
        assert_eq!(prims.len(), 3);
        assert_eq!(prims[1].coord, CellCoord::new(1, 3));
        assert_eq!(prims[1].height, 3);
        assert_eq!(prims[2].cluster, 1);
        assert!(prims.iter().all(|p| p.feature == STONES));
    }

    #[test]
    fn replay_ignores_session_seed() {
        let manifest = DressingManifest::builtin().unwrap();
        let plates = manifest.start_plates();
        let mut session = PlacementSession::from_seed(WorldSeed(31));
        let mut snapshot = DressingSnapshot::default();
        for def in &manifest.features {
            let recs = session.place_clusters(def, &plates).unwrap();
            snapshot.objects.insert(def.name.clone(), recs);
        }

        // stored text round trip, then two independent replays
        let text = ron::to_string(&snapshot).unwrap();
        let loaded: DressingSnapshot = ron::from_str(&text).unwrap();
        let a = replay_snapshot(&loaded, manifest.feature_names());
        let b = replay_snapshot(&loaded, manifest.feature_names());
        assert_eq!(a, b);

        let expected: HashSet<(CellCoord, u32)> = snapshot
            .objects
            .values()
            .flatten()
            .flat_map(|r| r.cells.iter().map(|c| (c.coord(), c.h)))
            .collect();
        let got: HashSet<(CellCoord, u32)> = a.iter().map(|p| (p.coord, p.height)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn replay_snapshot_skips_missing_features() {
        let mut snapshot = DressingSnapshot::default();
        snapshot.objects.insert(SANDS.to_string(), vec![record(SANDS, &[(0, 0, 1)])]);
        let prims = replay_snapshot(&snapshot, [STONES, SANDS]);
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0].feature, SANDS);
    }

    #[test]
    fn rebuild_grid_matches_records() {
        let mut snapshot = DressingSnapshot::default();
        snapshot.objects.insert(STONES.to_string(), vec![record(STONES, &[(1, 1, 1), (2, 1, 2)])]);
        snapshot.objects.insert(SANDS.to_string(), vec![record(SANDS, &[(5, 5, 1)])]);
        let grid = rebuild_grid(&snapshot);
        assert_eq!(grid.len(), 3);
        assert!(grid.has(CellCoord::new(2, 1), STONES));
        assert!(grid.has(CellCoord::new(5, 5), SANDS));
        assert!(!grid.has(CellCoord::new(5, 5), STONES));
    }
}

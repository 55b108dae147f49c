// src/dressing/placer.rs
//! Cluster placement over a shared occupancy grid (deterministic per seed).

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::anchor::AnchorPool;
use super::core::{CellCoord, ClusterCell, ClusterRecord, StartPlates, WorldSeed};
use super::error::DressingError;
use super::grid::{CellRegistration, OccupancyGrid};
use super::registry::{ClusterShape, FeatureDef};

/// One generation pass over every feature. The anchor pool and the grid
/// live here so later features see everything earlier ones claimed.
pub struct PlacementSession<R: Rng = ChaCha8Rng> {
    rng: R,
    pool: AnchorPool,
    grid: OccupancyGrid,
    registrations: Vec<CellRegistration>,
}

impl PlacementSession<ChaCha8Rng> {
    pub fn from_seed(seed: WorldSeed) -> Self {
        let mix = seed.0 ^ 0xD1B5_4A32_D192_ED03u64;
        Self::new(ChaCha8Rng::seed_from_u64(mix))
    }
}

impl<R: Rng> PlacementSession<R> {
    pub fn new(rng: R) -> Self {
        Self::with_grid(rng, OccupancyGrid::new())
    }

    /// Continue on top of an existing grid.
    pub fn with_grid(rng: R, grid: OccupancyGrid) -> Self {
        Self { rng, pool: AnchorPool::new(), grid, registrations: Vec::new() }
    }

    pub fn grid(&self) -> &OccupancyGrid { &self.grid }

    pub fn anchors(&self) -> &[CellCoord] { self.pool.anchors() }

    pub fn into_grid(self) -> OccupancyGrid { self.grid }

    /// Registrations made since the last drain, in program order.
    pub fn drain_registrations(&mut self) -> Vec<CellRegistration> {
        std::mem::take(&mut self.registrations)
    }

    /// Generate `def.count` clusters of `def.name`.
    /// A failed pass leaves the grid, anchor pool and pending
    /// registrations exactly as they were before the call.
    pub fn place_clusters(
        &mut self,
        def: &FeatureDef,
        start_plates: &StartPlates,
    ) -> Result<Vec<ClusterRecord>, DressingError> {
        let grid = self.grid.clone();
        let anchors = self.pool.anchors().len();
        let pending = self.registrations.len();

        let res = self.place_all(def, start_plates);
        if res.is_err() {
            self.grid = grid;
            self.pool.truncate(anchors);
            self.registrations.truncate(pending);
        }
        res
    }

    fn place_all(
        &mut self,
        def: &FeatureDef,
        start_plates: &StartPlates,
    ) -> Result<Vec<ClusterRecord>, DressingError> {
        let mut out = Vec::with_capacity(def.count as usize);

        for n in 0..def.count as usize {
            let (anchor, extents) = match def.fixed_first {
                Some(fixed) if n == 0 => {
                    self.pool.push(fixed.anchor);
                    (fixed.anchor, fixed.extents)
                }
                _ => {
                    let anchor = self.pool.draw(&mut self.rng, &def.anchor, &def.name, n)?;
                    let ext_x = def.shape.footprint.sample(&mut self.rng);
                    let ext_z = def.shape.footprint.sample(&mut self.rng);
                    (anchor, (ext_x, ext_z))
                }
            };

            let record = self.grow_cluster(def, anchor, extents, start_plates);
            debug!(
                "Dressing: {} #{} at {} extents {}x{} -> {} cells",
                def.name,
                n,
                anchor,
                extents.0,
                extents.1,
                record.cells.len()
            );
            out.push(record);
        }

        Ok(out)
    }

    /// Sweep the footprint; rejected cells are simply dropped.
    fn grow_cluster(
        &mut self,
        def: &FeatureDef,
        anchor: CellCoord,
        (ext_x, ext_z): (i32, i32),
        start_plates: &StartPlates,
    ) -> ClusterRecord {
        let shape: ClusterShape = def.shape;
        let mut record = ClusterRecord::new(def.name.clone());
        let mut height: i32 = 1;

        for x in 1..=ext_x {
            let skew = shape.skew.sample(&mut self.rng);
            let edge = x == 1 || x == ext_x;

            for z in 1..=ext_z {
                let hole = if edge { shape.hole.sample(&mut self.rng) } else { 0 };
                let c = CellCoord::new(anchor.x + x, anchor.z + z + skew + hole);

                if self.grid.has_any(c, def.conflicts.as_slice()) {
                    continue;
                }
                if def.avoid_start_plates && start_plates.contains(c) {
                    continue;
                }

                self.grid.register(c, &def.name);
                self.registrations.push(CellRegistration { coord: c, feature: def.name.clone() });

                height = (height + shape.height_step.sample(&mut self.rng)).max(1);
                record.cells.push(ClusterCell { x: c.x, z: c.z, h: height as u32 });
            }
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dressing::anchor::AnchorSampler;
    use crate::dressing::core::{IntRange, SANDS, STONES};
    use crate::dressing::registry::{DressingManifest, FixedCluster, RenderDef};
    use std::collections::HashSet;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    fn def(name: &str, conflicts: &[&str]) -> FeatureDef {
        FeatureDef {
            name: name.to_string(),
            count: 1,
            conflicts: conflicts.iter().map(|s| s.to_string()).collect(),
            anchor: AnchorSampler::new((0.0, 0.0), 10.0, 3.0),
            shape: ClusterShape::with_footprint(IntRange::new(5, 7)),
            fixed_first: None,
            avoid_start_plates: false,
            render: RenderDef::Tile { color: (1.0, 1.0, 1.0), texture: None, y_offset: 0.0 },
        }
    }

    fn generate_builtin(seed: u64) -> (Vec<ClusterRecord>, Vec<ClusterRecord>, PlacementSession) {
        let manifest = DressingManifest::builtin().unwrap();
        let plates = manifest.start_plates();
        let mut session = PlacementSession::from_seed(WorldSeed(seed));
        let stones = session.place_clusters(manifest.get(STONES).unwrap(), &plates).unwrap();
        let sands = session.place_clusters(manifest.get(SANDS).unwrap(), &plates).unwrap();
        (stones, sands, session)
    }

    #[test]
    fn five_by_five_without_conflicts_fills_every_cell() {
        let mut d = def(STONES, &[]);
        d.shape.footprint = IntRange::fixed(5);
        d.fixed_first = Some(FixedCluster { anchor: CellCoord::new(10, -4), extents: (5, 5) });

        let mut session = PlacementSession::new(rng(1));
        let records = session.place_clusters(&d, &StartPlates::new()).unwrap();
        assert_eq!(records.len(), 1);

        let cells = &records[0].cells;
        assert_eq!(cells.len(), 25);
        for c in cells {
            assert!((11..=15).contains(&c.x), "x out of range: {c:?}");
            // z + skew(-1..=1) + hole(0..=1)
            assert!((-4..=3).contains(&c.z), "z out of range: {c:?}");
            assert!(c.h >= 1);
        }
        // five cells per row
        for x in 11..=15 {
            assert_eq!(cells.iter().filter(|c| c.x == x).count(), 5);
        }
    }

    #[test]
    fn second_identical_pass_is_fully_rejected() {
        let fixed = FixedCluster { anchor: CellCoord::new(0, 0), extents: (6, 6) };
        let mut first = def(STONES, &[]);
        first.fixed_first = Some(fixed);
        first.shape.skew = IntRange::fixed(0);
        first.shape.hole = IntRange::fixed(0);

        let mut second = first.clone();
        second.conflicts = vec![STONES.to_string()];

        let mut session = PlacementSession::new(rng(2));
        let a = session.place_clusters(&first, &StartPlates::new()).unwrap();
        let b = session.place_clusters(&second, &StartPlates::new()).unwrap();
        assert_eq!(a[0].cells.len(), 36);
        assert_eq!(b.len(), 1);
        assert!(b[0].cells.is_empty());
    }

    #[test]
    fn cells_unique_within_self_conflicting_cluster() {
        let (stones, sands, _) = generate_builtin(42);
        for rec in stones.iter().chain(sands.iter()) {
            let unique: HashSet<CellCoord> = rec.cells.iter().map(ClusterCell::coord).collect();
            assert_eq!(unique.len(), rec.cells.len(), "duplicate cell in {}", rec.name);
        }
    }

    #[test]
    fn conflicting_features_never_share_cells() {
        for seed in [1, 7, 99, 2024] {
            let (stones, sands, _) = generate_builtin(seed);
            let stone_cells: HashSet<CellCoord> =
                stones.iter().flat_map(|r| r.cells.iter().map(ClusterCell::coord)).collect();

            let mut sand_cells = HashSet::new();
            for rec in &sands {
                for c in &rec.cells {
                    assert!(!stone_cells.contains(&c.coord()), "sand on stone at {:?}", c);
                    assert!(sand_cells.insert(c.coord()), "sand on sand at {:?}", c);
                }
            }
        }
    }

    #[test]
    fn heights_never_drop_below_one() {
        let (stones, sands, _) = generate_builtin(5);
        assert!(stones.iter().chain(sands.iter()).flat_map(|r| &r.cells).all(|c| c.h >= 1));
    }

    #[test]
    fn sampled_anchors_keep_separation() {
        let manifest = DressingManifest::builtin().unwrap();
        let stones = manifest.get(STONES).unwrap();
        let (_, _, session) = generate_builtin(77);
        let anchors = session.anchors();
        // 10 stones, fixed sand bed, 9 sampled sand anchors
        assert_eq!(anchors.len(), 20);

        let stone_anchors = &anchors[..10];
        for i in 0..stone_anchors.len() {
            for j in (i + 1)..stone_anchors.len() {
                assert!(stone_anchors[i].distance(stone_anchors[j]) >= stones.anchor.min_separation);
            }
        }
        let sands = manifest.get(SANDS).unwrap();
        for (i, a) in anchors.iter().enumerate().skip(11) {
            for b in &anchors[..i] {
                assert!(a.distance(*b) >= sands.anchor.min_separation);
            }
        }
    }

    #[test]
    fn stones_avoid_start_plates_sand_does_not() {
        let manifest = DressingManifest::builtin().unwrap();
        let plates = manifest.start_plates();
        for seed in [3, 8, 13] {
            let (stones, _, _) = generate_builtin(seed);
            for c in stones.iter().flat_map(|r| &r.cells) {
                assert!(!plates.contains(c.coord()), "stone on start plate at {:?}", c);
            }
        }

        // the fixed sand bed at (-7,-7) sweeps straight over the origin plate
        let (_, sands, _) = generate_builtin(3);
        assert!(sands[0].cells.iter().any(|c| plates.contains(c.coord())));
    }

    #[test]
    fn same_seed_same_output() {
        let (a_st, a_sa, a) = generate_builtin(123);
        let (b_st, b_sa, b) = generate_builtin(123);
        assert_eq!(a_st, b_st);
        assert_eq!(a_sa, b_sa);
        assert_eq!(a.grid(), b.grid());
    }

    #[test]
    fn registrations_match_grid() {
        let mut session = PlacementSession::new(rng(4));
        let d = def(SANDS, &[SANDS]);
        let records = session.place_clusters(&d, &StartPlates::new()).unwrap();
        let regs = session.drain_registrations();
        assert_eq!(regs.len(), records[0].cells.len());
        for (reg, cell) in regs.iter().zip(&records[0].cells) {
            assert_eq!(reg.coord, cell.coord());
            assert_eq!(reg.feature, SANDS);
            assert!(session.grid().has(reg.coord, SANDS));
        }
        assert!(session.drain_registrations().is_empty());
    }

    #[test]
    fn exhausted_anchor_space_propagates() {
        let mut d = def(STONES, &[STONES]);
        d.count = 3;
        d.anchor = AnchorSampler { center: (0.0, 0.0), radius: 0.0, min_separation: 1.0, max_attempts: 16 };
        let mut session = PlacementSession::new(rng(6));
        let err = session.place_clusters(&d, &StartPlates::new()).unwrap_err();
        assert!(matches!(err, DressingError::AnchorSpaceExhausted { cluster: 1, .. }));
    }

    #[test]
    fn failed_pass_leaves_no_cells_behind() {
        let mut session = PlacementSession::new(rng(8));
        let sands = def(SANDS, &[SANDS]);
        let kept = session.place_clusters(&sands, &StartPlates::new()).unwrap();
        let grid_before = session.grid().clone();
        let anchors_before = session.anchors().to_vec();

        let mut stones = def(STONES, &[STONES]);
        stones.count = 50;
        stones.anchor = AnchorSampler { center: (0.0, 0.0), radius: 6.0, min_separation: 3.0, max_attempts: 64 };
        assert!(session.place_clusters(&stones, &StartPlates::new()).is_err());

        assert_eq!(session.grid().count_feature(STONES), 0);
        assert_eq!(session.grid(), &grid_before);
        assert_eq!(session.anchors(), anchors_before.as_slice());
        // only the successful pass is left to drain
        assert_eq!(session.drain_registrations().len(), kept[0].cells.len());
    }
}

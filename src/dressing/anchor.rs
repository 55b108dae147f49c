// src/dressing/anchor.rs
//! Cluster anchor sampling: uniform disk + minimum-separation rejection.

use bevy::math::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::core::CellCoord;
use super::error::DressingError;

fn default_max_attempts() -> u32 {
    10_000
}

/// Where anchors for one feature are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorSampler {
    /// Disk center in cell units.
    pub center: (f32, f32),
    /// Disk radius in cell units.
    pub radius: f32,
    /// Minimum distance to every anchor already chosen this session.
    pub min_separation: f32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl AnchorSampler {
    pub fn new(center: (f32, f32), radius: f32, min_separation: f32) -> Self {
        Self { center, radius, min_separation, max_attempts: default_max_attempts() }
    }

    /// Uniform point in the disk, rounded to a cell.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> CellCoord {
        let p = sample_disk(rng, Vec2::new(self.center.0, self.center.1), self.radius);
        CellCoord::new(p.x.round() as i32, p.y.round() as i32)
    }
}

/// Uniform sample inside a disk (sqrt keeps the area density flat).
pub fn sample_disk<R: Rng>(rng: &mut R, center: Vec2, radius: f32) -> Vec2 {
    let r = radius.max(0.0) * rng.random::<f32>().sqrt();
    let theta = rng.random_range(0.0..std::f32::consts::TAU);
    center + Vec2::new(theta.cos(), theta.sin()) * r
}

/// Anchors chosen so far in a session, shared by every feature pass.
#[derive(Clone, Debug, Default)]
pub struct AnchorPool {
    anchors: Vec<CellCoord>,
}

impl AnchorPool {
    pub fn new() -> Self { Self::default() }

    pub fn anchors(&self) -> &[CellCoord] { &self.anchors }

    /// Add an anchor without a separation check (fixed anchors).
    pub fn push(&mut self, c: CellCoord) {
        self.anchors.push(c);
    }

    /// Forget anchors added after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.anchors.truncate(len);
    }

    /// True if `c` keeps at least `min_separation` from every pooled anchor.
    pub fn is_clear(&self, c: CellCoord, min_separation: f32) -> bool {
        self.anchors.iter().all(|a| a.distance(c) >= min_separation)
    }

    /// Draw until the candidate is clear of the pool, then record it.
    pub fn draw<R: Rng>(
        &mut self,
        rng: &mut R,
        sampler: &AnchorSampler,
        feature: &str,
        cluster: usize,
    ) -> Result<CellCoord, DressingError> {
        let attempts = sampler.max_attempts.max(1);
        for _ in 0..attempts {
            let c = sampler.sample(rng);
            if self.is_clear(c, sampler.min_separation) {
                self.anchors.push(c);
                return Ok(c);
            }
        }
        Err(DressingError::AnchorSpaceExhausted {
            feature: feature.to_string(),
            cluster,
            attempts,
        })
    }
}

// src/dressing/queue.rs
use bevy::prelude::*;
use super::replay::CellPrimitive;

/// One cell to spawn under its cluster group.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    pub primitive: CellPrimitive,
    pub parent: Entity,
}

/// Cells waiting for a mesh, filled by generation or replay.
#[derive(Resource, Default)]
pub struct SpawnQueue {
    pub items: Vec<SpawnRequest>,
}

/// Upper bound on cell entities spawned in one frame.
#[derive(Resource)]
pub struct SpawnQueueConfig {
    pub max_per_frame: usize,
}
impl Default for SpawnQueueConfig {
    fn default() -> Self { Self { max_per_frame: 400 } }
}

// src/dressing/render.rs
//! Cell primitives -> scene entities. Stones are columns, sand is flat tiles.

use bevy::prelude::*;
use std::collections::HashMap;

use super::core::{CellCoord, CELL_SIZE};
use super::queue::{SpawnQueue, SpawnQueueConfig};
use super::registry::{DressingManifest, RenderDef};
use super::replay::CellPrimitive;

/// Group entity for one cluster.
#[derive(Component, Debug, Clone)]
pub struct DressingCluster {
    pub feature: String,
    pub index: usize,
}

/// A spawned cell.
#[derive(Component, Debug, Clone, Copy)]
pub struct DressingCell {
    pub coord: CellCoord,
    pub height: u32,
}

/// Manifest the current scene was built from.
#[derive(Resource, Clone)]
pub struct ActiveManifest(pub DressingManifest);

/// Cached handles so equal cells share meshes/materials.
#[derive(Resource, Default)]
pub struct DressingAssets {
    materials: HashMap<String, Handle<StandardMaterial>>,
    columns: HashMap<u32, Handle<Mesh>>,
    tile: Option<Handle<Mesh>>,
}

impl DressingAssets {
    fn material(
        &mut self,
        feature: &str,
        render: &RenderDef,
        asset_server: &AssetServer,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        if let Some(h) = self.materials.get(feature) {
            return h.clone();
        }
        let (color, texture) = match render {
            RenderDef::Column { color, texture, .. } | RenderDef::Tile { color, texture, .. } => {
                (*color, texture.as_deref())
            }
        };
        let h = materials.add(StandardMaterial {
            base_color: Color::srgb(color.0, color.1, color.2),
            base_color_texture: texture.map(|path| asset_server.load(path.to_string())),
            perceptual_roughness: 1.0,
            ..default()
        });
        self.materials.insert(feature.to_string(), h.clone());
        h
    }

    fn mesh(&mut self, render: &RenderDef, height: u32, meshes: &mut Assets<Mesh>) -> Handle<Mesh> {
        match render {
            RenderDef::Column { .. } => self
                .columns
                .entry(height)
                .or_insert_with(|| {
                    meshes.add(Cuboid::new(CELL_SIZE, CELL_SIZE * height as f32, CELL_SIZE))
                })
                .clone(),
            RenderDef::Tile { .. } => self
                .tile
                .get_or_insert_with(|| meshes.add(Plane3d::default().mesh().size(CELL_SIZE, CELL_SIZE)))
                .clone(),
        }
    }
}

/// Where a primitive sits in the world.
pub fn cell_transform(render: &RenderDef, prim: &CellPrimitive) -> Transform {
    let base = prim.coord.to_world();
    let lift = match render {
        // cuboids are centered; rest the base on the ground
        RenderDef::Column { y_offset, .. } => y_offset + CELL_SIZE * prim.height as f32 * 0.5,
        RenderDef::Tile { y_offset, .. } => *y_offset,
    };
    Transform::from_xyz(base.x, base.y + lift, base.z)
}

/// Spawn one group entity per cluster, returning them in cluster order.
pub fn spawn_cluster_groups(commands: &mut Commands, feature: &str, clusters: usize) -> Vec<Entity> {
    (0..clusters)
        .map(|index| {
            commands
                .spawn((
                    DressingCluster { feature: feature.to_string(), index },
                    Name::new(format!("{feature} #{index}")),
                    Transform::default(),
                    Visibility::default(),
                ))
                .id()
        })
        .collect()
}

/// Drain up to `max_per_frame` queued cells into meshes.
pub fn drain_primitive_queue(
    mut commands: Commands,
    mut queue: ResMut<SpawnQueue>,
    cfg: Res<SpawnQueueConfig>,
    manifest: Option<Res<ActiveManifest>>,
    mut cache: ResMut<DressingAssets>,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(manifest) = manifest else { return };
    let take = cfg.max_per_frame.min(queue.items.len());
    if take == 0 { return; }

    let rest = queue.items.len() - take;
    for req in queue.items.drain(rest..) {
        let prim = &req.primitive;
        let Some(def) = manifest.0.get(&prim.feature) else {
            warn!("Dressing: no render definition for '{}'; skipping cell {}", prim.feature, prim.coord);
            continue;
        };

        let material = cache.material(&def.name, &def.render, &asset_server, &mut materials);
        let mesh = cache.mesh(&def.render, prim.height, &mut meshes);

        commands.spawn((
            Mesh3d(mesh),
            MeshMaterial3d(material),
            cell_transform(&def.render, prim),
            DressingCell { coord: prim.coord, height: prim.height },
            ChildOf(req.parent),
        ));
    }
}

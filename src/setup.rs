use bevy::pbr::{DistanceFog, FogFalloff};
use bevy::prelude::*;
use dunethree::dressing::core::CELL_SIZE;

/// Ground disk radius in world units.
const GROUND_RADIUS: f32 = 4000.0;

#[derive(Component)]
pub struct MainCamera;

#[derive(Component)]
pub struct Ground;

pub fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
) {
    // 1) Light: sky-ish ambient plus one sun
    commands.insert_resource(AmbientLight {
        color: Color::srgb_u8(0x66, 0x99, 0xff),
        brightness: 400.0,
        ..default()
    });
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 2.0, 0.0).looking_at(Vec3::new(0.3, 0.0, 0.2), Vec3::Y),
    ));

    // 2) Sand ground under the dressing
    let ground = materials.add(StandardMaterial {
        base_color: Color::srgb(0.93, 0.84, 0.6),
        base_color_texture: Some(asset_server.load("textures/sand.jpg")),
        perceptual_roughness: 1.0,
        ..default()
    });
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(GROUND_RADIUS * 2.0, GROUND_RADIUS * 2.0))),
        MeshMaterial3d(ground),
        Transform::default(),
        Ground,
    ));

    // 3) Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-CELL_SIZE * 30.0, CELL_SIZE * 25.0, CELL_SIZE * 30.0)
            .looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
        DistanceFog {
            color: Color::srgb_u8(0xa4, 0x8e, 0xd8),
            falloff: FogFalloff::Linear { start: CELL_SIZE * 60.0, end: CELL_SIZE * 160.0 },
            ..default()
        },
    ));
}

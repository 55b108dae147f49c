use bevy::prelude::*;

use dunethree::dressing::{DressingPlugin, DressingSettings};

mod setup;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "DuneThree".into(),
                ..default()
            }),
            ..default()
        }))
        // settings first so the plugin's init_resource keeps them
        .insert_resource(DressingSettings::from_env())
        .insert_resource(ClearColor(Color::srgb_u8(0xa4, 0x8e, 0xd8)))
        // stones + sand beds, generated once then replayed from the save
        .add_plugins(DressingPlugin)
        .add_systems(Startup, setup::setup)
        .run();
}

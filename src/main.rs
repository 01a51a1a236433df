use bevy::prelude::*;
use hollowed_eyes::PlayerBundle;
use hollowed_eyes::plugins::level::PendingLevel;
use hollowed_eyes::plugins::{
    ArrowTrapPlugin, ControlsPlugin, LevelPlugin, MaskPlugin, MovementPlugin, PhasePlugin,
    PhysicsPlugin, RenderPlugin, ResetPlugin, RopePlugin, TeleportPlugin, TimeSlowPlugin,
    VisibilityGatePlugin,
};

const FIRST_LEVEL: &str = "level_1";

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(ControlsPlugin)
        .add_plugins(PhysicsPlugin)
        .add_plugins(MaskPlugin)
        .add_plugins(TimeSlowPlugin)
        .add_plugins(RopePlugin)
        .add_plugins(PhasePlugin)
        .add_plugins(MovementPlugin)
        .add_plugins(VisibilityGatePlugin)
        .add_plugins(ResetPlugin)
        .add_plugins(TeleportPlugin)
        .add_plugins(ArrowTrapPlugin)
        .add_plugins(LevelPlugin)
        .add_plugins(RenderPlugin)
        .insert_resource(PendingLevel {
            to_level: FIRST_LEVEL.to_string(),
        })
        .add_systems(Startup, spawn_player)
        .run();
}

fn spawn_player(mut commands: Commands) {
    commands.spawn(PlayerBundle::new(Vec2::ZERO));
}

pub mod arrow_trap;
pub mod controls;
pub mod level;
pub mod mask;
pub mod movement;
pub mod phase;
pub mod physics;
pub mod render;
pub mod reset;
pub mod rope;
pub mod teleport;
pub mod time_slow;
pub mod visibility;

pub use arrow_trap::ArrowTrapPlugin;
pub use controls::ControlsPlugin;
pub use level::LevelPlugin;
pub use mask::MaskPlugin;
pub use movement::MovementPlugin;
pub use phase::PhasePlugin;
pub use physics::PhysicsPlugin;
pub use render::RenderPlugin;
pub use reset::ResetPlugin;
pub use rope::RopePlugin;
pub use teleport::TeleportPlugin;
pub use time_slow::TimeSlowPlugin;
pub use visibility::VisibilityGatePlugin;

use bevy::prelude::*;

/// Per-frame ordering of gameplay systems in `Update`.
/// Ability triggers resolve before level changes and timers.
#[derive(SystemSet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Input,
    Hazards,
    Reset,
    Switch,
    Trigger,
    Ability,
    Level,
    Tick,
    Movement,
    Visibility,
}

/// Configures `FrameSet` ordering. Added on demand by every gameplay plugin.
pub struct FrameSchedulePlugin;

impl Plugin for FrameSchedulePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                FrameSet::Input,
                FrameSet::Hazards,
                FrameSet::Reset,
                FrameSet::Switch,
                FrameSet::Trigger,
                FrameSet::Ability,
                FrameSet::Level,
                FrameSet::Tick,
                FrameSet::Movement,
                FrameSet::Visibility,
            )
                .chain(),
        );
    }
}

pub(crate) fn ensure_frame_schedule(app: &mut App) {
    if !app.is_plugin_added::<FrameSchedulePlugin>() {
        app.add_plugins(FrameSchedulePlugin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MaskController, PlayerBundle, PlayerIntent, Position, RopeState};
    use crate::enums::WorldTag;
    use crate::mask::MaskId;
    use crate::plugins::level::CurrentLevel;

    #[test]
    fn test_frame_schedule_added_once() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(MaskPlugin)
            .add_plugins(RopePlugin)
            .add_plugins(PhasePlugin);

        assert!(app.is_plugin_added::<FrameSchedulePlugin>());
    }

    #[test]
    fn test_trigger_resolves_before_level_change() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(MaskPlugin)
            .add_plugins(RopePlugin);
        app.insert_resource(CurrentLevel(3));
        app.world.spawn((WorldTag::Anchor, Position::new(2.0, 3.0)));
        let player = app.world.spawn(PlayerBundle::new(Vec2::ZERO)).id();
        app.update();

        app.world
            .get_mut::<PlayerIntent>(player)
            .unwrap()
            .mask_select = Some(MaskId::ROPE);
        app.update();
        app.world
            .get_mut::<PlayerIntent>(player)
            .unwrap()
            .clear_presses();

        // Press the ability key on the frame the level changes
        app.insert_resource(CurrentLevel(4));
        app.world
            .get_mut::<PlayerIntent>(player)
            .unwrap()
            .ability_just_pressed = true;
        app.update();

        // The rope was bought from the old budget, then the new level refilled it
        assert!(app.world.get::<RopeState>(player).unwrap().active);
        let controller = app.world.get::<MaskController>(player).unwrap();
        assert_eq!(controller.uses_for(MaskId::ROPE), 3);
        assert_eq!(controller.last_known_level(), Some(4));
    }
}

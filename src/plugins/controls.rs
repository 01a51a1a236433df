use crate::components::{Player, PlayerIntent};
use crate::mask::MaskId;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::app::AppExit;
use bevy::prelude::*;

/// Mask selection keys, top row and numpad
const MASK_KEYS: [(KeyCode, KeyCode, MaskId); 4] = [
    (KeyCode::Key1, KeyCode::Numpad1, MaskId::BASE),
    (KeyCode::Key2, KeyCode::Numpad2, MaskId::TIME),
    (KeyCode::Key3, KeyCode::Numpad3, MaskId::ROPE),
    (KeyCode::Key4, KeyCode::Numpad4, MaskId::PHASE),
];

const ABILITY_KEY: KeyCode = KeyCode::E;
const RESET_KEY: KeyCode = KeyCode::R;

/// Plugin mapping the keyboard onto `PlayerIntent`
pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.add_systems(
            Update,
            (process_input_system, exit_on_escape_system).in_set(FrameSet::Input),
        );
    }
}

/// Process keyboard input and translate to PlayerIntent
fn process_input_system(
    keyboard: Res<Input<KeyCode>>,
    mut query: Query<&mut PlayerIntent, With<Player>>,
) {
    for mut intent in query.iter_mut() {
        intent.move_left = keyboard.any_pressed([KeyCode::Left, KeyCode::A]);
        intent.move_right = keyboard.any_pressed([KeyCode::Right, KeyCode::D]);
        intent.jump_just_pressed = keyboard.any_just_pressed([KeyCode::W, KeyCode::Up]);
        intent.ability_just_pressed = keyboard.just_pressed(ABILITY_KEY);
        intent.ability_just_released = keyboard.just_released(ABILITY_KEY);
        intent.reset_just_pressed = keyboard.just_pressed(RESET_KEY);

        // Highest key wins when several are pressed on the same frame
        intent.mask_select = MASK_KEYS
            .iter()
            .filter(|(digit, numpad, _)| keyboard.any_just_pressed([*digit, *numpad]))
            .map(|(_, _, mask)| *mask)
            .last();
    }
}

fn exit_on_escape_system(keyboard: Res<Input<KeyCode>>, mut exit: EventWriter<AppExit>) {
    if keyboard.just_pressed(KeyCode::Escape) {
        info!("Escape pressed, exiting");
        exit.send(AppExit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlayerBundle;

    fn controls_app() -> (App, Entity) {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ControlsPlugin);
        app.init_resource::<Input<KeyCode>>();
        app.add_event::<AppExit>();

        let player = app.world.spawn(PlayerBundle::new(Vec2::ZERO)).id();
        (app, player)
    }

    fn intent(app: &App, player: Entity) -> PlayerIntent {
        *app.world.get::<PlayerIntent>(player).unwrap()
    }

    #[test]
    fn test_keys_map_to_intent() {
        let (mut app, player) = controls_app();
        {
            let mut keyboard = app.world.resource_mut::<Input<KeyCode>>();
            keyboard.press(KeyCode::A);
            keyboard.press(KeyCode::D);
            keyboard.press(KeyCode::Up);
            keyboard.press(KeyCode::Numpad3);
            keyboard.press(KeyCode::E);
        }

        app.update();

        let intent = intent(&app, player);
        assert!(intent.move_left);
        assert!(intent.move_right);
        assert_eq!(intent.horizontal(), 1.0);
        assert!(intent.jump_just_pressed);
        assert!(intent.ability_just_pressed);
        assert_eq!(intent.mask_select, Some(MaskId::ROPE));
        assert!(!intent.reset_just_pressed);
    }

    #[test]
    fn test_ability_key_release() {
        let (mut app, player) = controls_app();
        {
            let mut keyboard = app.world.resource_mut::<Input<KeyCode>>();
            keyboard.press(KeyCode::E);
            keyboard.clear();
            keyboard.release(KeyCode::E);
        }

        app.update();

        let intent = intent(&app, player);
        assert!(!intent.ability_just_pressed);
        assert!(intent.ability_just_released);
    }

    #[test]
    fn test_escape_requests_exit() {
        let (mut app, _player) = controls_app();
        app.world
            .resource_mut::<Input<KeyCode>>()
            .press(KeyCode::Escape);

        app.update();

        assert_eq!(app.world.resource::<Events<AppExit>>().len(), 1);
    }
}

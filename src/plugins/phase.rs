use crate::components::{PhaseState, Player};
use crate::enums::{AbilityKind, IgnoreSource, WorldTag};
use crate::plugins::mask::{AbilityTriggered, AbilityTuning, MaskUiRefresh};
use crate::plugins::physics::CollisionFilter;
use crate::plugins::reset::PlayerReset;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Phase constants
pub const PHASE_DURATION: f32 = 1.0; // seconds
pub const PHASE_COOLDOWN: f32 = 5.0; // seconds

/// Plugin for the phase ability
pub struct PhasePlugin;

impl Plugin for PhasePlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<CollisionFilter>()
            .init_resource::<AbilityTuning>()
            .add_event::<AbilityTriggered>()
            .add_event::<MaskUiRefresh>()
            .add_event::<PlayerReset>()
            .add_systems(Update, reset_phase_system.in_set(FrameSet::Reset))
            .add_systems(Update, begin_phase_system.in_set(FrameSet::Ability))
            .add_systems(
                Update,
                (tick_phase_system, phase_new_objects_system)
                    .chain()
                    .in_set(FrameSet::Tick),
            )
            .add_systems(Last, teardown_phase_system);
    }
}

fn begin_phase_system(
    mut triggered: EventReader<AbilityTriggered>,
    tuning: Res<AbilityTuning>,
    mut query: Query<&mut PhaseState, With<Player>>,
    tagged: Query<(Entity, &WorldTag)>,
    mut filter: ResMut<CollisionFilter>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    let requested = triggered
        .read()
        .filter(|event| event.kind == AbilityKind::Phase)
        .count();
    if requested == 0 {
        return;
    }

    for mut phase in query.iter_mut() {
        if !phase.begin(tuning.phase_duration) {
            debug!(
                "Phase unavailable (active: {}, cooldown: {:.1})",
                phase.active, phase.cooldown
            );
            continue;
        }

        let mut count = 0;
        for (entity, tag) in tagged.iter() {
            if tag.is_phaseable() {
                filter.ignore(entity, IgnoreSource::Phase);
                count += 1;
            }
        }

        refresh.send(MaskUiRefresh);
        info!("Phasing through {} objects", count);
    }
}

/// Runs on scaled time, so a time slow also stretches the phase and its cooldown
fn tick_phase_system(
    time: Res<Time>,
    tuning: Res<AbilityTuning>,
    mut query: Query<&mut PhaseState, With<Player>>,
    mut filter: ResMut<CollisionFilter>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    let delta_time = time.delta_seconds();

    for mut phase in query.iter_mut() {
        let tick = phase.tick(delta_time, tuning.phase_cooldown);

        if tick.expired {
            filter.clear_source(IgnoreSource::Phase);
            info!("Phase ended, cooldown {:.0}s", tuning.phase_cooldown);
        }
        if tick.refresh_ui {
            refresh.send(MaskUiRefresh);
        }
    }
}

/// Objects spawned mid-phase are passable too
fn phase_new_objects_system(
    query: Query<&PhaseState, With<Player>>,
    added: Query<(Entity, &WorldTag), Added<WorldTag>>,
    mut filter: ResMut<CollisionFilter>,
) {
    if !query.iter().any(|phase| phase.active) {
        return;
    }

    for (entity, tag) in added.iter() {
        if tag.is_phaseable() {
            filter.ignore(entity, IgnoreSource::Phase);
        }
    }
}

fn reset_phase_system(
    mut resets: EventReader<PlayerReset>,
    mut query: Query<&mut PhaseState, With<Player>>,
    mut filter: ResMut<CollisionFilter>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    if resets.read().count() == 0 {
        return;
    }

    for mut phase in query.iter_mut() {
        phase.clear();
        refresh.send(MaskUiRefresh);
    }
    filter.clear_source(IgnoreSource::Phase);
}

fn teardown_phase_system(
    mut removed: RemovedComponents<Player>,
    mut filter: ResMut<CollisionFilter>,
) {
    if removed.read().count() == 0 {
        return;
    }

    if filter.count(IgnoreSource::Phase) > 0 {
        filter.clear_source(IgnoreSource::Phase);
        debug!("Phase ignores cleared on player teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PlayerBundle, PlayerIntent};
    use crate::mask::MaskId;
    use crate::plugins::level::CurrentLevel;
    use crate::plugins::mask::MaskPlugin;
    use bevy::time::TimeUpdateStrategy;
    use std::time::Duration;

    #[test]
    fn test_phase_expires_into_cooldown() {
        let mut phase = PhaseState::default();
        assert!(phase.begin(PHASE_DURATION));
        phase.tick(0.1, PHASE_COOLDOWN);

        let tick = phase.tick(0.5, PHASE_COOLDOWN);
        assert!(!tick.expired);
        assert!(phase.active);

        let tick = phase.tick(0.5, PHASE_COOLDOWN);
        assert!(tick.expired);
        assert!(tick.refresh_ui);
        assert!(!phase.active);
        assert_eq!(phase.cooldown, PHASE_COOLDOWN);
        assert!(!phase.can_begin());
    }

    #[test]
    fn test_cooldown_refresh_only_on_whole_second_change() {
        let mut phase = PhaseState::default();
        phase.begin(PHASE_DURATION);
        phase.tick(0.1, PHASE_COOLDOWN);
        phase.tick(PHASE_DURATION, PHASE_COOLDOWN);

        // 5.0 -> 4.6: ceil stays 5
        assert!(!phase.tick(0.4, PHASE_COOLDOWN).refresh_ui);
        // 4.6 -> 3.9: ceil becomes 4
        assert!(phase.tick(0.7, PHASE_COOLDOWN).refresh_ui);
        // 3.9 -> 0
        let tick = phase.tick(10.0, PHASE_COOLDOWN);
        assert!(tick.refresh_ui);
        assert_eq!(phase.cooldown, 0.0);
        // Stays quiet once ready
        assert!(!phase.tick(0.1, PHASE_COOLDOWN).refresh_ui);
        assert!(phase.can_begin());
    }

    fn phase_app() -> (App, Entity, Entity, Entity) {
        phase_app_with_step(Duration::from_millis(100))
    }

    fn phase_app_with_step(step: Duration) -> (App, Entity, Entity, Entity) {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(MaskPlugin)
            .add_plugins(PhasePlugin);
        app.insert_resource(TimeUpdateStrategy::ManualDuration(step));
        app.insert_resource(CurrentLevel(4));

        let player = app.world.spawn(PlayerBundle::new(Vec2::ZERO)).id();
        let wall = app.world.spawn(WorldTag::PhasePassable).id();
        let ground = app.world.spawn(WorldTag::Ground).id();
        app.update();

        apply_press(&mut app, player, |i| i.mask_select = Some(MaskId::PHASE));
        (app, player, wall, ground)
    }

    fn apply_press(app: &mut App, player: Entity, apply: impl FnOnce(&mut PlayerIntent)) {
        apply(&mut app.world.get_mut::<PlayerIntent>(player).unwrap());
        app.update();
        app.world
            .get_mut::<PlayerIntent>(player)
            .unwrap()
            .clear_presses();
    }

    #[test]
    fn test_trigger_ignores_phaseable_objects_only() {
        let (mut app, player, wall, ground) = phase_app();

        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        let filter = app.world.resource::<CollisionFilter>();
        assert!(filter.is_ignored_by(wall, IgnoreSource::Phase));
        assert!(!filter.is_ignored(ground));
        assert!(app.world.get::<PhaseState>(player).unwrap().active);
    }

    #[test]
    fn test_phase_wears_off_and_collision_returns() {
        let (mut app, player, wall, _) = phase_app();
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        // Well past one second at 100 ms per frame
        for _ in 0..15 {
            app.update();
        }

        let phase = app.world.get::<PhaseState>(player).unwrap();
        assert!(!phase.active);
        assert!(phase.cooldown > 0.0);
        assert!(!app.world.resource::<CollisionFilter>().is_ignored(wall));
    }

    #[test]
    fn test_phase_lasts_full_duration_after_key_press() {
        let (mut app, player, wall, _) = phase_app_with_step(Duration::from_millis(250));
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);
        assert_eq!(
            app.world.get::<PhaseState>(player).unwrap().remaining,
            PHASE_DURATION
        );

        // 750 ms after the key press
        for _ in 0..3 {
            app.update();
        }
        assert!(app.world.get::<PhaseState>(player).unwrap().active);
        assert!(app.world.resource::<CollisionFilter>().is_ignored(wall));

        app.update();
        let phase = app.world.get::<PhaseState>(player).unwrap();
        assert!(!phase.active);
        assert_eq!(phase.cooldown, PHASE_COOLDOWN);
        assert!(!app.world.resource::<CollisionFilter>().is_ignored(wall));
    }

    #[test]
    fn test_trigger_during_cooldown_rejected() {
        let (mut app, player, wall, _) = phase_app();
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);
        for _ in 0..15 {
            app.update();
        }

        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        assert!(!app.world.get::<PhaseState>(player).unwrap().active);
        assert!(!app.world.resource::<CollisionFilter>().is_ignored(wall));
    }

    #[test]
    fn test_object_spawned_mid_phase_is_passable() {
        let (mut app, player, _, _) = phase_app();
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        let late = app.world.spawn(WorldTag::PhaseHazard).id();
        app.update();

        assert!(
            app.world
                .resource::<CollisionFilter>()
                .is_ignored_by(late, IgnoreSource::Phase)
        );
    }

    #[test]
    fn test_reset_clears_phase_and_cooldown() {
        let (mut app, player, wall, _) = phase_app();
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        app.world.send_event(PlayerReset::default());
        app.update();

        let phase = app.world.get::<PhaseState>(player).unwrap();
        assert!(!phase.active);
        assert_eq!(phase.cooldown, 0.0);
        assert!(!app.world.resource::<CollisionFilter>().is_ignored(wall));
    }

    #[test]
    fn test_teardown_clears_phase_sources() {
        let (mut app, player, wall, _) = phase_app();
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        app.world.despawn(player);
        app.update();

        assert!(!app.world.resource::<CollisionFilter>().is_ignored(wall));
    }

    #[test]
    fn test_gate_source_survives_phase_expiry() {
        let (mut app, player, wall, _) = phase_app();
        app.world
            .resource_mut::<CollisionFilter>()
            .ignore(wall, IgnoreSource::Gate);
        apply_press(&mut app, player, |i| i.ability_just_pressed = true);

        for _ in 0..15 {
            app.update();
        }

        let filter = app.world.resource::<CollisionFilter>();
        assert!(filter.is_ignored_by(wall, IgnoreSource::Gate));
        assert!(!filter.is_ignored_by(wall, IgnoreSource::Phase));
    }
}

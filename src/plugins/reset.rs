use crate::components::{
    GroundedState, JumpState, Locomotion, PhaseState, Player, PlayerIntent, Position, Velocity,
};
use crate::enums::WorldTag;
use crate::plugins::physics::PlayerContact;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Minimum time between two out-of-bounds resets
pub const OUT_OF_BOUNDS_COOLDOWN: f32 = 0.5; // seconds

/// Why the player was sent back to the spawn point
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResetCause {
    #[default]
    Requested,
    Hazard,
    PhaseHazard,
    OutOfBounds,
}

/// Sent to put the player back at the spawn point and refill every ability
#[derive(Event, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerReset {
    pub cause: ResetCause,
}

/// Where resets put the player
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnPoint(pub Vec2);

/// Playable area; leaving it resets the player
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct LevelBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl LevelBounds {
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

/// Elapsed time of the most recent reset
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct LastReset(pub Option<f32>);

/// Whether touching `tag` resets the player
pub fn contact_reset_cause(tag: Option<WorldTag>, phasing: bool) -> Option<ResetCause> {
    match tag {
        Some(WorldTag::Hazard) => Some(ResetCause::Hazard),
        Some(WorldTag::PhaseHazard) if !phasing => Some(ResetCause::PhaseHazard),
        _ => None,
    }
}

/// Plugin for resetting the player to the spawn point
pub struct ResetPlugin;

impl Plugin for ResetPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<SpawnPoint>()
            .init_resource::<LastReset>()
            .add_event::<PlayerReset>()
            .add_event::<PlayerContact>()
            .add_systems(Update, detect_reset_system.in_set(FrameSet::Hazards))
            .add_systems(Update, apply_reset_system.in_set(FrameSet::Reset));
    }
}

/// Raise at most one reset per frame: reset key, then hazards, then bounds
pub(crate) fn detect_reset_system(
    mut contacts: EventReader<PlayerContact>,
    bounds: Option<Res<LevelBounds>>,
    last_reset: Res<LastReset>,
    time: Res<Time>,
    query: Query<(&PlayerIntent, &Position, &PhaseState), With<Player>>,
    mut resets: EventWriter<PlayerReset>,
) {
    let Ok((intent, position, phase)) = query.get_single() else {
        contacts.clear();
        return;
    };

    let contact_cause = contacts
        .read()
        .find_map(|contact| contact_reset_cause(contact.tag, phase.active));

    let cooled_down = last_reset
        .0
        .is_none_or(|at| time.elapsed_seconds() - at > OUT_OF_BOUNDS_COOLDOWN);
    let out_of_bounds = bounds
        .as_ref()
        .is_some_and(|b| !b.contains(position.as_vec2()));

    let cause = if intent.reset_just_pressed {
        Some(ResetCause::Requested)
    } else if contact_cause.is_some() {
        contact_cause
    } else if out_of_bounds && cooled_down {
        Some(ResetCause::OutOfBounds)
    } else {
        None
    };

    if let Some(cause) = cause {
        resets.send(PlayerReset { cause });
    }
}

/// Move the player to the spawn point and stop it
#[allow(clippy::type_complexity)]
fn apply_reset_system(
    mut resets: EventReader<PlayerReset>,
    spawn: Res<SpawnPoint>,
    time: Res<Time>,
    mut last_reset: ResMut<LastReset>,
    mut query: Query<
        (
            &mut Position,
            &mut Velocity,
            &mut JumpState,
            &mut GroundedState,
            &mut Locomotion,
        ),
        With<Player>,
    >,
) {
    let Some(reset) = resets.read().last().copied() else {
        return;
    };

    for (mut position, mut velocity, mut jumps, mut grounded, mut locomotion) in query.iter_mut() {
        *position = Position::from(spawn.0);
        *velocity = Velocity::default();
        *jumps = JumpState::default();
        *grounded = GroundedState::default();
        if !locomotion.enabled {
            locomotion.arm_reactivation();
        }
    }

    last_reset.0 = Some(time.elapsed_seconds());
    info!("Player reset ({:?}) to {:?}", reset.cause, spawn.0);
}

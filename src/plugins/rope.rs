use crate::components::{
    JumpState, Locomotion, MaskController, Player, Position, RopeState, Velocity,
};
use crate::enums::{AbilityKind, Facing, WorldTag};
use crate::mask::MaskId;
use crate::plugins::mask::{AbilityReleased, AbilityTriggered, AbilityTuning, MaskUiRefresh};
use crate::plugins::reset::PlayerReset;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Rope constants
pub const ROPE_MAX_DISTANCE: f32 = 10.0; // world units
pub const ROPE_RELEASE_BOOST: f32 = 1.2; // velocity multiplier on release

/// Plugin for the rope swing ability
pub struct RopePlugin;

impl Plugin for RopePlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<AbilityTuning>()
            .add_event::<AbilityTriggered>()
            .add_event::<AbilityReleased>()
            .add_event::<MaskUiRefresh>()
            .add_event::<PlayerReset>()
            .add_systems(Update, reset_rope_system.in_set(FrameSet::Reset))
            .add_systems(
                Update,
                (attach_rope_system, release_rope_system)
                    .chain()
                    .in_set(FrameSet::Ability),
            )
            .add_systems(Update, update_rope_line_system.in_set(FrameSet::Tick));
    }
}

/// Nearest anchor on the facing side within `max_distance`.
/// Ties keep the first candidate seen.
pub fn find_anchor(
    origin: Vec2,
    facing: Facing,
    anchors: impl IntoIterator<Item = (Entity, Vec2)>,
    max_distance: f32,
) -> Option<(Entity, Vec2, f32)> {
    anchors
        .into_iter()
        .filter(|(_, point)| facing.includes(origin.x, point.x))
        .map(|(entity, point)| (entity, point, origin.distance(point)))
        .filter(|(_, _, distance)| *distance <= max_distance)
        .fold(None, |best: Option<(Entity, Vec2, f32)>, candidate| match best {
            Some(current) if current.2 <= candidate.2 => Some(current),
            _ => Some(candidate),
        })
}

/// Attach to the nearest anchor when the rope mask fires
#[allow(clippy::type_complexity)]
fn attach_rope_system(
    mut triggered: EventReader<AbilityTriggered>,
    tuning: Res<AbilityTuning>,
    mut player_query: Query<
        (
            &Position,
            &Facing,
            &mut MaskController,
            &mut RopeState,
            &mut Locomotion,
        ),
        With<Player>,
    >,
    anchor_query: Query<(Entity, &Position, &WorldTag), Without<Player>>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    let requested = triggered
        .read()
        .filter(|event| event.kind == AbilityKind::Rope)
        .count();
    if requested == 0 {
        return;
    }

    for (position, facing, mut controller, mut rope, mut locomotion) in player_query.iter_mut() {
        if rope.active || controller.uses_for(MaskId::ROPE) == 0 {
            continue;
        }

        let origin = position.as_vec2();
        let anchors = anchor_query
            .iter()
            .filter(|(_, _, tag)| **tag == WorldTag::Anchor)
            .map(|(entity, anchor_pos, _)| (entity, anchor_pos.as_vec2()));

        let Some((anchor, point, distance)) =
            find_anchor(origin, *facing, anchors, tuning.rope_max_distance)
        else {
            debug!("No rope anchor within {} units", tuning.rope_max_distance);
            continue;
        };

        if !controller.use_one(MaskId::ROPE) {
            continue;
        }

        rope.attach(anchor, point, origin, &mut locomotion);
        refresh.send(MaskUiRefresh);
        info!("Rope attached at distance {:.2}", distance);
    }
}

/// Let go when the ability key comes up
fn release_rope_system(
    mut released: EventReader<AbilityReleased>,
    tuning: Res<AbilityTuning>,
    mut query: Query<
        (&mut RopeState, &mut Velocity, &mut Locomotion, &mut JumpState),
        With<Player>,
    >,
) {
    if released.read().count() == 0 {
        return;
    }

    for (mut rope, mut velocity, mut locomotion, mut jumps) in query.iter_mut() {
        if rope.release(&mut velocity, &mut locomotion, &mut jumps, tuning.rope_release_boost) {
            debug!("Rope released");
        }
    }
}

fn reset_rope_system(
    mut resets: EventReader<PlayerReset>,
    tuning: Res<AbilityTuning>,
    mut query: Query<
        (&mut RopeState, &mut Velocity, &mut Locomotion, &mut JumpState),
        With<Player>,
    >,
) {
    if resets.read().count() == 0 {
        return;
    }

    for (mut rope, mut velocity, mut locomotion, mut jumps) in query.iter_mut() {
        rope.release(&mut velocity, &mut locomotion, &mut jumps, tuning.rope_release_boost);
    }
}

/// Keep the rope line between anchor and player; drop the rope if its anchor vanished
fn update_rope_line_system(
    tuning: Res<AbilityTuning>,
    mut query: Query<
        (
            &Position,
            &mut RopeState,
            &mut Velocity,
            &mut Locomotion,
            &mut JumpState,
        ),
        With<Player>,
    >,
    anchors: Query<(), With<WorldTag>>,
) {
    for (position, mut rope, mut velocity, mut locomotion, mut jumps) in query.iter_mut() {
        if !rope.active {
            continue;
        }

        if rope.anchor.is_some_and(|anchor| anchors.get(anchor).is_err()) {
            warn!("Rope anchor despawned, releasing");
            rope.release(&mut velocity, &mut locomotion, &mut jumps, tuning.rope_release_boost);
            continue;
        }

        rope.line = Some((rope.anchor_point, position.as_vec2()));
    }
}

use crate::components::{
    Collider, JumpState, Locomotion, Player, Position, RopeState, Teleporter, Velocity,
};
use crate::enums::Facing;
use crate::plugins::mask::AbilityTuning;
use crate::plugins::physics::{penetration, player_bounds};
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;
use bevy::utils::HashSet;

/// Sent after the player went through a teleporter
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct PlayerTeleported {
    pub teleporter: Entity,
    pub target: Vec2,
}

/// Exit velocity: rotated by `rotation_degrees`, then optionally mirrored horizontally
pub fn exit_velocity(velocity: Vec2, rotation_degrees: f32, flip_horizontal: bool) -> Vec2 {
    let mut rotated = Vec2::from_angle(rotation_degrees.to_radians()).rotate(velocity);
    if flip_horizontal {
        rotated.x = -rotated.x;
    }
    rotated
}

/// Plugin for teleport triggers
pub struct TeleportPlugin;

impl Plugin for TeleportPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<AbilityTuning>()
            .add_event::<PlayerTeleported>()
            .add_systems(Update, teleport_system.in_set(FrameSet::Movement));
    }
}

/// Fires when the player enters a teleporter area, not while standing in it.
/// An attached rope is let go first so the constraint cannot pull the player back.
#[allow(clippy::type_complexity)]
fn teleport_system(
    mut inside: Local<HashSet<Entity>>,
    tuning: Res<AbilityTuning>,
    mut player_query: Query<
        (
            &mut Position,
            &mut Velocity,
            &mut Facing,
            &Collider,
            &mut RopeState,
            &mut Locomotion,
            &mut JumpState,
        ),
        With<Player>,
    >,
    teleporters: Query<(Entity, &Teleporter)>,
    mut teleported: EventWriter<PlayerTeleported>,
) {
    for (mut position, mut velocity, mut facing, collider, mut rope, mut locomotion, mut jumps) in
        player_query.iter_mut()
    {
        let (player_min, player_max) = player_bounds(&position, collider);

        let overlapping: HashSet<Entity> = teleporters
            .iter()
            .filter(|(_, teleporter)| {
                penetration(
                    player_min,
                    player_max,
                    teleporter.area.min(),
                    teleporter.area.max(),
                )
                .is_some()
            })
            .map(|(entity, _)| entity)
            .collect();

        let entered = overlapping
            .iter()
            .copied()
            .find(|entity| !inside.contains(entity));
        *inside = overlapping;

        let Some((entity, teleporter)) = entered.and_then(|e| teleporters.get(e).ok()) else {
            continue;
        };

        if rope.release(
            &mut velocity,
            &mut locomotion,
            &mut jumps,
            tuning.rope_release_boost,
        ) {
            debug!("Rope released by teleporter");
        }

        let exit = exit_velocity(
            velocity.as_vec2(),
            teleporter.exit_rotation,
            teleporter.flip_horizontal,
        );
        *position = Position::from(teleporter.target);
        velocity.x = exit.x;
        velocity.y = exit.y;
        if let Some(exit_facing) = teleporter.exit_facing {
            *facing = exit_facing;
        }

        teleported.send(PlayerTeleported {
            teleporter: entity,
            target: teleporter.target,
        });
        debug!("Teleported to {:?}", teleporter.target);
    }
}

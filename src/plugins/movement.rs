use crate::components::{
    Gated, GroundedState, JumpState, LevelGeometry, Locomotion, MaskController, Player,
    PlayerIntent, Position, RopeState, Velocity,
};
use crate::enums::{Facing, WorldTag};
use crate::mask::MaskId;
use crate::plugins::physics::{CollisionFilter, circle_overlaps_box, is_solid};
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Movement constants
pub const MOVE_SPEED: f32 = 5.0; // world units per second
pub const JUMP_VELOCITY: f32 = 10.0; // world units per second (positive = up)
pub const PROBE_OFFSET: Vec2 = Vec2::new(0.0, -1.0); // feet of a 1x2 collider
pub const PROBE_RADIUS: f32 = 0.25;
pub const WALL_CHECK_DISTANCE: f32 = 0.6; // from the player's centre, each side
pub const WALL_SLIDE_ACCEL: f32 = 2.0; // world units per second squared, downward

/// Movement tuning
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct MovementTuning {
    pub move_speed: f32,
    pub jump_velocity: f32,
    pub probe_offset: Vec2,
    pub probe_radius: f32,
    pub wall_check_distance: f32,
    pub wall_slide_accel: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            move_speed: MOVE_SPEED,
            jump_velocity: JUMP_VELOCITY,
            probe_offset: PROBE_OFFSET,
            probe_radius: PROBE_RADIUS,
            wall_check_distance: WALL_CHECK_DISTANCE,
            wall_slide_accel: WALL_SLIDE_ACCEL,
        }
    }
}

/// Geometry the ground probe stands on
pub fn is_ground(tag: Option<&WorldTag>) -> bool {
    match tag {
        None => true,
        Some(WorldTag::Ground | WorldTag::PhasePassable | WorldTag::MaskOnly(_)) => true,
        Some(WorldTag::Anchor | WorldTag::Hazard | WorldTag::PhaseHazard) => false,
    }
}

/// Whether a horizontal ray of length `reach` either side of `origin` meets the box
pub fn wall_within_reach(origin: Vec2, reach: f32, box_min: Vec2, box_max: Vec2) -> bool {
    origin.y >= box_min.y
        && origin.y <= box_max.y
        && box_max.x >= origin.x - reach
        && box_min.x <= origin.x + reach
}

/// Plugin for player locomotion
pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<MovementTuning>()
            .init_resource::<CollisionFilter>()
            .add_systems(
                Update,
                (
                    ground_probe_system,
                    reactivation_guard_system,
                    horizontal_movement_system,
                    jump_system,
                    wall_slide_system,
                )
                    .chain()
                    .in_set(FrameSet::Movement),
            );
    }
}

/// Probe for ground below the player; landing re-arms both jumps
fn ground_probe_system(
    tuning: Res<MovementTuning>,
    filter: Res<CollisionFilter>,
    mut player_query: Query<(&Position, &mut GroundedState, &mut JumpState), With<Player>>,
    geometry_query: Query<(Entity, &LevelGeometry, Option<&Gated>, Option<&WorldTag>)>,
) {
    for (position, mut grounded, mut jumps) in player_query.iter_mut() {
        let probe = position.as_vec2() + tuning.probe_offset;

        let on_ground = geometry_query.iter().any(|(entity, geometry, gated, tag)| {
            is_ground(tag)
                && is_solid(entity, gated, &filter)
                && circle_overlaps_box(probe, tuning.probe_radius, geometry.min(), geometry.max())
        });

        grounded.was_grounded = grounded.is_grounded;
        grounded.is_grounded = on_ground;

        if grounded.just_landed() {
            *jumps = JumpState::default();
        }
    }
}

/// Turn locomotion back on once the player stands on ground again
fn reactivation_guard_system(mut query: Query<(&GroundedState, &mut Locomotion), With<Player>>) {
    for (grounded, mut locomotion) in query.iter_mut() {
        if !locomotion.reactivate_when_grounded {
            continue;
        }

        // Skip the frame the guard was armed on
        if locomotion.guard_armed_this_frame {
            locomotion.guard_armed_this_frame = false;
            continue;
        }

        if grounded.is_grounded {
            locomotion.enabled = true;
            locomotion.reactivate_when_grounded = false;
            debug!("Locomotion re-enabled on landing");
        }
    }
}

/// Apply horizontal movement and facing from input
fn horizontal_movement_system(
    tuning: Res<MovementTuning>,
    mut query: Query<(&PlayerIntent, &Locomotion, &mut Velocity, &mut Facing), With<Player>>,
) {
    for (intent, locomotion, mut velocity, mut facing) in query.iter_mut() {
        if !locomotion.enabled {
            continue;
        }

        let direction = intent.horizontal();
        velocity.x = direction * tuning.move_speed;

        if direction > 0.0 {
            *facing = Facing::Right;
        } else if direction < 0.0 {
            *facing = Facing::Left;
        }
    }
}

/// Ground jump once per landing, then one bonus jump from the base mask
#[allow(clippy::type_complexity)]
fn jump_system(
    tuning: Res<MovementTuning>,
    mut query: Query<
        (
            &PlayerIntent,
            &Locomotion,
            &GroundedState,
            &mut JumpState,
            &mut Velocity,
            &mut MaskController,
        ),
        With<Player>,
    >,
) {
    for (intent, locomotion, grounded, mut jumps, mut velocity, mut controller) in query.iter_mut()
    {
        if !locomotion.enabled || !intent.jump_just_pressed {
            continue;
        }

        if grounded.is_grounded && !jumps.used_ground_jump {
            velocity.y = tuning.jump_velocity;
            jumps.used_ground_jump = true;
        } else if !jumps.used_air_jump && controller.use_bonus_jump() {
            velocity.y = tuning.jump_velocity;
            jumps.used_air_jump = true;
            debug!("Bonus jump, {} left", controller.uses_for(MaskId::BASE));
        }
    }
}

/// Against a wall in the air: no rising, and a steady push down
#[allow(clippy::type_complexity)]
fn wall_slide_system(
    time: Res<Time>,
    tuning: Res<MovementTuning>,
    filter: Res<CollisionFilter>,
    mut player_query: Query<
        (&Position, &RopeState, &mut GroundedState, &mut Velocity),
        With<Player>,
    >,
    geometry_query: Query<(Entity, &LevelGeometry, Option<&Gated>, Option<&WorldTag>)>,
) {
    for (position, rope, mut grounded, mut velocity) in player_query.iter_mut() {
        let origin = position.as_vec2();
        grounded.touching_wall = geometry_query.iter().any(|(entity, geometry, gated, tag)| {
            is_ground(tag)
                && is_solid(entity, gated, &filter)
                && wall_within_reach(
                    origin,
                    tuning.wall_check_distance,
                    geometry.min(),
                    geometry.max(),
                )
        });

        // The rope owns the player's motion while attached
        if !grounded.wall_sliding() || rope.active {
            continue;
        }

        if velocity.y > 0.0 {
            velocity.y = 0.0;
        }
        velocity.y -= tuning.wall_slide_accel * time.delta_seconds();
    }
}

use crate::components::{
    Arrow, ArrowTrap, Collider, Gated, LevelGeometry, Player, Position, Velocity,
};
use crate::enums::WorldTag;
use crate::plugins::level::LevelEntity;
use crate::plugins::physics::{
    CollisionFilter, PlayerContact, is_solid, penetration, player_bounds,
};
use crate::plugins::reset::detect_reset_system;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Arrow box, long side along the flight direction
pub const ARROW_SIZE: Vec2 = Vec2::new(0.6, 0.15);

/// Plugin for arrow traps. Arrows fly by the physics integrator.
pub struct ArrowTrapPlugin;

impl Plugin for ArrowTrapPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<CollisionFilter>()
            .add_event::<PlayerContact>()
            .add_systems(
                Update,
                arrow_hit_system
                    .in_set(FrameSet::Hazards)
                    .before(detect_reset_system),
            )
            .add_systems(
                Update,
                (fire_arrow_traps_system, expire_arrows_system).in_set(FrameSet::Tick),
            );
    }
}

/// Axis-aligned bounds of an arrow flying along `velocity`
pub fn arrow_bounds(position: Vec2, velocity: Vec2) -> (Vec2, Vec2) {
    let half = if velocity.y.abs() > velocity.x.abs() {
        Vec2::new(ARROW_SIZE.y, ARROW_SIZE.x) / 2.0
    } else {
        ARROW_SIZE / 2.0
    };
    (position - half, position + half)
}

/// Runs on scaled time, so a time slow also slows the traps
fn fire_arrow_traps_system(
    mut commands: Commands,
    time: Res<Time>,
    mut traps: Query<&mut ArrowTrap>,
) {
    for mut trap in traps.iter_mut() {
        trap.interval.tick(time.delta());

        for _ in 0..trap.interval.times_finished_this_tick() {
            commands.spawn((
                Arrow::new(trap.lifetime),
                WorldTag::Hazard,
                Position::from(trap.origin),
                trap.arrow_velocity(),
                LevelEntity,
            ));
        }
    }
}

fn expire_arrows_system(
    mut commands: Commands,
    time: Res<Time>,
    mut arrows: Query<(Entity, &mut Arrow)>,
) {
    for (entity, mut arrow) in arrows.iter_mut() {
        if arrow.lifetime.tick(time.delta()).finished() {
            commands.entity(entity).despawn_recursive();
        }
    }
}

/// An arrow breaks on the first thing it touches. Hitting the player counts as hazard contact.
fn arrow_hit_system(
    mut commands: Commands,
    filter: Res<CollisionFilter>,
    arrows: Query<(Entity, &Position, &Velocity), With<Arrow>>,
    player_query: Query<(&Position, &Collider), With<Player>>,
    geometry_query: Query<(Entity, &LevelGeometry, Option<&Gated>)>,
    mut contacts: EventWriter<PlayerContact>,
) {
    let player_box = player_query
        .get_single()
        .ok()
        .map(|(position, collider)| player_bounds(position, collider));

    for (entity, position, velocity) in arrows.iter() {
        let (arrow_min, arrow_max) = arrow_bounds(position.as_vec2(), velocity.as_vec2());

        let hit_player = player_box.is_some_and(|(player_min, player_max)| {
            penetration(arrow_min, arrow_max, player_min, player_max).is_some()
        });
        if hit_player {
            contacts.send(PlayerContact {
                other: entity,
                tag: Some(WorldTag::Hazard),
            });
            commands.entity(entity).despawn_recursive();
            debug!("Arrow hit the player");
            continue;
        }

        let hit_geometry = geometry_query.iter().any(|(other, geometry, gated)| {
            is_solid(other, gated, &filter)
                && penetration(arrow_min, arrow_max, geometry.min(), geometry.max()).is_some()
        });
        if hit_geometry {
            commands.entity(entity).despawn_recursive();
        }
    }
}

use crate::components::{Collider, Gated, LevelGeometry, Player, Position, RopeState, Velocity};
use crate::enums::{IgnoreSource, WorldTag};
use bevy::prelude::*;
use bevy::utils::{HashMap, HashSet};

/// Physics constants
pub const GRAVITY: f32 = 29.43; // world units per second squared (9.81 at 3x scale)
const FIXED_TIMESTEP: f32 = 1.0 / 60.0; // 60 FPS fixed timestep

/// Entities whose collision with the player is suspended, and by whom.
/// An entity collides again only once every source has restored it.
#[derive(Resource, Clone, Debug, Default)]
pub struct CollisionFilter {
    ignored: HashMap<Entity, HashSet<IgnoreSource>>,
}

impl CollisionFilter {
    pub fn ignore(&mut self, entity: Entity, source: IgnoreSource) {
        self.ignored.entry(entity).or_default().insert(source);
    }

    pub fn restore(&mut self, entity: Entity, source: IgnoreSource) {
        if let Some(sources) = self.ignored.get_mut(&entity) {
            sources.remove(&source);
            if sources.is_empty() {
                self.ignored.remove(&entity);
            }
        }
    }

    /// Drop every suspension made by `source`
    pub fn clear_source(&mut self, source: IgnoreSource) {
        self.ignored.retain(|_, sources| {
            sources.remove(&source);
            !sources.is_empty()
        });
    }

    pub fn is_ignored(&self, entity: Entity) -> bool {
        self.ignored.contains_key(&entity)
    }

    pub fn is_ignored_by(&self, entity: Entity, source: IgnoreSource) -> bool {
        self.ignored
            .get(&entity)
            .is_some_and(|sources| sources.contains(&source))
    }

    pub fn count(&self, source: IgnoreSource) -> usize {
        self.ignored
            .values()
            .filter(|sources| sources.contains(&source))
            .count()
    }
}

/// Whether geometry currently blocks the player
pub fn is_solid(entity: Entity, gated: Option<&Gated>, filter: &CollisionFilter) -> bool {
    gated.is_none_or(|g| g.collidable) && !filter.is_ignored(entity)
}

/// Sent when the player touches solid geometry
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct PlayerContact {
    pub other: Entity,
    pub tag: Option<WorldTag>,
}

/// Plugin for gravity, movement integration, rope constraint and collisions
pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_seconds(FIXED_TIMESTEP as f64));
        app.init_resource::<CollisionFilter>()
            .add_event::<PlayerContact>()
            .add_systems(
                FixedUpdate,
                (
                    apply_gravity,
                    integrate_velocity,
                    apply_rope_constraint,
                    resolve_collisions,
                )
                    .chain(),
            );
    }
}

/// Apply gravity to the player; ground contact cancels it in `resolve_collisions`
fn apply_gravity(mut query: Query<&mut Velocity, With<Player>>, time: Res<Time<Fixed>>) {
    let delta_time = time.delta_seconds();

    for mut velocity in query.iter_mut() {
        velocity.y -= GRAVITY * delta_time;
    }
}

/// Integrate velocity to update position each step
fn integrate_velocity(mut query: Query<(&mut Position, &Velocity)>, time: Res<Time<Fixed>>) {
    let delta_time = time.delta_seconds();

    for (mut position, velocity) in query.iter_mut() {
        position.x += velocity.x * delta_time;
        position.y += velocity.y * delta_time;
    }
}

/// Keep an attached player at the rope length from the anchor
fn apply_rope_constraint(mut query: Query<(&mut Position, &mut Velocity, &RopeState), With<Player>>) {
    for (mut position, mut velocity, rope) in query.iter_mut() {
        if !rope.active {
            continue;
        }

        let (new_position, new_velocity) = distance_constraint(
            position.as_vec2(),
            velocity.as_vec2(),
            rope.anchor_point,
            rope.length,
        );
        *position = Position::from(new_position);
        velocity.x = new_velocity.x;
        velocity.y = new_velocity.y;
    }
}

/// Fixed-length joint: project onto the circle around `anchor` and drop radial velocity
pub fn distance_constraint(position: Vec2, velocity: Vec2, anchor: Vec2, length: f32) -> (Vec2, Vec2) {
    let offset = position - anchor;
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return (position, velocity);
    }

    let direction = offset / distance;
    let radial_speed = velocity.dot(direction);

    (anchor + direction * length, velocity - direction * radial_speed)
}

/// Push the player out of solid geometry and report contacts
fn resolve_collisions(
    mut player_query: Query<(&mut Position, &mut Velocity, &Collider), With<Player>>,
    geometry_query: Query<(Entity, &LevelGeometry, Option<&Gated>, Option<&WorldTag>)>,
    filter: Res<CollisionFilter>,
    mut contacts: EventWriter<PlayerContact>,
) {
    for (mut position, mut velocity, collider) in player_query.iter_mut() {
        for (entity, geometry, gated, tag) in geometry_query.iter() {
            if !is_solid(entity, gated, &filter) {
                continue;
            }

            let (player_min, player_max) = player_bounds(&position, collider);
            let Some(push) = penetration(player_min, player_max, geometry.min(), geometry.max())
            else {
                continue;
            };

            position.x += push.x;
            position.y += push.y;

            // Cancel velocity into the surface
            if push.x != 0.0 && push.x.signum() != velocity.x.signum() {
                velocity.x = 0.0;
            }
            if push.y != 0.0 && push.y.signum() != velocity.y.signum() {
                velocity.y = 0.0;
            }

            contacts.send(PlayerContact {
                other: entity,
                tag: tag.copied(),
            });
        }
    }
}

pub fn player_bounds(position: &Position, collider: &Collider) -> (Vec2, Vec2) {
    let center = Vec2::new(position.x + collider.offset_x, position.y + collider.offset_y);
    let half = Vec2::new(collider.width / 2.0, collider.height / 2.0);
    (center - half, center + half)
}

/// Minimal translation that separates box `a` from box `b`, if they overlap
pub fn penetration(a_min: Vec2, a_max: Vec2, b_min: Vec2, b_max: Vec2) -> Option<Vec2> {
    let overlap_x = a_max.x.min(b_max.x) - a_min.x.max(b_min.x);
    let overlap_y = a_max.y.min(b_max.y) - a_min.y.max(b_min.y);

    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    let a_center = (a_min + a_max) / 2.0;
    let b_center = (b_min + b_max) / 2.0;

    if overlap_x < overlap_y {
        let direction = if a_center.x < b_center.x { -1.0 } else { 1.0 };
        Some(Vec2::new(overlap_x * direction, 0.0))
    } else {
        let direction = if a_center.y < b_center.y { -1.0 } else { 1.0 };
        Some(Vec2::new(0.0, overlap_y * direction))
    }
}

/// Circle-box overlap used by ground probes
pub fn circle_overlaps_box(center: Vec2, radius: f32, box_min: Vec2, box_max: Vec2) -> bool {
    let closest = center.clamp(box_min, box_max);
    closest.distance_squared(center) <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravity_applied_per_step() {
        let mut velocity = Velocity::new(0.0, 0.0);

        // Simulate one step of gravity
        velocity.y -= GRAVITY * FIXED_TIMESTEP;

        let expected_velocity = -GRAVITY * FIXED_TIMESTEP;
        assert!(
            (velocity.y - expected_velocity).abs() < 0.0001,
            "Expected velocity.y to be ~{}, got {}",
            expected_velocity,
            velocity.y
        );
    }

    #[test]
    fn test_filter_sources_are_independent() {
        let mut filter = CollisionFilter::default();
        let wall = Entity::from_raw(1);

        filter.ignore(wall, IgnoreSource::Gate);
        filter.ignore(wall, IgnoreSource::Phase);
        filter.restore(wall, IgnoreSource::Phase);

        assert!(filter.is_ignored(wall));
        assert!(filter.is_ignored_by(wall, IgnoreSource::Gate));
        assert!(!filter.is_ignored_by(wall, IgnoreSource::Phase));

        filter.restore(wall, IgnoreSource::Gate);
        assert!(!filter.is_ignored(wall));
    }

    #[test]
    fn test_clear_source_keeps_other_sources() {
        let mut filter = CollisionFilter::default();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);

        filter.ignore(a, IgnoreSource::Phase);
        filter.ignore(b, IgnoreSource::Phase);
        filter.ignore(b, IgnoreSource::Gate);
        filter.clear_source(IgnoreSource::Phase);

        assert!(!filter.is_ignored(a));
        assert!(filter.is_ignored(b));
        assert_eq!(filter.count(IgnoreSource::Phase), 0);
        assert_eq!(filter.count(IgnoreSource::Gate), 1);
    }

    #[test]
    fn test_is_solid_respects_gate_and_filter() {
        let mut filter = CollisionFilter::default();
        let entity = Entity::from_raw(3);
        let hidden = Gated {
            rendered: false,
            collidable: false,
        };

        assert!(is_solid(entity, None, &filter));
        assert!(!is_solid(entity, Some(&hidden), &filter));

        filter.ignore(entity, IgnoreSource::Phase);
        assert!(!is_solid(entity, None, &filter));
    }

    #[test]
    fn test_penetration_pushes_up_out_of_floor() {
        let push = penetration(
            Vec2::new(-0.5, -0.2),
            Vec2::new(0.5, 1.8),
            Vec2::new(-10.0, -1.0),
            Vec2::new(10.0, 0.0),
        )
        .unwrap();

        assert_eq!(push.x, 0.0);
        assert!((push.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_penetration_none_when_apart() {
        assert!(
            penetration(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(2.0, 0.0),
                Vec2::new(3.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn test_circle_box_overlap() {
        let min = Vec2::new(-5.0, -1.0);
        let max = Vec2::new(5.0, 0.0);

        assert!(circle_overlaps_box(Vec2::new(0.0, 0.4), 0.5, min, max));
        assert!(!circle_overlaps_box(Vec2::new(0.0, 0.6), 0.5, min, max));
    }

    #[test]
    fn test_distance_constraint_holds_length() {
        let anchor = Vec2::new(0.0, 10.0);
        let (position, velocity) =
            distance_constraint(Vec2::new(0.0, 2.0), Vec2::new(3.0, -4.0), anchor, 5.0);

        assert!((position.distance(anchor) - 5.0).abs() < 1e-5);
        assert_eq!(position, Vec2::new(0.0, 5.0));
        // Only the tangential part survives
        assert_eq!(velocity, Vec2::new(3.0, 0.0));
    }

    #[test]
    fn test_deterministic_physics() {
        let run_simulation = || {
            let mut position = Position::new(0.0, 10.0);
            let mut velocity = Velocity::new(2.0, 0.0);

            for _ in 0..10 {
                velocity.y -= GRAVITY * FIXED_TIMESTEP;
                position.x += velocity.x * FIXED_TIMESTEP;
                position.y += velocity.y * FIXED_TIMESTEP;
            }

            (position, velocity)
        };

        assert_eq!(run_simulation(), run_simulation());
    }
}

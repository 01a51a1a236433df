use crate::components::{
    Arrow, ArrowTrap, Gated, LevelGeometry, MaskController, Player, Position, RopeState,
    Teleporter, Velocity,
};
use crate::enums::{Facing, WorldTag};
use crate::plugins::arrow_trap::ARROW_SIZE;
use crate::plugins::level::LevelExit;
use crate::plugins::mask::{MaskCatalog, MaskChanged, MaskUnlocked};
use bevy::prelude::*;

/// Pixels per world unit
pub const PIXELS_PER_UNIT: f32 = 32.0;

const PLAYER_SIZE: Vec2 = Vec2::new(1.0, 2.0);
const ANCHOR_SIZE: f32 = 0.5;
const ROPE_THICKNESS: f32 = 0.08;

/// Plugin drawing the world with plain sprites
pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<MaskChanged>()
            .add_event::<MaskUnlocked>()
            .add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (
                    attach_player_sprite,
                    attach_geometry_sprites,
                    attach_anchor_sprites,
                    attach_trigger_sprites,
                    attach_arrow_sprites,
                    log_unlock_messages,
                ),
            )
            .add_systems(
                PostUpdate,
                (
                    sync_transforms,
                    apply_gate_visibility,
                    update_player_sprite,
                    update_rope_line,
                    camera_follow_system,
                ),
            );
    }
}

/// Marks the camera entity
#[derive(Component)]
pub struct GameCamera;

/// The rope line sprite
#[derive(Component)]
pub struct RopeLine;

pub fn to_screen(point: Vec2) -> Vec2 {
    point * PIXELS_PER_UNIT
}

/// Transform stretching a unit sprite from `a` to `b`
pub fn segment_transform(a: Vec2, b: Vec2, thickness: f32, z: f32) -> Transform {
    let (a, b) = (to_screen(a), to_screen(b));
    let delta = b - a;
    let midpoint = (a + b) / 2.0;

    Transform {
        translation: midpoint.extend(z),
        rotation: Quat::from_rotation_z(delta.y.atan2(delta.x)),
        scale: Vec3::new(delta.length(), thickness * PIXELS_PER_UNIT, 1.0),
    }
}

/// Parse a `#RRGGBB` mask colour, falling back to white
pub fn mask_tint(hex: &str) -> Color {
    Color::hex(hex).unwrap_or(Color::WHITE)
}

fn tag_color(tag: Option<&WorldTag>) -> Color {
    match tag {
        Some(WorldTag::Hazard) => Color::rgb(0.85, 0.2, 0.2),
        Some(WorldTag::PhaseHazard) => Color::rgb(0.7, 0.2, 0.8),
        Some(WorldTag::PhasePassable) => Color::rgba(0.5, 0.5, 0.9, 0.8),
        Some(WorldTag::MaskOnly(_)) => Color::rgb(0.9, 0.8, 0.3),
        Some(WorldTag::Anchor) => Color::rgb(0.9, 0.9, 0.9),
        Some(WorldTag::Ground) | None => Color::rgb(0.35, 0.35, 0.4),
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn((Camera2dBundle::default(), GameCamera));
    commands.spawn((
        SpriteBundle {
            sprite: Sprite {
                color: Color::rgb(0.8, 0.7, 0.5),
                custom_size: Some(Vec2::ONE),
                ..default()
            },
            visibility: Visibility::Hidden,
            ..default()
        },
        RopeLine,
    ));
}

fn sprite_bundle(color: Color, size: Vec2, at: Vec2, z: f32) -> SpriteBundle {
    SpriteBundle {
        sprite: Sprite {
            color,
            custom_size: Some(to_screen(size)),
            ..default()
        },
        transform: Transform::from_translation(to_screen(at).extend(z)),
        ..default()
    }
}

fn attach_player_sprite(mut commands: Commands, query: Query<(Entity, &Position), Added<Player>>) {
    for (entity, position) in query.iter() {
        commands
            .entity(entity)
            .try_insert(sprite_bundle(Color::WHITE, PLAYER_SIZE, position.as_vec2(), 10.0));
    }
}

fn attach_geometry_sprites(
    mut commands: Commands,
    query: Query<(Entity, &LevelGeometry, Option<&WorldTag>), Added<LevelGeometry>>,
) {
    for (entity, geometry, tag) in query.iter() {
        let size = Vec2::new(geometry.width, geometry.height);
        commands.entity(entity).try_insert(sprite_bundle(
            tag_color(tag),
            size,
            Vec2::new(geometry.x, geometry.y),
            0.0,
        ));
    }
}

fn attach_anchor_sprites(
    mut commands: Commands,
    query: Query<(Entity, &Position, &WorldTag), (Added<WorldTag>, Without<LevelGeometry>)>,
) {
    for (entity, position, tag) in query.iter() {
        if *tag != WorldTag::Anchor {
            continue;
        }
        commands.entity(entity).try_insert(sprite_bundle(
            tag_color(Some(tag)),
            Vec2::splat(ANCHOR_SIZE),
            position.as_vec2(),
            1.0,
        ));
    }
}

fn attach_trigger_sprites(
    mut commands: Commands,
    teleporters: Query<(Entity, &Teleporter), Added<Teleporter>>,
    exits: Query<(Entity, &LevelExit), Added<LevelExit>>,
) {
    let areas = teleporters
        .iter()
        .map(|(e, t)| (e, &t.area, Color::rgba(0.3, 0.9, 0.9, 0.5)))
        .chain(
            exits
                .iter()
                .map(|(e, x)| (e, &x.area, Color::rgba(0.3, 0.9, 0.3, 0.5))),
        );

    for (entity, area, color) in areas {
        commands.entity(entity).try_insert(sprite_bundle(
            color,
            Vec2::new(area.width, area.height),
            Vec2::new(area.x, area.y),
            0.5,
        ));
    }
}

fn attach_arrow_sprites(
    mut commands: Commands,
    traps: Query<(Entity, &ArrowTrap), Added<ArrowTrap>>,
    arrows: Query<(Entity, &Position, &Velocity), Added<Arrow>>,
) {
    for (entity, trap) in traps.iter() {
        commands.entity(entity).try_insert(sprite_bundle(
            Color::rgb(0.45, 0.3, 0.2),
            Vec2::splat(0.6),
            trap.origin,
            0.5,
        ));
    }

    for (entity, position, velocity) in arrows.iter() {
        let mut bundle = sprite_bundle(
            tag_color(Some(&WorldTag::Hazard)),
            ARROW_SIZE,
            position.as_vec2(),
            2.0,
        );
        bundle.transform.rotation = Quat::from_rotation_z(velocity.y.atan2(velocity.x));
        commands.entity(entity).try_insert(bundle);
    }
}

/// Only the moving things have a `Position` that changes
fn sync_transforms(mut query: Query<(&Position, &mut Transform), Changed<Position>>) {
    for (position, mut transform) in query.iter_mut() {
        let screen = to_screen(position.as_vec2());
        transform.translation.x = screen.x;
        transform.translation.y = screen.y;
    }
}

fn apply_gate_visibility(mut query: Query<(&Gated, &mut Visibility), Changed<Gated>>) {
    for (gated, mut visibility) in query.iter_mut() {
        *visibility = if gated.rendered {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

/// Tint the player with the mask colour and mirror it to its facing
fn update_player_sprite(
    catalog: Res<MaskCatalog>,
    mut query: Query<(&MaskController, &Facing, &mut Sprite, &mut Transform), With<Player>>,
) {
    for (controller, facing, mut sprite, mut transform) in query.iter_mut() {
        let tint = catalog
            .definitions()
            .and_then(|defs| defs.get(controller.active()))
            .map(|mask| mask_tint(&mask.ui_color))
            .unwrap_or(Color::WHITE);
        if sprite.color != tint {
            sprite.color = tint;
        }
        transform.scale.x = facing.sign();
    }
}

fn update_rope_line(
    player_query: Query<&RopeState, With<Player>>,
    mut line_query: Query<(&mut Transform, &mut Visibility), (With<RopeLine>, Without<Player>)>,
) {
    let Ok((mut transform, mut visibility)) = line_query.get_single_mut() else {
        return;
    };

    match player_query.get_single().ok().and_then(|rope| rope.line) {
        Some((anchor, player)) => {
            *transform = segment_transform(anchor, player, ROPE_THICKNESS, 5.0);
            *visibility = Visibility::Inherited;
        }
        None => *visibility = Visibility::Hidden,
    }
}

fn camera_follow_system(
    player_query: Query<&Position, With<Player>>,
    mut camera_query: Query<&mut Transform, (With<GameCamera>, Without<Player>, Without<RopeLine>)>,
) {
    let (Ok(position), Ok(mut transform)) =
        (player_query.get_single(), camera_query.get_single_mut())
    else {
        return;
    };

    let screen = to_screen(position.as_vec2());
    transform.translation.x = screen.x;
    transform.translation.y = screen.y;
}

fn log_unlock_messages(mut unlocked: EventReader<MaskUnlocked>) {
    for event in unlocked.read() {
        info!("{} mask unlocked: {}", event.name, event.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_spans_endpoints() {
        let transform = segment_transform(Vec2::ZERO, Vec2::new(0.0, 2.0), 0.1, 5.0);

        assert_eq!(transform.translation, Vec3::new(0.0, PIXELS_PER_UNIT, 5.0));
        assert!((transform.scale.x - 2.0 * PIXELS_PER_UNIT).abs() < 1e-4);
        let (_, angle) = transform.rotation.to_axis_angle();
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_mask_tint_parses_hex() {
        assert_eq!(mask_tint("#FF0000"), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(mask_tint("not a colour"), Color::WHITE);
    }

    #[test]
    fn test_gate_hides_sprite() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_systems(Update, apply_gate_visibility);

        let entity = app
            .world
            .spawn((
                Gated {
                    rendered: false,
                    collidable: true,
                },
                Visibility::Inherited,
            ))
            .id();

        app.update();

        assert_eq!(app.world.get::<Visibility>(entity), Some(&Visibility::Hidden));
    }
}

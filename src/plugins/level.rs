use crate::components::{Collider, LevelGeometry, Player, Position, Velocity};
use crate::enums::WorldTag;
use crate::level::LevelData;
use crate::plugins::physics::{penetration, player_bounds};
use crate::plugins::reset::{LevelBounds, SpawnPoint};
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of the level being played, parsed from the level id
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CurrentLevel(pub u32);

/// The level data currently spawned
#[derive(Resource, Clone, Debug)]
pub struct LoadedLevel {
    pub level_id: String,
    pub level_data: LevelData,
}

/// Directory holding `<level id>.json` files
#[derive(Resource, Clone, Debug, PartialEq, Eq)]
pub struct LevelDirectory(pub PathBuf);

impl Default for LevelDirectory {
    fn default() -> Self {
        Self(PathBuf::from("assets/levels"))
    }
}

/// Resource to request a level load at the start of the next frame
#[derive(Resource, Clone, Debug, PartialEq, Eq)]
pub struct PendingLevel {
    pub to_level: String,
}

/// Component to mark level exit triggers
#[derive(Component, Clone, Debug)]
pub struct LevelExit {
    pub to_level: String,
    pub area: LevelGeometry,
}

/// Marker for everything spawned from level data
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct LevelEntity;

/// Plugin for level loading, exits and world geometry
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<CurrentLevel>()
            .init_resource::<LevelDirectory>()
            .init_resource::<SpawnPoint>()
            .add_systems(Update, process_pending_level.in_set(FrameSet::Input))
            .add_systems(Update, detect_level_exits.in_set(FrameSet::Movement));
    }
}

/// Load level from JSON file
pub fn load_level_from_file(path: &Path) -> Result<LevelData, LevelLoadError> {
    let display = path.display().to_string();

    // Check if file exists
    if !path.exists() {
        return Err(LevelLoadError::FileNotFound(display));
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| LevelLoadError::IoError(display.clone(), e.to_string()))?;

    let level_data: LevelData = serde_json::from_str(&contents)
        .map_err(|e| LevelLoadError::ParseError(display.clone(), e.to_string()))?;

    validate_level_data(&level_data)?;

    Ok(level_data)
}

/// Validate level data for required fields and valid values
fn validate_level_data(level: &LevelData) -> Result<(), LevelLoadError> {
    if level.id.is_empty() {
        return Err(LevelLoadError::ValidationError(
            "Level ID cannot be empty".to_string(),
        ));
    }

    if level.bounds.width <= 0.0 || level.bounds.height <= 0.0 {
        return Err(LevelLoadError::ValidationError(
            "Level bounds must have positive size".to_string(),
        ));
    }

    let bounds = level_bounds(level);
    if !bounds.contains(level.spawn_point.into()) {
        return Err(LevelLoadError::ValidationError(
            "Spawn point lies outside the level bounds".to_string(),
        ));
    }

    for (i, geo) in level.geometry.iter().enumerate() {
        if geo.width <= 0.0 || geo.height <= 0.0 {
            return Err(LevelLoadError::ValidationError(format!(
                "Geometry {} has invalid dimensions",
                i
            )));
        }
    }

    for (i, trap) in level.arrow_traps.iter().enumerate() {
        if trap.interval <= 0.0 || trap.lifetime <= 0.0 {
            return Err(LevelLoadError::ValidationError(format!(
                "Arrow trap {} needs a positive interval and lifetime",
                i
            )));
        }
        if Vec2::from(trap.direction) == Vec2::ZERO {
            return Err(LevelLoadError::ValidationError(format!(
                "Arrow trap {} has no direction",
                i
            )));
        }
    }

    for (i, exit) in level.exits.iter().enumerate() {
        if exit.to_level.is_empty() {
            return Err(LevelLoadError::ValidationError(format!(
                "Exit {} has no target level",
                i
            )));
        }
    }

    Ok(())
}

pub fn level_bounds(level: &LevelData) -> LevelBounds {
    let area = level.bounds.to_geometry();
    LevelBounds {
        min: area.min(),
        max: area.max(),
    }
}

/// Spawn level entities from level data
pub fn spawn_level_entities(commands: &mut Commands, level: &LevelData) {
    for geo in &level.geometry {
        let mut entity = commands.spawn((geo.to_geometry(), LevelEntity));
        if let Some(tag) = geo.tag {
            entity.insert(tag);
        }
    }

    for anchor in &level.anchors {
        commands.spawn((
            WorldTag::Anchor,
            Position::new(anchor.x, anchor.y),
            LevelEntity,
        ));
    }

    for teleporter in &level.teleporters {
        commands.spawn((teleporter.to_teleporter(), LevelEntity));
    }

    for trap in &level.arrow_traps {
        commands.spawn((trap.to_trap(), LevelEntity));
    }

    for exit in &level.exits {
        commands.spawn((
            LevelExit {
                to_level: exit.to_level.clone(),
                area: exit.area.to_geometry(),
            },
            LevelEntity,
        ));
    }
}

/// Detect when player reaches a level exit
fn detect_level_exits(
    mut commands: Commands,
    pending: Option<Res<PendingLevel>>,
    player_query: Query<(&Position, &Collider), With<Player>>,
    exit_query: Query<&LevelExit>,
) {
    if pending.is_some() {
        return;
    }

    for (position, collider) in player_query.iter() {
        let (player_min, player_max) = player_bounds(position, collider);

        let reached = exit_query.iter().find(|exit| {
            penetration(player_min, player_max, exit.area.min(), exit.area.max()).is_some()
        });

        if let Some(exit) = reached {
            commands.insert_resource(PendingLevel {
                to_level: exit.to_level.clone(),
            });
            return;
        }
    }
}

/// Swap in the pending level. A level that fails to load leaves the current one in place.
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
fn process_pending_level(
    mut commands: Commands,
    pending: Option<Res<PendingLevel>>,
    directory: Res<LevelDirectory>,
    mut current: ResMut<CurrentLevel>,
    mut spawn: ResMut<SpawnPoint>,
    mut player_query: Query<(&mut Position, &mut Velocity), With<Player>>,
    level_entities: Query<Entity, With<LevelEntity>>,
) {
    let Some(pending) = pending else {
        return;
    };
    commands.remove_resource::<PendingLevel>();

    let level_path = directory.0.join(format!("{}.json", pending.to_level));
    let new_level = match load_level_from_file(&level_path) {
        Ok(level) => level,
        Err(e) => {
            error!("Failed to load level {}: {}", pending.to_level, e);
            return;
        }
    };

    // Unload current level entities
    for entity in level_entities.iter() {
        commands.entity(entity).despawn_recursive();
    }

    spawn_level_entities(&mut commands, &new_level);

    spawn.0 = new_level.spawn_point.into();
    for (mut position, mut velocity) in player_query.iter_mut() {
        *position = Position::from(spawn.0);
        *velocity = Velocity::default();
    }

    current.0 = new_level.number();
    commands.insert_resource(level_bounds(&new_level));
    commands.insert_resource(LoadedLevel {
        level_id: new_level.id.clone(),
        level_data: new_level,
    });

    info!("Loaded level {} (number {})", pending.to_level, current.0);
}

/// Level loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum LevelLoadError {
    FileNotFound(String),
    IoError(String, String),
    ParseError(String, String),
    ValidationError(String),
}

impl std::fmt::Display for LevelLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelLoadError::FileNotFound(path) => write!(f, "Level file not found: {}", path),
            LevelLoadError::IoError(path, err) => {
                write!(f, "IO error reading level file {}: {}", path, err)
            }
            LevelLoadError::ParseError(path, err) => {
                write!(f, "Failed to parse level file {}: {}", path, err)
            }
            LevelLoadError::ValidationError(msg) => write!(f, "Level validation error: {}", msg),
        }
    }
}

impl std::error::Error for LevelLoadError {}

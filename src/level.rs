use crate::components::{ArrowTrap, LevelGeometry, Teleporter};
use crate::enums::{Facing, WorldTag};
use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

/// Level data structure matching JSON format
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub id: String,
    /// Playable area; leaving it resets the player
    pub bounds: AreaData,
    pub spawn_point: PointData,
    pub geometry: Vec<GeometryData>,
    #[serde(default)]
    pub anchors: Vec<PointData>,
    #[serde(default)]
    pub teleporters: Vec<TeleporterData>,
    #[serde(default)]
    pub exits: Vec<ExitData>,
    #[serde(default)]
    pub arrow_traps: Vec<ArrowTrapData>,
}

impl LevelData {
    /// Level number derived from the id
    pub fn number(&self) -> u32 {
        level_number(&self.id)
    }
}

/// First run of digits in a level id, or 0 when there is none
pub fn level_number(id: &str) -> u32 {
    let digits: String = id
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(0)
}

/// A point in world units
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointData {
    pub x: f32,
    pub y: f32,
}

impl From<PointData> for Vec2 {
    fn from(p: PointData) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Centre-based rectangle
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaData {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl AreaData {
    pub fn to_geometry(&self) -> LevelGeometry {
        LevelGeometry {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Geometry data for level collision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    #[serde(default)]
    pub tag: Option<WorldTag>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl GeometryData {
    pub fn to_geometry(&self) -> LevelGeometry {
        LevelGeometry {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

fn default_exit_rotation() -> f32 {
    180.0
}

/// Teleporter data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeleporterData {
    pub area: AreaData,
    pub target: PointData,
    #[serde(default = "default_exit_rotation")]
    pub exit_rotation: f32,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub exit_facing: Option<Facing>,
}

impl TeleporterData {
    pub fn to_teleporter(&self) -> Teleporter {
        Teleporter {
            area: self.area.to_geometry(),
            target: self.target.into(),
            exit_rotation: self.exit_rotation,
            flip_horizontal: self.flip_horizontal,
            exit_facing: self.exit_facing,
        }
    }
}

fn default_arrow_direction() -> PointData {
    PointData { x: 1.0, y: 0.0 }
}

fn default_arrow_interval() -> f32 {
    5.0
}

fn default_arrow_speed() -> f32 {
    10.0
}

fn default_arrow_lifetime() -> f32 {
    5.0
}

/// Arrow trap data. Arrows leave from `position + spawn_offset`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrowTrapData {
    pub position: PointData,
    #[serde(default = "default_arrow_direction")]
    pub direction: PointData,
    #[serde(default = "default_arrow_interval")]
    pub interval: f32,
    #[serde(default = "default_arrow_speed")]
    pub speed: f32,
    #[serde(default = "default_arrow_lifetime")]
    pub lifetime: f32,
    #[serde(default)]
    pub spawn_offset: Option<PointData>,
}

impl ArrowTrapData {
    pub fn to_trap(&self) -> ArrowTrap {
        let offset = self.spawn_offset.map(Vec2::from).unwrap_or(Vec2::ZERO);
        ArrowTrap::new(
            Vec2::from(self.position) + offset,
            self.direction.into(),
            self.speed,
            self.lifetime,
            self.interval,
        )
    }
}

/// Level exit data - entering the area loads `to_level`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExitData {
    pub to_level: String,
    pub area: AreaData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_trap_defaults() {
        let data: ArrowTrapData =
            serde_json::from_str(r#"{ "position": { "x": 2.0, "y": 1.0 } }"#).unwrap();
        let trap = data.to_trap();

        assert_eq!(trap.origin, Vec2::new(2.0, 1.0));
        assert_eq!(trap.direction, Vec2::X);
        assert_eq!(trap.speed, 10.0);
        assert_eq!(trap.lifetime, 5.0);
        assert_eq!(trap.interval.duration().as_secs_f32(), 5.0);
    }

    #[test]
    fn test_arrow_trap_offset_moves_origin() {
        let json = r#"{
            "position": { "x": 2.0, "y": 1.0 },
            "direction": { "x": -1.0, "y": 0.0 },
            "spawn_offset": { "x": -0.5, "y": 0.25 }
        }"#;
        let trap = serde_json::from_str::<ArrowTrapData>(json).unwrap().to_trap();

        assert_eq!(trap.origin, Vec2::new(1.5, 1.25));
        assert_eq!(trap.direction, Vec2::NEG_X);
    }
    use crate::mask::MaskId;

    #[test]
    fn test_level_number_from_id() {
        assert_eq!(level_number("level_3"), 3);
        assert_eq!(level_number("Level12Boss"), 12);
        assert_eq!(level_number("4-2"), 4);
        assert_eq!(level_number("menu"), 0);
        assert_eq!(level_number(""), 0);
    }

    #[test]
    fn test_minimal_level_data() {
        // Test with minimal required fields
        let json = r#"{
            "id": "level_1",
            "bounds": {"x": 0.0, "y": 0.0, "width": 80.0, "height": 40.0},
            "spawn_point": {"x": -30.0, "y": 2.0},
            "geometry": []
        }"#;

        let level: LevelData = serde_json::from_str(json).unwrap();
        assert_eq!(level.number(), 1);
        assert_eq!(Vec2::from(level.spawn_point), Vec2::new(-30.0, 2.0));
        assert!(level.geometry.is_empty());
        assert!(level.anchors.is_empty());
        assert!(level.teleporters.is_empty());
        assert!(level.exits.is_empty());
    }

    #[test]
    fn test_geometry_tag_field() {
        let json = r#"[
            {"x": 0.0, "y": 0.0, "width": 10.0, "height": 1.0},
            {"tag": "Hazard", "x": 4.0, "y": 1.0, "width": 2.0, "height": 0.5},
            {"tag": {"MaskOnly": 3}, "x": 8.0, "y": 3.0, "width": 4.0, "height": 0.5}
        ]"#;

        let geometry: Vec<GeometryData> = serde_json::from_str(json).unwrap();
        assert_eq!(geometry[0].tag, None);
        assert_eq!(geometry[1].tag, Some(WorldTag::Hazard));
        assert_eq!(geometry[2].tag, Some(WorldTag::MaskOnly(MaskId::ROPE)));
    }

    #[test]
    fn test_mask_only_rejects_unknown_mask() {
        let json = r#"{"tag": {"MaskOnly": 9}, "x": 0.0, "y": 0.0, "width": 1.0, "height": 1.0}"#;
        assert!(serde_json::from_str::<GeometryData>(json).is_err());
    }

    #[test]
    fn test_teleporter_defaults() {
        let json = r#"{
            "area": {"x": 5.0, "y": 0.0, "width": 1.0, "height": 3.0},
            "target": {"x": -5.0, "y": 10.0}
        }"#;

        let teleporter = serde_json::from_str::<TeleporterData>(json)
            .unwrap()
            .to_teleporter();
        assert_eq!(teleporter.exit_rotation, 180.0);
        assert!(!teleporter.flip_horizontal);
        assert_eq!(teleporter.exit_facing, None);
        assert_eq!(teleporter.target, Vec2::new(-5.0, 10.0));
    }

    #[test]
    fn test_teleporter_exit_facing() {
        let json = r#"{
            "area": {"x": 5.0, "y": 0.0, "width": 1.0, "height": 3.0},
            "target": {"x": -5.0, "y": 10.0},
            "exit_rotation": 0.0,
            "flip_horizontal": true,
            "exit_facing": "left"
        }"#;

        let teleporter: TeleporterData = serde_json::from_str(json).unwrap();
        assert_eq!(teleporter.exit_facing, Some(Facing::Left));
        assert!(teleporter.flip_horizontal);
    }
}

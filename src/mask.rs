use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Mask definitions shipped with the game
pub const EMBEDDED_MASKS: &str = include_str!("../assets/data/masks.json");

/// Mask identifier, always in `1..=4`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MaskId(u8);

impl MaskId {
    pub const BASE: MaskId = MaskId(1);
    pub const TIME: MaskId = MaskId(2);
    pub const ROPE: MaskId = MaskId(3);
    pub const PHASE: MaskId = MaskId(4);

    pub const ALL: [MaskId; 4] = [Self::BASE, Self::TIME, Self::ROPE, Self::PHASE];

    pub fn new(id: u8) -> Option<Self> {
        (1..=4).contains(&id).then_some(MaskId(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MaskId {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        MaskId::new(id).ok_or_else(|| format!("mask id {} out of range 1..=4", id))
    }
}

impl From<MaskId> for u8 {
    fn from(id: MaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of one mask
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskData {
    pub id: MaskId,
    pub name: String,
    pub unlock_level: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub lock_path: String,
    #[serde(default)]
    pub keybind: String,
    #[serde(default)]
    pub ui_color: String,
    #[serde(default)]
    pub unlock_message: String,
    #[serde(default)]
    pub y_offset: f32,
}

impl MaskData {
    pub fn is_unlocked(&self, level: u32) -> bool {
        level >= self.unlock_level
    }
}

/// Default use counts, keyed by level then mask
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UseBudgetTable {
    levels: BTreeMap<u32, BTreeMap<MaskId, u32>>,
}

impl UseBudgetTable {
    pub fn new(levels: BTreeMap<u32, BTreeMap<MaskId, u32>>) -> Self {
        Self { levels }
    }

    /// Budget for `level`. Levels missing from the table inherit the nearest
    /// lower listed level; anything below the first entry gets nothing.
    pub fn budget_for(&self, level: u32) -> MaskUseBudget {
        self.levels
            .range(..=level)
            .next_back()
            .map(|(_, uses)| MaskUseBudget {
                uses: uses.clone(),
            })
            .unwrap_or_default()
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }

    fn masks(&self) -> impl Iterator<Item = MaskId> + '_ {
        self.levels.values().flat_map(|uses| uses.keys().copied())
    }
}

/// Remaining uses per mask for the current level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaskUseBudget {
    uses: BTreeMap<MaskId, u32>,
}

impl MaskUseBudget {
    pub fn uses(&self, mask: MaskId) -> u32 {
        self.uses.get(&mask).copied().unwrap_or(0)
    }

    /// Spend one use. Returns false and changes nothing when none remain.
    pub fn use_one(&mut self, mask: MaskId) -> bool {
        match self.uses.get_mut(&mask) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Parsed contents of the mask data file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskDefinitions {
    pub masks: Vec<MaskData>,
    #[serde(default)]
    pub uses: UseBudgetTable,
}

impl MaskDefinitions {
    pub fn embedded() -> Result<Self, MaskDataError> {
        parse_mask_definitions(EMBEDDED_MASKS, "<embedded>")
    }

    pub fn get(&self, id: MaskId) -> Option<&MaskData> {
        self.masks.iter().find(|mask| mask.id == id)
    }

    /// The mask that becomes available exactly at `level`, if any
    pub fn unlocked_at(&self, level: u32) -> Option<&MaskData> {
        self.masks.iter().find(|mask| mask.unlock_level == level)
    }
}

/// Load mask definitions from a JSON file
pub fn load_masks_from_file(path: &Path) -> Result<MaskDefinitions, MaskDataError> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(MaskDataError::FileNotFound(display));
    }

    let contents =
        fs::read_to_string(path).map_err(|e| MaskDataError::IoError(display.clone(), e.to_string()))?;

    parse_mask_definitions(&contents, &display)
}

/// Parse and validate mask definitions; `origin` names the source in errors
pub fn parse_mask_definitions(json: &str, origin: &str) -> Result<MaskDefinitions, MaskDataError> {
    let definitions: MaskDefinitions = serde_json::from_str(json)
        .map_err(|e| MaskDataError::ParseError(origin.to_string(), e.to_string()))?;

    validate_mask_definitions(&definitions)?;

    Ok(definitions)
}

fn validate_mask_definitions(definitions: &MaskDefinitions) -> Result<(), MaskDataError> {
    if definitions.masks.is_empty() {
        return Err(MaskDataError::ValidationError(
            "Mask list cannot be empty".to_string(),
        ));
    }

    for (i, mask) in definitions.masks.iter().enumerate() {
        if mask.name.is_empty() {
            return Err(MaskDataError::ValidationError(format!(
                "Mask {} has an empty name",
                mask.id
            )));
        }

        if definitions.masks[..i].iter().any(|other| other.id == mask.id) {
            return Err(MaskDataError::ValidationError(format!(
                "Mask {} is defined twice",
                mask.id
            )));
        }
    }

    if definitions.get(MaskId::BASE).is_none() {
        return Err(MaskDataError::ValidationError(
            "Base mask 1 must be defined".to_string(),
        ));
    }

    if let Some(unknown) = definitions
        .uses
        .masks()
        .find(|id| definitions.get(*id).is_none())
    {
        return Err(MaskDataError::ValidationError(format!(
            "Use table references unknown mask {}",
            unknown
        )));
    }

    Ok(())
}

/// Mask data loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum MaskDataError {
    FileNotFound(String),
    IoError(String, String),
    ParseError(String, String),
    ValidationError(String),
}

impl std::fmt::Display for MaskDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskDataError::FileNotFound(path) => write!(f, "Mask data not found: {}", path),
            MaskDataError::IoError(path, err) => {
                write!(f, "IO error reading mask data {}: {}", path, err)
            }
            MaskDataError::ParseError(path, err) => {
                write!(f, "Failed to parse mask data {}: {}", path, err)
            }
            MaskDataError::ValidationError(msg) => write!(f, "Mask data validation error: {}", msg),
        }
    }
}

impl std::error::Error for MaskDataError {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_embedded_definitions_load() {
        let definitions = MaskDefinitions::embedded().unwrap();
        assert_eq!(definitions.masks.len(), 4);
        for id in MaskId::ALL {
            let mask = definitions.get(id).unwrap();
            assert_eq!(mask.unlock_level, u32::from(id.get()));
        }
    }

    #[test]
    fn test_default_rope_budget_on_level_three() {
        let definitions = MaskDefinitions::embedded().unwrap();
        let budget = definitions.uses.budget_for(3);
        assert_eq!(budget.uses(MaskId::ROPE), 2);
        assert_eq!(budget.uses(MaskId::PHASE), 0);
    }

    #[test]
    fn test_mask_id_range() {
        assert!(MaskId::new(0).is_none());
        assert!(MaskId::new(5).is_none());
        assert_eq!(MaskId::new(3), Some(MaskId::ROPE));
    }

    #[test]
    fn test_mask_id_rejected_when_out_of_range() {
        let result: Result<MaskId, _> = serde_json::from_str("7");
        assert!(result.is_err());
    }

    #[test]
    fn test_budget_table_falls_back_to_lower_level() {
        let json = r#"{ "2": { "1": 1 }, "5": { "1": 4 } }"#;
        let table: UseBudgetTable = serde_json::from_str(json).unwrap();

        assert_eq!(table.budget_for(1).uses(MaskId::BASE), 0);
        assert_eq!(table.budget_for(2).uses(MaskId::BASE), 1);
        assert_eq!(table.budget_for(4).uses(MaskId::BASE), 1);
        assert_eq!(table.budget_for(9).uses(MaskId::BASE), 4);
    }

    #[test]
    fn test_use_one_stops_at_zero() {
        let mut levels = BTreeMap::new();
        levels.insert(1, BTreeMap::from([(MaskId::TIME, 1)]));
        let mut budget = UseBudgetTable::new(levels).budget_for(1);

        assert!(budget.use_one(MaskId::TIME));
        assert_eq!(budget.uses(MaskId::TIME), 0);
        assert!(!budget.use_one(MaskId::TIME));
        assert_eq!(budget.uses(MaskId::TIME), 0);
        assert!(!budget.use_one(MaskId::PHASE));
    }

    #[test]
    fn test_unlocked_at_level() {
        let definitions = MaskDefinitions::embedded().unwrap();
        assert_eq!(definitions.unlocked_at(3).unwrap().id, MaskId::ROPE);
        assert!(definitions.unlocked_at(9).is_none());
    }

    #[test]
    fn test_load_masks_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(EMBEDDED_MASKS.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let definitions = load_masks_from_file(temp_file.path()).unwrap();
        assert_eq!(definitions, MaskDefinitions::embedded().unwrap());
    }

    #[test]
    fn test_load_masks_file_not_found() {
        let result = load_masks_from_file(Path::new("missing/masks.json"));
        assert!(matches!(result, Err(MaskDataError::FileNotFound(_))));
    }

    #[test]
    fn test_load_masks_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{ masks: ").unwrap();
        temp_file.flush().unwrap();

        let result = load_masks_from_file(temp_file.path());
        assert!(matches!(result, Err(MaskDataError::ParseError(_, _))));
    }

    #[test]
    fn test_validate_duplicate_mask() {
        let json = r#"{
            "masks": [
                { "id": 1, "name": "Hollow", "unlock_level": 1 },
                { "id": 1, "name": "Again", "unlock_level": 2 }
            ]
        }"#;
        let result = parse_mask_definitions(json, "test");
        assert!(matches!(result, Err(MaskDataError::ValidationError(_))));
    }

    #[test]
    fn test_validate_requires_base_mask() {
        let json = r#"{ "masks": [ { "id": 2, "name": "Hourglass", "unlock_level": 2 } ] }"#;
        let result = parse_mask_definitions(json, "test");
        assert!(matches!(result, Err(MaskDataError::ValidationError(_))));
    }

    #[test]
    fn test_validate_use_table_unknown_mask() {
        let json = r#"{
            "masks": [ { "id": 1, "name": "Hollow", "unlock_level": 1 } ],
            "uses": { "1": { "3": 2 } }
        }"#;
        let result = parse_mask_definitions(json, "test");
        assert!(matches!(result, Err(MaskDataError::ValidationError(_))));
    }

    proptest! {
        #[test]
        fn prop_budget_never_negative(initial in 0u32..5, attempts in 0usize..12) {
            let mut levels = BTreeMap::new();
            levels.insert(1, BTreeMap::from([(MaskId::ROPE, initial)]));
            let mut budget = UseBudgetTable::new(levels).budget_for(1);

            let mut granted = 0u32;
            for _ in 0..attempts {
                if budget.use_one(MaskId::ROPE) {
                    granted += 1;
                }
            }

            prop_assert_eq!(granted, initial.min(attempts as u32));
            prop_assert_eq!(budget.uses(MaskId::ROPE), initial - granted);
        }
    }
}

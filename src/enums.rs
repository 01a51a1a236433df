use crate::mask::MaskId;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Active ability bound to a mask
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    TimeSlow,
    Rope,
    Phase,
}

impl AbilityKind {
    /// Ability triggered by the ability key while `mask` is equipped.
    /// The base mask is passive (bonus jump) and has none.
    pub fn for_mask(mask: MaskId) -> Option<Self> {
        match mask {
            MaskId::TIME => Some(AbilityKind::TimeSlow),
            MaskId::ROPE => Some(AbilityKind::Rope),
            MaskId::PHASE => Some(AbilityKind::Phase),
            _ => None,
        }
    }
}

/// Direction the player faces - drives anchor search and teleport exits
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    /// Whether `x` lies on the side the player faces, counting `origin_x` itself.
    pub fn includes(self, origin_x: f32, x: f32) -> bool {
        match self {
            Facing::Left => x <= origin_x,
            Facing::Right => x >= origin_x,
        }
    }
}

/// World object tag - the gameplay category of a level entity
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldTag {
    Ground,
    Anchor,
    /// Resets the player on contact. Only drawn under the trap-revealing mask.
    Hazard,
    /// Solid geometry the phase ability lets the player pass through
    PhasePassable,
    /// Resets the player unless phasing. Drawn under two masks.
    PhaseHazard,
    /// Exists only while the given mask is equipped
    MaskOnly(MaskId),
}

impl WorldTag {
    /// Tags whose collision the phase ability suspends
    pub fn is_phaseable(self) -> bool {
        matches!(self, WorldTag::PhasePassable | WorldTag::PhaseHazard)
    }
}

/// Why an entity's collision with the player is currently suspended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IgnoreSource {
    Gate,
    Phase,
}

use crate::enums::Facing;
use crate::mask::{MaskData, MaskDefinitions, MaskId, MaskUseBudget};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Position component - world coordinates (y up)
#[derive(Component, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Velocity component - world units per second
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

impl Velocity {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Collider component - axis-aligned box centred on the position plus offset
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Collider {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Grounded state - result of the last ground probe
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct GroundedState {
    pub is_grounded: bool,
    pub was_grounded: bool,
    /// Ground-layer geometry within wall reach on either side
    pub touching_wall: bool,
}

impl GroundedState {
    /// True on the frame the player lands
    pub fn just_landed(&self) -> bool {
        self.is_grounded && !self.was_grounded
    }

    /// Airborne against a wall
    pub fn wall_sliding(&self) -> bool {
        self.touching_wall && !self.is_grounded
    }
}

/// Jump bookkeeping - one ground jump per landing, one bonus jump per airtime
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct JumpState {
    pub used_ground_jump: bool,
    pub used_air_jump: bool,
}

/// Locomotion switch. The rope turns it off; release arms `reactivate_when_grounded`.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Locomotion {
    pub enabled: bool,
    pub reactivate_when_grounded: bool,
    /// The guard skips the frame it was armed on
    pub guard_armed_this_frame: bool,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            enabled: true,
            reactivate_when_grounded: false,
            guard_armed_this_frame: false,
        }
    }
}

impl Locomotion {
    pub fn disable(&mut self) {
        self.enabled = false;
        self.reactivate_when_grounded = false;
        self.guard_armed_this_frame = false;
    }

    pub fn arm_reactivation(&mut self) {
        self.reactivate_when_grounded = true;
        self.guard_armed_this_frame = true;
    }
}

/// Player marker component
#[derive(Component)]
pub struct Player;

/// Player intent component - one frame of input
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct PlayerIntent {
    pub move_left: bool,
    pub move_right: bool,
    pub jump_just_pressed: bool,
    pub mask_select: Option<MaskId>,
    pub ability_just_pressed: bool,
    pub ability_just_released: bool,
    pub reset_just_pressed: bool,
}

impl PlayerIntent {
    /// -1, 0 or +1. When both directions are held, right wins.
    pub fn horizontal(&self) -> f32 {
        if self.move_right {
            1.0
        } else if self.move_left {
            -1.0
        } else {
            0.0
        }
    }

    /// Drop one-shot presses, keep held keys
    pub fn clear_presses(&mut self) {
        self.jump_just_pressed = false;
        self.mask_select = None;
        self.ability_just_pressed = false;
        self.ability_just_released = false;
        self.reset_just_pressed = false;
    }
}

/// Level geometry component - static collision box
#[derive(Component, Clone, Debug, PartialEq)]
pub struct LevelGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LevelGeometry {
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x - self.width / 2.0, self.y - self.height / 2.0)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Render and collision state decided by the visibility gate
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Gated {
    pub rendered: bool,
    pub collidable: bool,
}

impl Default for Gated {
    fn default() -> Self {
        Self {
            rendered: true,
            collidable: true,
        }
    }
}

/// Trigger that moves the player elsewhere
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Teleporter {
    pub area: LevelGeometry,
    pub target: Vec2,
    /// Degrees applied to the player's velocity on exit
    pub exit_rotation: f32,
    pub flip_horizontal: bool,
    pub exit_facing: Option<Facing>,
}

/// Fires arrows along `direction` every interval
#[derive(Component, Clone, Debug)]
pub struct ArrowTrap {
    pub origin: Vec2,
    pub direction: Vec2,
    pub speed: f32,
    pub lifetime: f32,
    pub interval: Timer,
}

impl ArrowTrap {
    pub fn new(origin: Vec2, direction: Vec2, speed: f32, lifetime: f32, interval: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            speed,
            lifetime,
            interval: Timer::from_seconds(interval, TimerMode::Repeating),
        }
    }

    pub fn arrow_velocity(&self) -> Velocity {
        let v = self.direction * self.speed;
        Velocity::new(v.x, v.y)
    }
}

/// A flying arrow; gone once `lifetime` runs out or it hits something
#[derive(Component, Clone, Debug)]
pub struct Arrow {
    pub lifetime: Timer,
}

impl Arrow {
    pub fn new(lifetime: f32) -> Self {
        Self {
            lifetime: Timer::from_seconds(lifetime, TimerMode::Once),
        }
    }
}

/// Why a mask switch was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchRejected {
    Locked { unlock_level: u32 },
    UnknownMask,
}

/// Ability controller state - active mask and remaining uses for this level
#[derive(Component, Clone, Debug, PartialEq)]
pub struct MaskController {
    active: MaskId,
    budget: MaskUseBudget,
    last_known_level: Option<u32>,
    last_unlock_shown: Option<u32>,
}

impl Default for MaskController {
    fn default() -> Self {
        Self {
            active: MaskId::BASE,
            budget: MaskUseBudget::default(),
            last_known_level: None,
            last_unlock_shown: None,
        }
    }
}

impl MaskController {
    pub fn active(&self) -> MaskId {
        self.active
    }

    pub fn uses_for(&self, mask: MaskId) -> u32 {
        self.budget.uses(mask)
    }

    pub fn use_one(&mut self, mask: MaskId) -> bool {
        self.budget.use_one(mask)
    }

    pub fn last_known_level(&self) -> Option<u32> {
        self.last_known_level
    }

    /// Whether `target` may be equipped on `level`
    pub fn can_switch(
        &self,
        target: MaskId,
        level: u32,
        definitions: &MaskDefinitions,
    ) -> Result<(), SwitchRejected> {
        let mask = definitions
            .get(target)
            .ok_or(SwitchRejected::UnknownMask)?;

        if mask.is_unlocked(level) {
            Ok(())
        } else {
            Err(SwitchRejected::Locked {
                unlock_level: mask.unlock_level,
            })
        }
    }

    /// Equip a mask. Callers check `can_switch` and release the rope first.
    pub fn set_active(&mut self, mask: MaskId) {
        self.active = mask;
    }

    /// Passive ability of the base mask: an extra jump while airborne
    pub fn can_use_bonus_jump(&self) -> bool {
        self.active == MaskId::BASE && self.budget.uses(MaskId::BASE) > 0
    }

    pub fn use_bonus_jump(&mut self) -> bool {
        self.can_use_bonus_jump() && self.budget.use_one(MaskId::BASE)
    }

    /// Reload budgets from the table for `level`
    pub fn reload_budget(&mut self, level: u32, definitions: &MaskDefinitions) {
        self.budget = definitions.uses.budget_for(level);
    }

    /// Record a level change and reload budgets. Returns true when the
    /// equipped mask is locked on the new level and must fall back to base.
    pub fn enter_level(&mut self, level: u32, definitions: &MaskDefinitions) -> bool {
        self.last_known_level = Some(level);
        self.reload_budget(level, definitions);

        definitions
            .get(self.active)
            .is_none_or(|mask| !mask.is_unlocked(level))
            && self.active != MaskId::BASE
    }

    /// Mask unlocked by entering `level`, reported once per level and never for the first level
    pub fn take_unlock<'a>(
        &mut self,
        level: u32,
        definitions: &'a MaskDefinitions,
    ) -> Option<&'a MaskData> {
        if level <= 1 || self.last_unlock_shown == Some(level) {
            return None;
        }

        let mask = definitions.unlocked_at(level)?;
        self.last_unlock_shown = Some(level);
        Some(mask)
    }
}

/// Phase ability state
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseState {
    pub active: bool,
    pub remaining: f32,
    pub cooldown: f32,
    last_cooldown_ceil: u32,
    started_this_frame: bool,
}

/// What happened during one phase tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTick {
    pub expired: bool,
    pub refresh_ui: bool,
}

impl PhaseState {
    pub fn can_begin(&self) -> bool {
        !self.active && self.cooldown <= 0.0
    }

    pub fn begin(&mut self, duration: f32) -> bool {
        if !self.can_begin() {
            return false;
        }

        self.active = true;
        self.remaining = duration;
        self.started_this_frame = true;
        true
    }

    /// Advance timers by `dt`. Expiry starts the full cooldown.
    /// The frame that began the phase is not counted.
    pub fn tick(&mut self, dt: f32, cooldown_max: f32) -> PhaseTick {
        if self.active {
            if self.started_this_frame {
                self.started_this_frame = false;
                return PhaseTick::default();
            }

            self.remaining -= dt;
            if self.remaining <= 0.0 {
                self.end_with_cooldown(cooldown_max);
                return PhaseTick {
                    expired: true,
                    refresh_ui: true,
                };
            }
            return PhaseTick::default();
        }

        if self.cooldown <= 0.0 {
            return PhaseTick::default();
        }

        self.cooldown = (self.cooldown - dt).max(0.0);
        let ceil = self.cooldown.ceil() as u32;
        let refresh_ui = self.cooldown == 0.0 || ceil != self.last_cooldown_ceil;
        self.last_cooldown_ceil = ceil;

        PhaseTick {
            expired: false,
            refresh_ui,
        }
    }

    pub fn end_with_cooldown(&mut self, cooldown_max: f32) {
        self.active = false;
        self.remaining = 0.0;
        self.started_this_frame = false;
        self.cooldown = cooldown_max;
        self.last_cooldown_ceil = cooldown_max.ceil() as u32;
    }

    /// Drop any effect and cooldown
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Rope ability state - the anchor only exists while `active`
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct RopeState {
    pub active: bool,
    pub anchor: Option<Entity>,
    pub anchor_point: Vec2,
    pub length: f32,
    /// Rope line endpoints, anchor first. `None` hides the line.
    pub line: Option<(Vec2, Vec2)>,
    /// Animation flag
    pub roping: bool,
}

impl RopeState {
    pub fn attach(
        &mut self,
        anchor: Entity,
        anchor_point: Vec2,
        player: Vec2,
        locomotion: &mut Locomotion,
    ) {
        self.active = true;
        self.anchor = Some(anchor);
        self.anchor_point = anchor_point;
        self.length = anchor_point.distance(player);
        self.line = Some((anchor_point, player));
        self.roping = true;
        locomotion.disable();
    }

    /// Let go of the anchor, keeping swing momentum. No-op when not attached.
    pub fn release(
        &mut self,
        velocity: &mut Velocity,
        locomotion: &mut Locomotion,
        jumps: &mut JumpState,
        boost: f32,
    ) -> bool {
        if !self.active {
            return false;
        }

        self.active = false;
        self.anchor = None;
        self.line = None;
        self.roping = false;

        velocity.x *= boost;
        velocity.y *= boost;
        locomotion.arm_reactivation();
        jumps.used_air_jump = false;
        true
    }
}

/// Everything the player entity starts with
#[derive(Bundle)]
pub struct PlayerBundle {
    pub player: Player,
    pub position: Position,
    pub velocity: Velocity,
    pub collider: Collider,
    pub grounded: GroundedState,
    pub jumps: JumpState,
    pub locomotion: Locomotion,
    pub facing: Facing,
    pub intent: PlayerIntent,
    pub mask: MaskController,
    pub phase: PhaseState,
    pub rope: RopeState,
}

impl PlayerBundle {
    pub fn new(spawn: Vec2) -> Self {
        Self {
            player: Player,
            position: Position::from(spawn),
            velocity: Velocity::default(),
            collider: Collider::new(1.0, 2.0),
            grounded: GroundedState::default(),
            jumps: JumpState::default(),
            locomotion: Locomotion::default(),
            facing: Facing::default(),
            intent: PlayerIntent::default(),
            mask: MaskController::default(),
            phase: PhaseState::default(),
            rope: RopeState::default(),
        }
    }
}

use crate::components::{
    JumpState, Locomotion, MaskController, Player, PlayerIntent, RopeState, SwitchRejected,
    Velocity,
};
use crate::enums::AbilityKind;
use crate::mask::{MaskData, MaskDataError, MaskDefinitions, MaskId, load_masks_from_file};
use crate::plugins::level::CurrentLevel;
use crate::plugins::reset::PlayerReset;
use crate::plugins::phase::{PHASE_COOLDOWN, PHASE_DURATION};
use crate::plugins::rope::{ROPE_MAX_DISTANCE, ROPE_RELEASE_BOOST};
use crate::plugins::time_slow::{TIME_SLOW_DURATION, TIME_SLOW_FACTOR};
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;
use std::path::PathBuf;

/// Where mask definitions come from
#[derive(Resource, Clone, Debug, Default, PartialEq, Eq)]
pub enum MaskDataSource {
    #[default]
    Embedded,
    File(PathBuf),
}

impl MaskDataSource {
    pub fn load(&self) -> Result<MaskDefinitions, MaskDataError> {
        match self {
            MaskDataSource::Embedded => MaskDefinitions::embedded(),
            MaskDataSource::File(path) => load_masks_from_file(path),
        }
    }
}

/// Ability tuning shared by the ability plugins
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct AbilityTuning {
    /// Fraction of the current time scale applied while slowed
    pub time_slow_factor: f32,
    /// Real-time seconds
    pub time_slow_duration: f32,
    pub phase_duration: f32,
    pub phase_cooldown: f32,
    pub rope_max_distance: f32,
    pub rope_release_boost: f32,
}

impl Default for AbilityTuning {
    fn default() -> Self {
        Self {
            time_slow_factor: TIME_SLOW_FACTOR,
            time_slow_duration: TIME_SLOW_DURATION,
            phase_duration: PHASE_DURATION,
            phase_cooldown: PHASE_COOLDOWN,
            rope_max_distance: ROPE_MAX_DISTANCE,
            rope_release_boost: ROPE_RELEASE_BOOST,
        }
    }
}

/// Loaded mask definitions. Empty until a load succeeds; while empty every
/// switch and trigger is ignored.
#[derive(Resource, Clone, Debug, Default)]
pub struct MaskCatalog {
    definitions: Option<MaskDefinitions>,
    /// Level on which the last load failed; retried only on another level
    failed_on: Option<u32>,
}

impl MaskCatalog {
    pub fn new(definitions: MaskDefinitions) -> Self {
        Self {
            definitions: Some(definitions),
            failed_on: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.definitions.is_some()
    }

    pub fn definitions(&self) -> Option<&MaskDefinitions> {
        self.definitions.as_ref()
    }

    /// Try `source` again, keeping the previous state on failure
    pub fn reload(&mut self, source: &MaskDataSource) -> Result<(), MaskDataError> {
        let definitions = source.load()?;
        self.definitions = Some(definitions);
        self.failed_on = None;
        Ok(())
    }

    fn should_retry(&self, level: u32) -> bool {
        !self.is_ready() && self.failed_on != Some(level)
    }
}

/// Sent when the equipped mask changes
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskChanged {
    pub from: MaskId,
    pub to: MaskId,
}

/// Tells display elements to re-read uses, lock states and cooldowns
#[derive(Event, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskUiRefresh;

/// Sent once when a level that unlocks a mask is entered
#[derive(Event, Clone, Debug, PartialEq)]
pub struct MaskUnlocked {
    pub mask: MaskId,
    pub name: String,
    pub message: String,
}

/// Sent after the controller has taken in a new level number
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelChanged {
    pub from: Option<u32>,
    pub to: u32,
}

/// Ability key pressed with an active-ability mask equipped
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityTriggered {
    pub kind: AbilityKind,
}

/// Ability key released
#[derive(Event, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbilityReleased;

/// One entry of the mask bar
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSlotView {
    pub id: MaskId,
    pub name: String,
    pub keybind: String,
    pub uses: u32,
    pub locked: bool,
    pub active: bool,
    pub ui_color: String,
    pub icon_path: String,
    pub lock_path: String,
}

/// Mask bar contents in definition order
pub fn mask_slots(
    definitions: &MaskDefinitions,
    controller: &MaskController,
    level: u32,
) -> Vec<MaskSlotView> {
    definitions
        .masks
        .iter()
        .map(|mask: &MaskData| MaskSlotView {
            id: mask.id,
            name: mask.name.clone(),
            keybind: mask.keybind.clone(),
            uses: controller.uses_for(mask.id),
            locked: !mask.is_unlocked(level),
            active: controller.active() == mask.id,
            ui_color: mask.ui_color.clone(),
            icon_path: mask.icon_path.clone(),
            lock_path: mask.lock_path.clone(),
        })
        .collect()
}

/// Plugin for mask selection, use budgets and ability dispatch
pub struct MaskPlugin;

impl Plugin for MaskPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<MaskDataSource>()
            .init_resource::<MaskCatalog>()
            .init_resource::<CurrentLevel>()
            .init_resource::<AbilityTuning>()
            .add_event::<MaskChanged>()
            .add_event::<MaskUiRefresh>()
            .add_event::<MaskUnlocked>()
            .add_event::<LevelChanged>()
            .add_event::<AbilityTriggered>()
            .add_event::<AbilityReleased>()
            .add_event::<PlayerReset>()
            .add_systems(Startup, load_mask_catalog_system)
            .add_systems(Update, reset_budget_system.in_set(FrameSet::Reset))
            .add_systems(Update, mask_switch_system.in_set(FrameSet::Switch))
            .add_systems(Update, ability_trigger_system.in_set(FrameSet::Trigger))
            .add_systems(Update, level_change_system.in_set(FrameSet::Level));
    }
}

fn load_mask_catalog_system(
    source: Res<MaskDataSource>,
    level: Res<CurrentLevel>,
    mut catalog: ResMut<MaskCatalog>,
) {
    match catalog.reload(&source) {
        Ok(()) => info!("Mask data loaded - press 1/2/3/4 to switch masks"),
        Err(e) => {
            error!("{}; masks disabled until the next level loads", e);
            catalog.failed_on = Some(level.0);
        }
    }
}

/// Handle mask selection input
#[allow(clippy::type_complexity)]
fn mask_switch_system(
    catalog: Res<MaskCatalog>,
    level: Res<CurrentLevel>,
    tuning: Res<AbilityTuning>,
    mut query: Query<
        (
            &PlayerIntent,
            &mut MaskController,
            &mut RopeState,
            &mut Velocity,
            &mut Locomotion,
            &mut JumpState,
        ),
        With<Player>,
    >,
    mut changed: EventWriter<MaskChanged>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    let Some(definitions) = catalog.definitions() else {
        return;
    };

    for (intent, mut controller, mut rope, mut velocity, mut locomotion, mut jumps) in
        query.iter_mut()
    {
        let Some(target) = intent.mask_select else {
            continue;
        };

        match controller.can_switch(target, level.0, definitions) {
            Ok(()) => {}
            Err(SwitchRejected::Locked { unlock_level }) => {
                debug!("Mask {} is locked until level {}", target, unlock_level);
                continue;
            }
            Err(SwitchRejected::UnknownMask) => {
                warn!("Mask {} not found in mask data", target);
                continue;
            }
        }

        let from = controller.active();
        if from == target {
            continue;
        }

        if rope.release(&mut velocity, &mut locomotion, &mut jumps, tuning.rope_release_boost) {
            debug!("Rope released by mask switch");
        }

        controller.set_active(target);
        changed.send(MaskChanged { from, to: target });
        refresh.send(MaskUiRefresh);

        if let Some(mask) = definitions.get(target) {
            info!("Switched to {} mask", mask.name);
        }
    }
}

/// Turn ability key presses into ability events for the equipped mask
fn ability_trigger_system(
    catalog: Res<MaskCatalog>,
    query: Query<(&PlayerIntent, &MaskController), With<Player>>,
    mut triggered: EventWriter<AbilityTriggered>,
    mut released: EventWriter<AbilityReleased>,
) {
    for (intent, controller) in query.iter() {
        if intent.ability_just_pressed && catalog.is_ready() {
            if let Some(kind) = AbilityKind::for_mask(controller.active()) {
                triggered.send(AbilityTriggered { kind });
            }
        }

        // Release is honoured even without mask data so a rope never sticks
        if intent.ability_just_released {
            released.send(AbilityReleased);
        }
    }
}

/// React to the level number changing: reload budgets, clamp the mask, announce unlocks
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
fn level_change_system(
    source: Res<MaskDataSource>,
    mut catalog: ResMut<MaskCatalog>,
    level: Res<CurrentLevel>,
    tuning: Res<AbilityTuning>,
    mut query: Query<
        (
            &mut MaskController,
            &mut RopeState,
            &mut Velocity,
            &mut Locomotion,
            &mut JumpState,
        ),
        With<Player>,
    >,
    mut level_events: EventWriter<LevelChanged>,
    mut changed: EventWriter<MaskChanged>,
    mut unlocked: EventWriter<MaskUnlocked>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    for (mut controller, mut rope, mut velocity, mut locomotion, mut jumps) in query.iter_mut() {
        let previous = controller.last_known_level();
        if previous == Some(level.0) {
            continue;
        }

        if catalog.should_retry(level.0) {
            match catalog.reload(&source) {
                Ok(()) => info!("Mask data reloaded on level {}", level.0),
                Err(e) => {
                    error!("{}; masks stay disabled on level {}", e, level.0);
                    catalog.failed_on = Some(level.0);
                    continue;
                }
            }
        }

        let Some(definitions) = catalog.definitions() else {
            continue;
        };

        info!("Level changed from {:?} to {}", previous, level.0);

        if controller.enter_level(level.0, definitions) {
            let from = controller.active();
            rope.release(&mut velocity, &mut locomotion, &mut jumps, tuning.rope_release_boost);
            controller.set_active(MaskId::BASE);
            changed.send(MaskChanged {
                from,
                to: MaskId::BASE,
            });
            info!("Mask {} is locked on level {}, back to base mask", from, level.0);
        }

        if let Some(mask) = controller.take_unlock(level.0, definitions) {
            unlocked.send(MaskUnlocked {
                mask: mask.id,
                name: mask.name.clone(),
                message: mask.unlock_message.clone(),
            });
        }

        level_events.send(LevelChanged {
            from: previous,
            to: level.0,
        });
        refresh.send(MaskUiRefresh);
    }
}

/// A player reset reloads the budgets for the current level
fn reset_budget_system(
    mut resets: EventReader<PlayerReset>,
    catalog: Res<MaskCatalog>,
    level: Res<CurrentLevel>,
    mut query: Query<&mut MaskController, With<Player>>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    if resets.read().count() == 0 {
        return;
    }

    let Some(definitions) = catalog.definitions() else {
        return;
    };

    for mut controller in query.iter_mut() {
        controller.reload_budget(level.0, definitions);
        refresh.send(MaskUiRefresh);
    }
}

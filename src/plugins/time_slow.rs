use crate::components::{MaskController, Player};
use crate::enums::AbilityKind;
use crate::mask::MaskId;
use crate::plugins::mask::{AbilityTriggered, AbilityTuning, MaskUiRefresh};
use crate::plugins::reset::PlayerReset;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::app::AppExit;
use bevy::prelude::*;

/// Time-slow constants
pub const TIME_SLOW_FACTOR: f32 = 1.0 / 3.0;
pub const TIME_SLOW_DURATION: f32 = 1.0; // seconds of real time

/// Global slow-motion effect. Holds the speed to restore while active.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeSlow {
    active: bool,
    remaining: f32,
    saved_speed: f32,
    /// The frame that started the effect does not count against it
    started_this_frame: bool,
}

impl TimeSlow {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Start the effect. Returns the speed to apply, or `None` if already running.
    pub fn begin(&mut self, current_speed: f32, factor: f32, duration: f32) -> Option<f32> {
        if self.active {
            return None;
        }

        self.active = true;
        self.remaining = duration;
        self.saved_speed = current_speed;
        self.started_this_frame = true;
        Some(current_speed * factor)
    }

    /// Advance by real (unscaled) time. Returns the speed to restore on expiry.
    pub fn tick(&mut self, real_dt: f32) -> Option<f32> {
        if !self.active {
            return None;
        }
        if self.started_this_frame {
            self.started_this_frame = false;
            return None;
        }

        self.remaining -= real_dt;
        if self.remaining > 0.0 {
            return None;
        }
        self.end()
    }

    /// Stop now. Returns the saved speed if the effect was running.
    pub fn end(&mut self) -> Option<f32> {
        if !self.active {
            return None;
        }

        self.active = false;
        self.remaining = 0.0;
        self.started_this_frame = false;
        Some(self.saved_speed)
    }
}

/// Plugin for the time-slow ability
pub struct TimeSlowPlugin;

impl Plugin for TimeSlowPlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<TimeSlow>()
            .init_resource::<AbilityTuning>()
            .add_event::<AbilityTriggered>()
            .add_event::<MaskUiRefresh>()
            .add_event::<PlayerReset>()
            .add_systems(Update, reset_time_slow_system.in_set(FrameSet::Reset))
            .add_systems(Update, begin_time_slow_system.in_set(FrameSet::Ability))
            .add_systems(Update, tick_time_slow_system.in_set(FrameSet::Tick))
            .add_systems(Last, teardown_time_slow_system);
    }
}

fn begin_time_slow_system(
    mut triggered: EventReader<AbilityTriggered>,
    tuning: Res<AbilityTuning>,
    mut slow: ResMut<TimeSlow>,
    mut time: ResMut<Time<Virtual>>,
    mut query: Query<&mut MaskController, With<Player>>,
    mut refresh: EventWriter<MaskUiRefresh>,
) {
    let requested = triggered
        .read()
        .filter(|event| event.kind == AbilityKind::TimeSlow)
        .count();
    if requested == 0 {
        return;
    }

    for mut controller in query.iter_mut() {
        if slow.is_active() || controller.uses_for(MaskId::TIME) == 0 {
            continue;
        }

        let Some(speed) = slow.begin(
            time.relative_speed(),
            tuning.time_slow_factor,
            tuning.time_slow_duration,
        ) else {
            continue;
        };

        controller.use_one(MaskId::TIME);
        time.set_relative_speed(speed);
        refresh.send(MaskUiRefresh);
        info!("Time slowed to {:.2}x", speed);
    }
}

/// Counts down on the real clock so the slowed speed does not stretch the effect
fn tick_time_slow_system(
    real_time: Res<Time<Real>>,
    mut slow: ResMut<TimeSlow>,
    mut time: ResMut<Time<Virtual>>,
) {
    if let Some(speed) = slow.tick(real_time.delta_seconds()) {
        time.set_relative_speed(speed);
        info!("Time restored to {:.2}x", speed);
    }
}

fn reset_time_slow_system(
    mut resets: EventReader<PlayerReset>,
    mut slow: ResMut<TimeSlow>,
    mut time: ResMut<Time<Virtual>>,
) {
    if resets.read().count() == 0 {
        return;
    }

    if let Some(speed) = slow.end() {
        time.set_relative_speed(speed);
        debug!("Time slow cancelled by reset");
    }
}

/// Never leave the world slowed once the player is gone or the app is closing
fn teardown_time_slow_system(
    mut removed: RemovedComponents<Player>,
    mut exits: EventReader<AppExit>,
    mut slow: ResMut<TimeSlow>,
    mut time: ResMut<Time<Virtual>>,
) {
    let player_gone = removed.read().count() > 0;
    let exiting = exits.read().count() > 0;
    if !player_gone && !exiting {
        return;
    }

    if let Some(speed) = slow.end() {
        time.set_relative_speed(speed);
        info!("Time restored to {:.2}x on teardown", speed);
    }
}

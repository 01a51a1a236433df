use crate::components::{Gated, MaskController, Player};
use crate::enums::{IgnoreSource, WorldTag};
use crate::mask::MaskId;
use crate::plugins::mask::{LevelChanged, MaskChanged};
use crate::plugins::physics::CollisionFilter;
use crate::plugins::{FrameSet, ensure_frame_schedule};
use bevy::prelude::*;

/// Which masks reveal which hidden objects
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct GateConfig {
    /// Mask that shows hazards
    pub hazard_reveal: MaskId,
    /// Masks that show phase hazards
    pub phase_hazard_reveal: Vec<MaskId>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hazard_reveal: MaskId::TIME,
            phase_hazard_reveal: vec![MaskId::TIME, MaskId::PHASE],
        }
    }
}

/// Render/collision state of an object tagged `tag` while `active` is equipped
pub fn gate_state(tag: WorldTag, active: MaskId, config: &GateConfig) -> Gated {
    match tag {
        WorldTag::MaskOnly(mask) => {
            let present = mask == active;
            Gated {
                rendered: present,
                collidable: present,
            }
        }
        WorldTag::Hazard => Gated {
            rendered: active == config.hazard_reveal,
            collidable: true,
        },
        WorldTag::PhaseHazard => Gated {
            rendered: config.phase_hazard_reveal.contains(&active),
            collidable: true,
        },
        WorldTag::Ground | WorldTag::Anchor | WorldTag::PhasePassable => Gated::default(),
    }
}

/// Plugin for mask-dependent visibility of world objects
pub struct VisibilityGatePlugin;

impl Plugin for VisibilityGatePlugin {
    fn build(&self, app: &mut App) {
        ensure_frame_schedule(app);

        app.init_resource::<GateConfig>()
            .init_resource::<CollisionFilter>()
            .add_event::<MaskChanged>()
            .add_event::<LevelChanged>()
            .add_systems(Update, apply_gate_system.in_set(FrameSet::Visibility));
    }
}

/// Re-gate everything when the mask or level changes, otherwise only new objects
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
fn apply_gate_system(
    mut commands: Commands,
    config: Res<GateConfig>,
    mut filter: ResMut<CollisionFilter>,
    mut mask_changes: EventReader<MaskChanged>,
    mut level_changes: EventReader<LevelChanged>,
    player_query: Query<&MaskController, With<Player>>,
    tagged: Query<(Entity, &WorldTag, Option<&Children>)>,
    added: Query<Entity, Added<WorldTag>>,
) {
    let refresh_all = mask_changes.read().count() > 0 || level_changes.read().count() > 0;
    if !refresh_all && added.is_empty() {
        return;
    }

    let active = player_query
        .get_single()
        .map(|controller| controller.active())
        .unwrap_or(MaskId::BASE);

    let mut gated_count = 0;
    for (entity, tag, children) in tagged.iter() {
        if !refresh_all && !added.contains(entity) {
            continue;
        }

        let state = gate_state(*tag, active, &config);
        let children = children.into_iter().flat_map(|c| c.iter()).copied();
        for target in std::iter::once(entity).chain(children) {
            // Arrows and unloading level entities may already be queued for despawn
            commands.entity(target).try_insert(state);
            if state.collidable {
                filter.restore(target, IgnoreSource::Gate);
            } else {
                filter.ignore(target, IgnoreSource::Gate);
            }
        }
        gated_count += 1;
    }

    debug!("Gated {} objects for mask {}", gated_count, active);
}

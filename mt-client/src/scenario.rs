use bevy::prelude::*;
use clap::ValueEnum;
use crossbeam::channel::Sender;
use tracing::warn;

use mt_sim::world::{ContentId, NodeDef};
use mt_sim::{CurrentInput, NodeRegistry, PlayerControl, ScriptControlInput, SimClock, VoxelMap};
use mt_utils::{SettingsSender, SettingsUpdate};

/// Scripted sessions the headless client can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Walk forward on flat ground and hop once.
    Walk,
    /// Run across ice and let go of the keys.
    Ice,
    /// Detach the camera and fly it through a wall.
    Freecam,
    /// Fly through a wall with noclip.
    Noclip,
    /// Walk into a one-node step with autojump on.
    Autojump,
    /// Sneak off the edge of a small platform.
    Sneak,
    /// Sink into a pool and swim back up.
    Swim,
    /// Hand the controls to a script.
    Script,
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct ActiveScenario(pub Scenario);

pub struct ScenarioFrame {
    pub control: PlayerControl,
    pub updates: Vec<SettingsUpdate>,
}

fn node(registry: &mut NodeRegistry, fallback: NodeDef) -> ContentId {
    match registry.id_of(&fallback.name) {
        Some(id) => id,
        None => registry.register(fallback),
    }
}

impl Scenario {
    pub fn build_world(self, registry: &mut NodeRegistry) -> VoxelMap {
        let stone = node(registry, NodeDef::solid("stone"));
        let mut map = VoxelMap::new();
        map.load_region(IVec3::new(-32, -16, -32), IVec3::new(31, 31, 31));

        let floor = if self == Scenario::Ice {
            node(registry, NodeDef::solid("ice").with_group("slippery", 3))
        } else {
            stone
        };

        match self {
            Scenario::Walk | Scenario::Ice | Scenario::Script => {
                map.fill(IVec3::new(-24, 0, -24), IVec3::new(24, 0, 24), floor);
            }
            Scenario::Freecam | Scenario::Noclip => {
                map.fill(IVec3::new(-24, 0, -24), IVec3::new(24, 0, 24), stone);
                map.fill(IVec3::new(-24, 1, 4), IVec3::new(24, 4, 4), stone);
            }
            Scenario::Autojump => {
                map.fill(IVec3::new(-24, 0, -24), IVec3::new(24, 0, 24), stone);
                map.fill(IVec3::new(-24, 1, 3), IVec3::new(24, 1, 24), stone);
            }
            Scenario::Sneak => {
                map.fill(IVec3::new(0, 0, 0), IVec3::new(1, 0, 1), stone);
            }
            Scenario::Swim => {
                let water = node(registry, NodeDef::liquid("water", 1));
                map.fill(IVec3::new(-24, -6, -24), IVec3::new(24, -6, 24), stone);
                map.fill(IVec3::new(-24, -5, -24), IVec3::new(24, 0, 24), water);
            }
        }
        map
    }

    pub fn frame(self, tick: u32) -> ScenarioFrame {
        let forward = PlayerControl::from_keys(true, false, false, false);
        let mut updates = Vec::new();
        let control = match self {
            Scenario::Walk => {
                let mut c = if tick < 120 { forward } else { PlayerControl::default() };
                c.jump = tick == 40;
                c
            }
            Scenario::Ice => {
                if tick < 60 {
                    forward
                } else {
                    PlayerControl::default()
                }
            }
            Scenario::Freecam => {
                if tick == 10 {
                    updates.push(SettingsUpdate::Freecam(true));
                }
                if tick == 120 {
                    updates.push(SettingsUpdate::Freecam(false));
                }
                if (10..120).contains(&tick) {
                    forward
                } else {
                    PlayerControl::default()
                }
            }
            Scenario::Noclip => {
                if tick == 0 {
                    updates.push(SettingsUpdate::GrantPrivilege("fly".into()));
                    updates.push(SettingsUpdate::GrantPrivilege("noclip".into()));
                    updates.push(SettingsUpdate::FreeMove(true));
                    updates.push(SettingsUpdate::Noclip(true));
                }
                forward
            }
            Scenario::Autojump => {
                if tick == 0 {
                    updates.push(SettingsUpdate::Autojump(true));
                }
                forward
            }
            Scenario::Sneak => {
                let mut c = PlayerControl::from_keys(false, false, false, true);
                c.sneak = tick < 150;
                c
            }
            Scenario::Swim => PlayerControl {
                jump: tick >= 40,
                ..Default::default()
            },
            Scenario::Script => {
                if tick == 0 {
                    updates.push(SettingsUpdate::LuaControl(true));
                    updates.push(SettingsUpdate::ScriptControl(ScriptControlInput {
                        right: true,
                        ..Default::default()
                    }));
                }
                if tick == 100 {
                    updates.push(SettingsUpdate::LuaControl(false));
                }
                forward
            }
        };
        ScenarioFrame { control, updates }
    }
}

pub fn scenario_input_system(
    clock: Res<SimClock>,
    scenario: Res<ActiveScenario>,
    sender: Res<SettingsSender>,
    mut input: ResMut<CurrentInput>,
) {
    let frame = scenario.0.frame(clock.tick);
    input.0 = frame.control;
    for update in frame.updates {
        if sender.0.send(update).is_err() {
            warn!("settings channel closed");
        }
    }
}

pub struct ScenarioPlugin {
    pub scenario: Scenario,
    pub settings: Sender<SettingsUpdate>,
}

impl Plugin for ScenarioPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ActiveScenario(self.scenario))
            .insert_resource(SettingsSender(self.settings.clone()))
            .add_systems(
                FixedUpdate,
                scenario_input_system.before(crate::sim_systems::settings_drain_system),
            );
    }
}

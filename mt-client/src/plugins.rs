use std::sync::Mutex;
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::Fixed;
use tracing::error;

use mt_sim::{
    CurrentInput, LocalPlayer, NodeRegistry, PredictionBuffer, ScriptInput, SimClock, SimReady,
    SimState, VoxelMap,
};
use mt_utils::{
    AppState, ApplicationState, ClientConfig, PerfTimings, PlayerPrivileges, SettingsSnapshot,
    SettingsUpdates, ToNet,
};

use crate::sim_systems;
use crate::timing;

pub struct ClientCorePlugin {
    config: ClientConfig,
    map: VoxelMap,
    nodes: NodeRegistry,
    to_net: Mutex<Option<ToNet>>,
    settings: Mutex<Option<SettingsUpdates>>,
}

impl ClientCorePlugin {
    pub fn new(
        config: ClientConfig,
        map: VoxelMap,
        nodes: NodeRegistry,
        to_net: ToNet,
        settings: SettingsUpdates,
    ) -> Self {
        Self {
            config,
            map,
            nodes,
            to_net: Mutex::new(Some(to_net)),
            settings: Mutex::new(Some(settings)),
        }
    }

    fn spawn_player(&self) -> LocalPlayer {
        let mut player =
            LocalPlayer::new(self.config.spawn()).with_collision_box(self.config.player_box());
        player.step_height = self.config.step_height;
        player.eye_height = self.config.eye_height;
        player.params = self.config.params;
        player.physics_override = self.config.physics;
        player
    }
}

fn take_once<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

impl Plugin for ClientCorePlugin {
    fn build(&self, app: &mut App) {
        match take_once(&self.to_net) {
            Some(to_net) => {
                app.insert_resource(to_net);
            }
            None => error!("ToNet already consumed"),
        }
        match take_once(&self.settings) {
            Some(settings) => {
                app.insert_resource(settings);
            }
            None => error!("settings channel already consumed"),
        }

        app.insert_resource(self.config.clone())
            .insert_resource(AppState(ApplicationState::Loading))
            .insert_resource(SettingsSnapshot(self.config.settings))
            .insert_resource(PlayerPrivileges(self.config.privilege_set()))
            .insert_resource(PerfTimings::default())
            .insert_resource(SimClock::default())
            .insert_resource(CurrentInput::default())
            .insert_resource(ScriptInput::default())
            .insert_resource(SimState {
                player: self.spawn_player(),
                last_report: None,
            })
            .insert_resource(SimReady::default())
            .insert_resource(self.map.clone())
            .insert_resource(self.nodes.clone())
            .insert_resource(sim_systems::PredictionHistory(PredictionBuffer::new(
                self.config.history_len,
            )))
            .insert_resource(sim_systems::MovementPacketState::default())
            .insert_resource(timing::FrameTimingState::default());
    }
}

pub struct ClientSimPlugin {
    pub timestep: Duration,
}

impl Plugin for ClientSimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_duration(self.timestep))
            .add_event::<sim_systems::PlayerMovementEvent>()
            .add_systems(Startup, sim_systems::start_session_system)
            .add_systems(
                FixedUpdate,
                (
                    sim_systems::settings_drain_system,
                    sim_systems::fixed_sim_tick_system,
                    sim_systems::send_player_move_system,
                    sim_systems::log_movement_events_system,
                )
                    .chain(),
            );
    }
}

pub struct ClientTimingPlugin;

#[cfg(feature = "perf_timing")]
impl Plugin for ClientTimingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(First, timing::frame_timing_start)
            .add_systems(Update, timing::update_timing_start)
            .add_systems(PostUpdate, timing::update_timing_end)
            .add_systems(
                FixedUpdate,
                (
                    timing::fixed_update_timing_start.before(sim_systems::settings_drain_system),
                    timing::fixed_update_timing_end.after(sim_systems::log_movement_events_system),
                ),
            )
            .add_systems(Last, timing::frame_timing_end);
    }
}

#[cfg(not(feature = "perf_timing"))]
impl Plugin for ClientTimingPlugin {
    fn build(&self, _app: &mut App) {}
}

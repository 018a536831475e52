use bevy::prelude::*;
use tracing::{debug, info, trace, warn};

use mt_sim::history::replay;
use mt_sim::{
    CurrentInput, LocalPlayer, MovementEvent, NodeRegistry, PredictionBuffer, RecordedTick,
    ScriptInput, SimClock, SimReady, SimState, VoxelMap, WorldView,
};
use mt_utils::{
    AppState, ApplicationState, ClientConfig, PerfTimings, PlayerPrivileges, SettingsSnapshot,
    SettingsUpdate, SettingsUpdates, ToNet, ToNetMessage, control_key_bits,
};

use crate::timing::Stopwatch;

#[derive(Resource, Debug)]
pub struct PredictionHistory(pub PredictionBuffer);

impl Default for PredictionHistory {
    fn default() -> Self {
        Self(PredictionBuffer::new(256))
    }
}

/// Last move message handed to the network thread.
#[derive(Resource, Debug, Default)]
pub struct MovementPacketState {
    pub since_send: f32,
    pub last_sent: Option<ToNetMessage>,
    pub sent: u32,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerMovementEvent {
    pub tick: u32,
    pub event: MovementEvent,
}

pub fn start_session_system(
    mut app_state: ResMut<AppState>,
    mut sim_ready: ResMut<SimReady>,
    sim_state: Res<SimState>,
) {
    app_state.0 = ApplicationState::Running;
    sim_ready.0 = true;
    let player = &sim_state.player;
    info!(position = ?player.position(), "session started");
    debug!(
        speeds = ?player.movement_speeds(),
        accelerations = ?player.movement_accelerations(),
        liquid = ?player.liquid_movement(),
        "movement tables"
    );
}

/// Applies every queued settings edit so the coming tick sees one
/// consistent snapshot.
pub fn settings_drain_system(
    updates: Res<SettingsUpdates>,
    mut snapshot: ResMut<SettingsSnapshot>,
    mut privileges: ResMut<PlayerPrivileges>,
    mut script: ResMut<ScriptInput>,
    mut sim_state: ResMut<SimState>,
) {
    for update in updates.0.try_iter() {
        debug!(?update, "settings update");
        let settings = &mut snapshot.0;
        match update {
            SettingsUpdate::Replace(next) => *settings = next,
            SettingsUpdate::Freecam(on) => settings.freecam = on,
            SettingsUpdate::FreeMove(on) => settings.free_move = on,
            SettingsUpdate::Noclip(on) => settings.noclip = on,
            SettingsUpdate::Autojump(on) => settings.autojump = on,
            SettingsUpdate::LuaControl(on) => settings.lua_control = on,
            SettingsUpdate::GrantPrivilege(name) => {
                privileges.0.insert(name);
            }
            SettingsUpdate::RevokePrivilege(name) => {
                privileges.0.remove(&name);
            }
            SettingsUpdate::PhysicsOverride(patch) => {
                sim_state.player.patch_physics_override(&patch);
            }
            SettingsUpdate::ScriptControl(input) => script.0 = input,
            SettingsUpdate::AddVelocity(velocity) => sim_state.player.add_velocity(velocity),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn fixed_sim_tick_system(
    time: Res<Time>,
    mut sim_clock: ResMut<SimClock>,
    mut sim_state: ResMut<SimState>,
    mut history: ResMut<PredictionHistory>,
    mut timings: ResMut<PerfTimings>,
    mut events: EventWriter<PlayerMovementEvent>,
    input: Res<CurrentInput>,
    script: Res<ScriptInput>,
    snapshot: Res<SettingsSnapshot>,
    privileges: Res<PlayerPrivileges>,
    map: Res<VoxelMap>,
    nodes: Res<NodeRegistry>,
    app_state: Res<AppState>,
    sim_ready: Res<SimReady>,
) {
    let watch = Stopwatch::start();
    if app_state.0 != ApplicationState::Running || !sim_ready.0 {
        return;
    }

    let dtime = time.delta_secs();
    let tick = sim_clock.tick;
    let world = WorldView::new(&*map, &nodes);
    let settings = snapshot.0;
    let previous = sim_state.last_report.as_ref().map(|r| r.stance);

    let player = &mut sim_state.player;
    if script.is_changed() {
        player.set_lua_control(script.0);
    }
    let added_velocity = player.pending_velocity();
    let report = player.step(dtime, &world, input.0, &settings, &*privileges);
    history.0.push(RecordedTick {
        tick,
        dtime,
        direct: input.0,
        script: *player.script_control(),
        settings,
        added_velocity,
        player: player.clone(),
    });

    if previous != Some(report.stance) {
        debug!(tick, stance = ?report.stance, position = ?player.position(), "stance");
    }
    for event in &report.events {
        events.write(PlayerMovementEvent {
            tick,
            event: *event,
        });
    }

    sim_state.last_report = Some(report);
    sim_clock.tick = sim_clock.tick.wrapping_add(1);
    timings.fixed_tick_ms = watch.elapsed_ms();
}

/// Sends the legit position at most once per `send_interval`, and only when
/// something the server sees has changed.
pub fn send_player_move_system(
    time: Res<Time>,
    config: Res<ClientConfig>,
    sim_state: Res<SimState>,
    to_net: Res<ToNet>,
    mut packet: ResMut<MovementPacketState>,
) {
    let Some(report) = sim_state.last_report.as_ref() else {
        return;
    };
    packet.since_send += time.delta_secs();
    if packet.since_send < config.send_interval {
        return;
    }

    let player = &sim_state.player;
    let message = ToNetMessage::PlayerMove {
        position: player.position(),
        velocity: player.velocity(),
        yaw: player.legit_yaw(),
        pitch: player.legit_pitch(),
        keys: control_key_bits(player.control()),
        touching_ground: report.state.touching_ground,
    };
    if packet.last_sent.as_ref() == Some(&message) {
        return;
    }

    packet.since_send = 0.0;
    if to_net.0.send(message.clone()).is_err() {
        warn!("network channel closed, dropping move");
        return;
    }
    packet.last_sent = Some(message);
    packet.sent += 1;
}

pub fn log_movement_events_system(mut events: EventReader<PlayerMovementEvent>) {
    for PlayerMovementEvent { tick, event } in events.read() {
        match event {
            MovementEvent::RegainGround { impact } => {
                debug!(tick, impact, "regained ground");
            }
            MovementEvent::Jump => trace!(tick, "jump"),
        }
    }
}

/// Replays every retained tick from the oldest one and compares the result
/// with the live player.
pub fn verify_history(
    history: &PredictionHistory,
    world: &WorldView,
    privileges: &PlayerPrivileges,
    live: &LocalPlayer,
) -> Option<bool> {
    let latest = history.0.latest_tick()?;
    let span = (history.0.capacity() as u32).saturating_sub(1).min(latest);
    let oldest = latest - span;
    let replayed = replay(&history.0, oldest, latest, world, privileges)?;
    Some(replayed == *live)
}

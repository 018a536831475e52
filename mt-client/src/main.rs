use std::path::PathBuf;
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use clap::Parser;
use crossbeam::channel::{Sender, unbounded};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mt_sim::{NodeRegistry, ScriptControlInput, SimClock, SimState, VoxelMap, WorldView};
use mt_utils::{
    AppState, ApplicationState, ClientConfig, FromClient, PerfTimings, PlayerPrivileges,
    SettingsUpdate, SettingsUpdates, ToNet, ToNetMessage, load_config, save_config,
};

mod plugins;
mod scenario;
mod sim_systems;
mod timing;

use plugins::{ClientCorePlugin, ClientSimPlugin, ClientTimingPlugin};
use scenario::{Scenario, ScenarioPlugin};
use sim_systems::{MovementPacketState, PredictionHistory, verify_history};

#[derive(Parser, Debug)]
#[command(about = "Headless local player movement client")]
struct Args {
    /// TOML client config. Defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fixed ticks to simulate.
    #[arg(long, default_value_t = 200)]
    ticks: u32,
    #[arg(long, value_enum, default_value_t = Scenario::Walk)]
    scenario: Scenario,
    /// Script control table as JSON, e.g. '{"up": true}'.
    #[arg(long)]
    script_control: Option<String>,
    /// Writes the effective config here before running.
    #[arg(long)]
    save_config: Option<PathBuf>,
}

/// Parses a `--script-control` table and queues it for the first tick.
fn queue_script_control(settings: &Sender<SettingsUpdate>, text: &str) -> bool {
    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("ignoring script control: {err}");
            return false;
        }
    };
    let input = ScriptControlInput::from_json(&value);
    if settings.send(SettingsUpdate::ScriptControl(input)).is_err() {
        warn!("settings channel closed, dropping script control");
        return false;
    }
    true
}

fn main() {
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(scenario = ?args.scenario, ticks = args.ticks, "Starting mt-client");

    let config = match &args.config {
        Some(path) => load_config(path).unwrap_or_else(|err| {
            error!("{err}, falling back to defaults");
            ClientConfig::default()
        }),
        None => ClientConfig::default(),
    };
    if let Some(path) = &args.save_config
        && let Err(err) = save_config(path, &config)
    {
        warn!("{err}");
    }

    let (to_net_tx, to_net_rx) = unbounded();
    let (settings_tx, settings_rx) = unbounded();
    let from_client = FromClient(to_net_rx);

    if let Some(text) = &args.script_control {
        queue_script_control(&settings_tx, text);
    }

    let mut nodes = config.registry();
    let map = args.scenario.build_world(&mut nodes);
    let timestep = Duration::from_secs_f32(config.tick_interval);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(timestep))
        .add_plugins(ClientCorePlugin::new(
            config,
            map,
            nodes,
            ToNet(to_net_tx),
            SettingsUpdates(settings_rx),
        ))
        .add_plugins(ClientSimPlugin { timestep })
        .add_plugins(ClientTimingPlugin)
        .add_plugins(ScenarioPlugin {
            scenario: args.scenario,
            settings: settings_tx,
        });
    app.finish();
    app.cleanup();

    // The first frame only primes the clock, so run until the tick count is
    // reached rather than for a fixed number of frames.
    let mut last_logged = 0;
    for _ in 0..args.ticks.saturating_mul(2).saturating_add(2) {
        let tick = app.world().resource::<SimClock>().tick;
        if tick >= args.ticks {
            break;
        }
        if tick >= last_logged + 50 {
            last_logged = tick;
            let player = &app.world().resource::<SimState>().player;
            info!(
                tick,
                position = ?player.position(),
                velocity = ?player.velocity(),
                "progress"
            );
        }
        app.update();
    }

    app.world_mut().resource_mut::<AppState>().0 = ApplicationState::Finished;
    let world = app.world();
    let sim_state = world.resource::<SimState>();
    let view = WorldView::new(world.resource::<VoxelMap>(), world.resource::<NodeRegistry>());
    match verify_history(
        world.resource::<PredictionHistory>(),
        &view,
        world.resource::<PlayerPrivileges>(),
        &sim_state.player,
    ) {
        Some(true) => info!("history replay matches live state"),
        Some(false) => warn!("history replay diverged from live state"),
        None => warn!("history incomplete, replay skipped"),
    }

    if let Some(report) = &sim_state.last_report {
        info!(
            position = ?sim_state.player.position(),
            camera = ?(sim_state.player.visual.position + sim_state.player.eye_offset()),
            stance = ?report.stance,
            "final state"
        );
    }
    let timings = world.resource::<PerfTimings>();
    info!(
        fixed_tick_ms = timings.fixed_tick_ms,
        main_thread_ms = timings.main_thread_ms,
        "timings"
    );

    let sent = world.resource::<MovementPacketState>().sent;
    if world.resource::<ToNet>().0.send(ToNetMessage::Disconnect).is_err() {
        warn!("network channel closed before disconnect");
    }
    let queued = from_client.0.try_iter().collect::<Vec<_>>();
    let moves = queued
        .iter()
        .filter(|m| matches!(m, ToNetMessage::PlayerMove { .. }))
        .count();
    info!(sent, moves, total = queued.len(), "outbound messages");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_control_is_queued_as_parsed() {
        let (tx, rx) = unbounded();
        assert!(queue_script_control(&tx, r#"{"up": true, "jump": 1}"#));
        let Ok(SettingsUpdate::ScriptControl(input)) = rx.try_recv() else {
            panic!("expected a script control update");
        };
        assert!(input.up);
        assert!(!input.jump);

        assert!(!queue_script_control(&tx, "{not json"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_settings_channel_is_reported() {
        let (tx, rx) = unbounded();
        drop(rx);
        assert!(!queue_script_control(&tx, r#"{"up": true}"#));
    }
}

use bevy::prelude::Resource;

pub mod autojump;
pub mod collision;
pub mod config;
pub mod control;
pub mod history;
pub mod kinematics;
pub mod player;
pub mod stance;
pub mod types;
pub mod world;

pub use config::{
    MovementOverrides, MovementParams, MovementSettings, PhysicsOverride, Privileges, TickConfig,
};
pub use control::{ControlSource, EffectiveControl, PlayerControl, ScriptControlInput};
pub use history::{PredictionBuffer, RecordedTick};
pub use player::LocalPlayer;
pub use types::{
    Aabb, CollisionInfo, CollisionOutcome, MovementEvent, PlayerKinematicState, Stance,
    TickReport, VisualState,
};
pub use world::{NodeDef, NodeRegistry, VoxelMap, VoxelQuery, WorldView};

#[derive(Debug, Default, Resource)]
pub struct SimClock {
    pub tick: u32,
}

/// Direct input sampled for the next tick.
#[derive(Debug, Default, Resource)]
pub struct CurrentInput(pub PlayerControl);

/// Control table last handed over by automation scripts.
#[derive(Debug, Default, Resource)]
pub struct ScriptInput(pub ScriptControlInput);

#[derive(Debug, Default, Resource)]
pub struct SimState {
    pub player: LocalPlayer,
    pub last_report: Option<TickReport>,
}

#[derive(Debug, Default, Resource)]
pub struct SimReady(pub bool);

#[cfg(test)]
mod tests;

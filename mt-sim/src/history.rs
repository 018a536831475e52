use bevy::prelude::Vec3;

use crate::config::{MovementSettings, Privileges};
use crate::control::PlayerControl;
use crate::player::LocalPlayer;
use crate::world::WorldView;

/// One recorded tick: the inputs it consumed and the player after it ran.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedTick {
    pub tick: u32,
    pub dtime: f32,
    pub direct: PlayerControl,
    pub script: PlayerControl,
    pub settings: MovementSettings,
    /// Server push consumed by the tick.
    pub added_velocity: Vec3,
    pub player: LocalPlayer,
}

#[derive(Debug)]
pub struct PredictionBuffer {
    capacity: usize,
    frames: Vec<Option<RecordedTick>>,
    latest_tick: Option<u32>,
}

impl PredictionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: vec![None; capacity],
            latest_tick: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest_tick(&self) -> Option<u32> {
        self.latest_tick
    }

    pub fn push(&mut self, frame: RecordedTick) {
        let idx = (frame.tick as usize) % self.capacity;
        self.latest_tick = Some(frame.tick);
        self.frames[idx] = Some(frame);
    }

    pub fn get_by_tick(&self, tick: u32) -> Option<&RecordedTick> {
        let idx = (tick as usize) % self.capacity;
        self.frames[idx].as_ref().filter(|frame| frame.tick == tick)
    }

    pub fn get_by_tick_mut(&mut self, tick: u32) -> Option<&mut RecordedTick> {
        let idx = (tick as usize) % self.capacity;
        self.frames[idx].as_mut().filter(|frame| frame.tick == tick)
    }

    pub fn truncate_older_than(&mut self, tick_min: u32) {
        for slot in &mut self.frames {
            if slot.as_ref().is_some_and(|frame| frame.tick < tick_min) {
                *slot = None;
            }
        }
    }
}

/// Re-runs the recorded inputs of `from_tick + 1 ..= to_tick` starting from
/// the player stored at `from_tick`. `None` when a frame in the range is
/// missing.
pub fn replay(
    buffer: &PredictionBuffer,
    from_tick: u32,
    to_tick: u32,
    world: &WorldView,
    privileges: &dyn Privileges,
) -> Option<LocalPlayer> {
    let mut player = buffer.get_by_tick(from_tick)?.player.clone();
    for tick in from_tick.saturating_add(1)..=to_tick {
        let frame = buffer.get_by_tick(tick)?;
        player.set_script_control(frame.script);
        player.add_velocity(frame.added_velocity);
        player.step(frame.dtime, world, frame.direct, &frame.settings, privileges);
    }
    Some(player)
}

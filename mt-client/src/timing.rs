use std::time::Instant;

use bevy::prelude::*;
use mt_utils::PerfTimings;

/// Wall-clock timer that compiles to nothing without `perf_timing`.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch(Option<Instant>);

impl Stopwatch {
    #[inline]
    pub fn start() -> Self {
        if cfg!(feature = "perf_timing") {
            Self(Some(Instant::now()))
        } else {
            Self(None)
        }
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f32 {
        self.0.map_or(0.0, |t| t.elapsed().as_secs_f32() * 1000.0)
    }
}

#[derive(Resource, Default)]
pub struct FrameTimingState {
    frame: Option<Stopwatch>,
    update: Option<Stopwatch>,
    fixed_update: Option<Stopwatch>,
}

pub fn frame_timing_start(
    time: Res<Time>,
    mut state: ResMut<FrameTimingState>,
    mut timings: ResMut<PerfTimings>,
) {
    state.frame = Some(Stopwatch::start());
    timings.frame_delta_ms = time.delta_secs() * 1000.0;
}

pub fn frame_timing_end(mut state: ResMut<FrameTimingState>, mut timings: ResMut<PerfTimings>) {
    if let Some(watch) = state.frame.take() {
        timings.main_thread_ms = watch.elapsed_ms();
    }
}

pub fn update_timing_start(mut state: ResMut<FrameTimingState>) {
    state.update = Some(Stopwatch::start());
}

pub fn update_timing_end(mut state: ResMut<FrameTimingState>, mut timings: ResMut<PerfTimings>) {
    if let Some(watch) = state.update.take() {
        timings.update_ms = watch.elapsed_ms();
    }
}

pub fn fixed_update_timing_start(mut state: ResMut<FrameTimingState>) {
    state.fixed_update = Some(Stopwatch::start());
}

pub fn fixed_update_timing_end(
    mut state: ResMut<FrameTimingState>,
    mut timings: ResMut<PerfTimings>,
) {
    if let Some(watch) = state.fixed_update.take() {
        timings.fixed_update_ms = watch.elapsed_ms();
    }
}

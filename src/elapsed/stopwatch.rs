use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use super::format_elapsed;
use crate::ticker::FrameLoop;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lap {
    /// 1 for the first lap since the last reset
    pub number: usize,
    pub time: String,
}

/// counts up, one frame at a time
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    frames: FrameLoop,
    /// newest first
    laps: VecDeque<Lap>,
}

impl Stopwatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.accumulated
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    #[must_use]
    pub const fn laps(&self) -> &VecDeque<Lap> {
        &self.laps
    }

    #[must_use]
    pub fn display(&self) -> String {
        format_elapsed(self.accumulated)
    }

    /// angle of a sweeping second hand, 0 at the top
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn second_hand_degrees(&self) -> f32 {
        (self.accumulated.as_millis() % 60_000) as f32 * 360.0 / 60_000.0
    }

    /// carries on from the current value
    pub fn start(&mut self, now: Instant) {
        if !self.is_running() {
            self.frames.request(now);
        }
    }

    /// keeps the value, stops the frame loop
    pub fn pause(&mut self, now: Instant) {
        self.frame(now);
        self.frames.cancel();
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_running() {
            self.pause(now);
        } else {
            self.start(now);
        }
    }

    pub fn reset(&mut self) {
        self.frames.cancel();
        self.accumulated = Duration::ZERO;
        self.laps.clear();
    }

    /// called from the display refresh callback
    pub fn frame(&mut self, now: Instant) {
        if let Some(delta) = self.frames.frame(now) {
            self.accumulated += delta;
        }
    }

    /// records the current time, does nothing until the stopwatch has counted something
    pub fn lap(&mut self) -> Option<&Lap> {
        if self.accumulated.is_zero() {
            return None;
        }
        self.laps.push_front(Lap {
            number: self.laps.len() + 1,
            time: format_elapsed(self.accumulated),
        });
        self.laps.front()
    }
}

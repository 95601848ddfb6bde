use std::time::{Duration, Instant};

use log::{debug, info};

use super::format_remaining;
use crate::ticker::Ticker;

/// quick start durations, in minutes
pub const PRESETS: [u64; 6] = [1, 5, 10, 15, 30, 60];

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Minutes,
    Seconds,
}

/// the custom duration picker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSetup {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TimerSetup {
    #[must_use]
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours: if hours > 23 { 23 } else { hours },
            minutes: if minutes > 59 { 59 } else { minutes },
            seconds: if seconds > 59 { 59 } else { seconds },
        }
    }

    /// moves one field by `delta`, stopping at its bounds instead of wrapping
    pub fn adjust(&mut self, unit: TimeUnit, delta: i16) {
        let (field, max) = match unit {
            TimeUnit::Hours => (&mut self.hours, 23),
            TimeUnit::Minutes => (&mut self.minutes, 59),
            TimeUnit::Seconds => (&mut self.seconds, 59),
        };
        let moved = i16::from(*field).saturating_add(delta).clamp(0, max);
        *field = u8::try_from(moved).unwrap_or_default();
    }

    /// total in seconds
    #[must_use]
    pub fn total(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// picking a duration
    Setup,
    Running,
    Paused,
    /// reached zero, stays here until stopped
    Ringing,
}

/// counts down once a second
#[derive(Debug, Clone)]
pub struct Timer {
    state: TimerState,
    setup: TimerSetup,
    remaining: u64,
    total: u64,
    ticker: Ticker,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: TimerState::Setup,
            setup: TimerSetup::new(0, 5, 0),
            remaining: 0,
            total: 0,
            ticker: Ticker::new(COUNTDOWN_PERIOD),
        }
    }

    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub const fn setup(&self) -> TimerSetup {
        self.setup
    }

    pub fn setup_mut(&mut self) -> &mut TimerSetup {
        &mut self.setup
    }

    /// seconds left
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// fraction left in [0, 1], 0 when nothing was started
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.remaining as f32 / self.total as f32
        }
    }

    /// the remaining time, or the picked duration while setting up
    #[must_use]
    pub fn display(&self) -> String {
        match self.state {
            TimerState::Setup => format_remaining(self.setup.total()),
            _ => format_remaining(self.remaining),
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running)
    }

    /// starts a fresh countdown, a zero duration is ignored
    pub fn start(&mut self, seconds: u64, now: Instant) -> bool {
        if seconds == 0 {
            debug!("ignoring timer with no duration");
            return false;
        }
        info!("timer started for {}", format_remaining(seconds));
        self.total = seconds;
        self.remaining = seconds;
        self.state = TimerState::Running;
        self.ticker.start(now);
        true
    }

    pub fn start_setup(&mut self, now: Instant) -> bool {
        self.start(self.setup.total(), now)
    }

    pub fn start_preset(&mut self, minutes: u64, now: Instant) -> bool {
        self.start(minutes.saturating_mul(60), now)
    }

    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.ticker.cancel();
        self.state = TimerState::Paused;
        true
    }

    /// the next second is counted a full period after `now`
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.state != TimerState::Paused {
            return false;
        }
        self.ticker.start(now);
        self.state = TimerState::Running;
        true
    }

    /// back to setup, returns the state it was in
    pub fn cancel(&mut self) -> TimerState {
        let previous = self.state;
        self.ticker.cancel();
        self.remaining = 0;
        self.total = 0;
        self.state = TimerState::Setup;
        previous
    }

    /// silences a ringing timer, false if it wasn't ringing
    pub fn stop_ringing(&mut self) -> bool {
        self.state == TimerState::Ringing && self.cancel() == TimerState::Ringing
    }

    /// counts elapsed seconds, true exactly once: when the countdown hits zero
    pub fn poll(&mut self, now: Instant) -> bool {
        let ticks = self.ticker.poll(now);
        if ticks == 0 || self.state != TimerState::Running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(u64::from(ticks));
        if self.remaining > 0 {
            return false;
        }
        self.ticker.cancel();
        self.state = TimerState::Ringing;
        info!("timer finished");
        true
    }
}

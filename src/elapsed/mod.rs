//! stopwatch and countdown timer

use std::time::Duration;

mod stopwatch;
mod timer;

pub use stopwatch::{Lap, Stopwatch};
pub use timer::{TimeUnit, Timer, TimerSetup, TimerState, PRESETS};

/// a duration split up for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakdown {
    pub hours: u128,
    pub minutes: u128,
    pub seconds: u128,
    /// hundredths of a second
    pub centis: u128,
}

impl From<Duration> for Breakdown {
    fn from(duration: Duration) -> Self {
        let millis = duration.as_millis();
        Self {
            hours: millis / 3_600_000,
            minutes: millis % 3_600_000 / 60_000,
            seconds: millis % 60_000 / 1000,
            centis: millis % 1000 / 10,
        }
    }
}

/// `MM:SS.CC`, with `HH:` in front once there are hours
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let Breakdown {
        hours,
        minutes,
        seconds,
        centis,
    } = elapsed.into();
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
    } else {
        format!("{minutes:02}:{seconds:02}.{centis:02}")
    }
}

/// `MM:SS`, with `HH:` in front once there are hours
#[must_use]
pub fn format_remaining(seconds: u64) -> String {
    let Breakdown {
        hours,
        minutes,
        seconds,
        ..
    } = Duration::from_secs(seconds).into();
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

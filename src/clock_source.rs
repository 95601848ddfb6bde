use std::{cell::Cell, time::Duration, time::Instant};

use chrono::{Local, NaiveDateTime, TimeDelta};

/// where "now" comes from
/// wall time decides when alarms ring, monotonic time measures everything else
pub trait ClockSource {
    fn wall(&self) -> NaiveDateTime;
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn wall(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// a clock that only moves when told to, both readings move together
#[derive(Debug, Clone)]
pub struct ManualClock {
    wall: Cell<NaiveDateTime>,
    monotonic: Cell<Instant>,
}

impl ManualClock {
    #[must_use]
    pub fn new(wall: NaiveDateTime) -> Self {
        Self {
            wall: Cell::new(wall),
            monotonic: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.monotonic.set(self.monotonic.get() + by);
        let by = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        self.wall.set(self.wall.get() + by);
    }

    /// jumps the wall clock without moving monotonic time, like a user changing the time
    pub fn set_wall(&self, wall: NaiveDateTime) {
        self.wall.set(wall);
    }
}

impl ClockSource for ManualClock {
    fn wall(&self) -> NaiveDateTime {
        self.wall.get()
    }

    fn monotonic(&self) -> Instant {
        self.monotonic.get()
    }
}

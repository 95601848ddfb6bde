//! the three cadences the engine runs on
//!
//! none of these own a thread, the host calls `poll`/`frame` as often as it likes
//! and they report what is due. cancelling is always safe, even twice.

use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Timelike};

/// fixed period ticker on the monotonic clock
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Option<Instant>,
}

impl Ticker {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// (re)starts the ticker, the first tick is one period from `now`
    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    /// how many ticks happened since the last poll
    /// a host that stalled gets all the missed ticks at once
    pub fn poll(&mut self, now: Instant) -> u32 {
        let Some(mut next) = self.next else {
            return 0;
        };
        if self.period.is_zero() {
            return 0;
        }
        let mut ticks = 0;
        while next <= now {
            ticks += 1;
            next += self.period;
        }
        self.next = Some(next);
        ticks
    }
}

/// fires once for every distinct wall clock second it is polled in
#[derive(Debug, Clone, Default)]
pub struct WallTicker {
    last: Option<NaiveDateTime>,
    cancelled: bool,
}

impl WallTicker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: None,
            cancelled: false,
        }
    }

    /// returns the second to act on, or `None` if this second was already seen
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.cancelled {
            return None;
        }
        let second = now.with_nanosecond(0).unwrap_or(now);
        if self.last == Some(second) {
            return None;
        }
        self.last = Some(second);
        Some(second)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        !self.cancelled
    }
}

/// the display refresh callback, measured against the monotonic clock
#[derive(Debug, Clone, Default)]
pub struct FrameLoop {
    last: Option<Instant>,
}

impl FrameLoop {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    pub fn request(&mut self, now: Instant) {
        self.last = Some(now);
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.last.is_some()
    }

    /// time since the previous frame, `None` when nothing requested frames
    pub fn frame(&mut self, now: Instant) -> Option<Duration> {
        let last = self.last.as_mut()?;
        let delta = now.saturating_duration_since(*last);
        *last = now.max(*last);
        Some(delta)
    }

    pub fn cancel(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn ticker_counts_elapsed_periods() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        assert_eq!(ticker.poll(start + Duration::from_secs(5)), 0);

        ticker.start(start);
        assert_eq!(ticker.poll(start + Duration::from_millis(999)), 0);
        assert_eq!(ticker.poll(start + Duration::from_secs(1)), 1);
        assert_eq!(ticker.poll(start + Duration::from_millis(1500)), 0);
        assert_eq!(ticker.poll(start + Duration::from_millis(4200)), 3);
    }

    #[test]
    fn cancelling_twice_is_fine() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1));
        ticker.start(start);
        ticker.cancel();
        ticker.cancel();
        assert!(!ticker.is_running());
        assert_eq!(ticker.poll(start + Duration::from_secs(3)), 0);

        let mut frames = FrameLoop::new();
        frames.cancel();
        frames.request(start);
        frames.cancel();
        frames.cancel();
        assert_eq!(frames.frame(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn wall_ticker_fires_once_per_second() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|date| date.and_hms_milli_opt(5, 0, 0, 10))
            .unwrap();
        let mut ticker = WallTicker::new();
        assert!(ticker.poll(base).is_some());
        assert!(ticker.poll(base + chrono::TimeDelta::milliseconds(500)).is_none());
        let next = ticker.poll(base + chrono::TimeDelta::milliseconds(1000));
        assert_eq!(next.map(|t| t.second()), Some(1));
        ticker.cancel();
        assert!(ticker.poll(base + chrono::TimeDelta::seconds(5)).is_none());
    }

    #[test]
    fn frame_loop_reports_deltas() {
        let start = Instant::now();
        let mut frames = FrameLoop::new();
        frames.request(start);
        assert_eq!(
            frames.frame(start + Duration::from_millis(16)),
            Some(Duration::from_millis(16))
        );
        assert_eq!(
            frames.frame(start + Duration::from_millis(40)),
            Some(Duration::from_millis(24))
        );
    }
}

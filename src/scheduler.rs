use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info};

use crate::{
    alarm::{Alarm, AlarmSet},
    ticker::WallTicker,
};

/// a one off re-ring of a snoozed alarm, never saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snooze {
    pub alarm: Alarm,
    pub due: NaiveDateTime,
}

/// decides, once per wall clock second, whether an alarm should start ringing
///
/// alarms only trigger on second 0 of their minute so a minute can never ring twice.
/// the flip side is that if the host skips that exact second the alarm is missed.
#[derive(Debug, Default)]
pub struct Scheduler {
    ticker: WallTicker,
    snoozed: Option<Snooze>,
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticker: WallTicker::new(),
            snoozed: None,
        }
    }

    /// the alarm that should start ringing now, if any
    ///
    /// while something is ringing matching alarms are dropped, not queued.
    /// a due snooze waits until nothing is ringing.
    pub fn tick(&mut self, now: NaiveDateTime, alarms: &AlarmSet, ringing: bool) -> Option<Alarm> {
        let second = self.ticker.poll(now)?;
        if ringing {
            if let Some(alarm) = alarms.due(second) {
                debug!("alarm {} dropped, another alarm is ringing", alarm.id);
            }
            return None;
        }
        if let Some(alarm) = alarms.due(second) {
            return Some(alarm.clone());
        }
        if self.snoozed.as_ref().is_some_and(|snooze| snooze.due <= now) {
            return self.snoozed.take().map(|snooze| snooze.alarm);
        }
        None
    }

    /// rings `alarm` again after `minutes`, replacing any earlier snooze
    pub fn snooze(&mut self, alarm: Alarm, now: NaiveDateTime, minutes: u32) -> NaiveDateTime {
        let due = now + TimeDelta::minutes(i64::from(minutes));
        info!("alarm {} snoozed until {due}", alarm.id);
        self.snoozed = Some(Snooze { alarm, due });
        due
    }

    #[must_use]
    pub const fn snoozed(&self) -> Option<&Snooze> {
        self.snoozed.as_ref()
    }

    pub fn cancel_snooze(&mut self) -> Option<Snooze> {
        self.snoozed.take()
    }

    /// stops checking, safe to call more than once
    pub fn stop(&mut self) {
        self.ticker.cancel();
        self.snoozed = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::*;
    use crate::{alarm::TimeOfDay, alarm_edit::AlarmBuilder};

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .unwrap()
    }

    fn monday_five() -> AlarmSet {
        let mut alarms = AlarmSet::new();
        alarms.insert(AlarmBuilder::new(5, 0, Some(TimeOfDay::AM)).days([Weekday::Mon]));
        alarms
    }

    #[test]
    fn rings_on_the_right_day_only() {
        let alarms = monday_five();
        assert!(Scheduler::new().tick(at(1, 5, 0, 0), &alarms, false).is_some());
        assert!(Scheduler::new().tick(at(2, 5, 0, 0), &alarms, false).is_none());
    }

    #[test]
    fn one_trigger_per_minute() {
        let alarms = monday_five();
        let mut scheduler = Scheduler::new();
        assert!(scheduler.tick(at(1, 5, 0, 0), &alarms, false).is_some());
        // the same second polled again (a fast host) and the following seconds
        assert!(scheduler.tick(at(1, 5, 0, 0), &alarms, false).is_none());
        for second in 1..60 {
            assert!(scheduler.tick(at(1, 5, 0, second), &alarms, false).is_none());
        }
    }

    #[test]
    fn skipped_trigger_second_is_missed() {
        let alarms = monday_five();
        let mut scheduler = Scheduler::new();
        assert!(scheduler.tick(at(1, 4, 59, 59), &alarms, false).is_none());
        assert!(scheduler.tick(at(1, 5, 0, 1), &alarms, false).is_none());
    }

    #[test]
    fn matches_while_ringing_are_dropped() {
        let mut alarms = monday_five();
        alarms.insert(AlarmBuilder::new(5, 0, Some(TimeOfDay::AM)));
        let mut scheduler = Scheduler::new();
        assert!(scheduler.tick(at(1, 5, 0, 0), &alarms, true).is_none());
        assert!(scheduler.tick(at(1, 5, 0, 1), &alarms, false).is_none());
    }

    #[test]
    fn snooze_fires_once_when_free() {
        let alarms = AlarmSet::new();
        let alarm = AlarmBuilder::new(5, 0, None).build(crate::alarm::AlarmId(1));
        let mut scheduler = Scheduler::new();
        let due = scheduler.snooze(alarm.clone(), at(1, 5, 0, 20), 5);
        assert_eq!(due, at(1, 5, 5, 20));

        assert!(scheduler.tick(at(1, 5, 5, 19), &alarms, false).is_none());
        // busy when it comes due, so it waits
        assert!(scheduler.tick(at(1, 5, 5, 20), &alarms, true).is_none());
        assert_eq!(scheduler.tick(at(1, 5, 5, 21), &alarms, false), Some(alarm));
        assert!(scheduler.snoozed().is_none());
        assert!(scheduler.tick(at(1, 5, 5, 22), &alarms, false).is_none());
    }

    #[test]
    fn stopped_scheduler_is_quiet() {
        let alarms = monday_five();
        let mut scheduler = Scheduler::new();
        scheduler.stop();
        scheduler.stop();
        assert!(scheduler.tick(at(1, 5, 0, 0), &alarms, false).is_none());
    }
}

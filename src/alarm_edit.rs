use std::ops::AddAssign;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::alarm::{Alarm, AlarmId, Effects, Sound, TimeOfDay};

/// a single change to an existing alarm, the id never changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmEdit {
    Time {
        time: String,
        period: Option<TimeOfDay>,
    },
    Label(String),
    Sound(Sound),
    Days(Option<Vec<Weekday>>),
    Active(bool),
    Fade(bool),
    Vibrate(bool),
}

impl AddAssign<AlarmEdit> for Alarm {
    /// used so that when we edit an alarm we don't lose its id
    fn add_assign(&mut self, rhs: AlarmEdit) {
        match rhs {
            AlarmEdit::Time { time, period } => {
                self.time = time;
                self.period = period;
            }
            AlarmEdit::Label(label) => self.label = label,
            AlarmEdit::Sound(sound) => self.sound = sound,
            AlarmEdit::Days(days) => self.days = days,
            AlarmEdit::Active(active) => self.active = active,
            AlarmEdit::Fade(fade) => self.effects.fade = fade,
            AlarmEdit::Vibrate(vibrate) => self.effects.vibrate = vibrate,
        }
    }
}

/// everything needed to make a new alarm, minus the id which the alarm set hands out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmBuilder {
    label: String,
    hour: u8,
    minute: u8,
    time_of_day: Option<TimeOfDay>,
    sound: Sound,
    days: Option<Vec<Weekday>>,
    effects: Effects,
}

impl AlarmBuilder {
    /// hours are clamped to 0..=12 with a period (0 and 12 are the same) or 0..=23 without
    #[must_use]
    pub fn new(hour: u8, minute: u8, time_of_day: Option<TimeOfDay>) -> Self {
        let max_hour = if time_of_day.is_some() { 12 } else { 23 };
        Self {
            label: String::new(),
            hour: hour.min(max_hour),
            minute: minute.min(59),
            time_of_day,
            sound: Sound::default(),
            days: None,
            effects: Effects::default(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn sound(mut self, sound: Sound) -> Self {
        self.sound = sound;
        self
    }

    #[must_use]
    pub fn days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<_> = days.into_iter().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        self.days = Some(days);
        self
    }

    #[must_use]
    pub const fn fade(mut self, fade: bool) -> Self {
        self.effects.fade = fade;
        self
    }

    #[must_use]
    pub const fn vibrate(mut self, vibrate: bool) -> Self {
        self.effects.vibrate = vibrate;
        self
    }

    /// the time string the alarm will store
    #[must_use]
    pub fn time_string(&self) -> String {
        let hour = match self.time_of_day {
            // 0 with a period shows up as 12
            Some(_) if self.hour == 0 => 12,
            _ => self.hour,
        };
        format!("{hour}:{:02}", self.minute)
    }

    #[must_use]
    pub fn build(self, id: AlarmId) -> Alarm {
        Alarm {
            id,
            time: self.time_string(),
            period: self.time_of_day,
            active: true,
            days: self.days,
            label: self.label,
            sound: self.sound,
            effects: self.effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_formats_and_clamps() {
        let alarm = AlarmBuilder::new(0, 75, Some(TimeOfDay::AM)).build(AlarmId(3));
        assert_eq!(alarm.time, "12:59");
        assert_eq!(alarm.minute_of_day(), Some(59));

        let alarm = AlarmBuilder::new(30, 5, None).build(AlarmId(4));
        assert_eq!(alarm.time, "23:05");
        assert!(alarm.active);
    }

    #[test]
    fn days_are_sorted_and_deduplicated() {
        let alarm = AlarmBuilder::new(6, 30, None)
            .days([Weekday::Fri, Weekday::Mon, Weekday::Fri])
            .build(AlarmId(1));
        assert_eq!(alarm.days, Some(vec![Weekday::Mon, Weekday::Fri]));
    }

    #[test]
    fn edits_keep_the_id() {
        let mut alarm = AlarmBuilder::new(6, 0, Some(TimeOfDay::AM)).build(AlarmId(9));
        alarm += AlarmEdit::Time {
            time: "7:15".to_string(),
            period: Some(TimeOfDay::PM),
        };
        alarm += AlarmEdit::Fade(true);
        alarm += AlarmEdit::Label("gym".to_string());
        assert_eq!(alarm.id, AlarmId(9));
        assert_eq!(alarm.minute_of_day(), Some(19 * 60 + 15));
        assert!(alarm.effects.fade);
        assert_eq!(alarm.label, "gym");
    }
}

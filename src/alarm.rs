use std::{fmt, sync::Arc};

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::{alarm_edit::AlarmBuilder, audio::tone, error::ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub u64);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeOfDay {
    #[default]
    #[serde(rename = "am")]
    AM,
    #[serde(rename = "pm")]
    PM,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Effects {
    /// ramp the volume up instead of starting at full volume
    #[serde(default)]
    pub fade: bool,
    /// only passed through to whoever renders the alarm
    #[serde(default)]
    pub vibrate: bool,
}

/// what an alarm plays
/// either one of the built in procedural tones (by name) or a user supplied clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sound {
    Tone {
        name: String,
    },
    Custom {
        name: String,
        #[serde(with = "blob")]
        data: Arc<[u8]>,
    },
}

impl Default for Sound {
    fn default() -> Self {
        Self::tone(tone::DEFAULT_TONE)
    }
}

impl Sound {
    #[must_use]
    pub fn tone(name: impl Into<String>) -> Self {
        Self::Tone { name: name.into() }
    }

    #[must_use]
    pub fn custom(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::Custom {
            name: name.into(),
            data: data.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Tone { name } | Self::Custom { name, .. } => name,
        }
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tone { name } => write!(f, "{name}"),
            Self::Custom { name, data } => write!(f, "{name} (custom, {} bytes)", data.len()),
        }
    }
}

// custom clips live inside the config file so they are stored as base64 text
mod blob {
    use std::sync::Arc;

    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(&**data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(text.trim())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    /// "5:00" with a period, or "17:30" without one
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<TimeOfDay>,
    #[serde(default = "always_true")]
    pub active: bool,
    /// `None` is the older days-less format which rings every day
    /// an empty list is valid and just never rings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<Weekday>>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sound: Sound,
    #[serde(default)]
    pub effects: Effects,
}

impl Alarm {
    /// the alarm time as minutes since midnight, `None` if the time can't be parsed
    #[must_use]
    pub fn minute_of_day(&self) -> Option<u16> {
        parse_minute_of_day(&self.time, self.period)
    }

    #[must_use]
    pub fn recurs_on(&self, day: Weekday) -> bool {
        self.days.as_ref().map_or(true, |days| days.contains(&day))
    }

    /// true only on second 0 of the alarm's minute, on one of its days
    #[must_use]
    pub fn fires_at(&self, now: NaiveDateTime) -> bool {
        self.active
            && now.second() == 0
            && self.minute_of_day() == Some(minute_of(now))
            && self.recurs_on(now.weekday())
    }

    /// how long until this alarm next rings, `None` if it never will
    #[must_use]
    pub fn time_until_next(&self, now: NaiveDateTime) -> Option<TimeDelta> {
        if !self.active {
            return None;
        }
        let minute = self.minute_of_day()?;
        let at = NaiveTime::from_hms_opt(u32::from(minute / 60), u32::from(minute % 60), 0)?;
        // a week and a day covers "same weekday, but the time already passed today"
        (0..=7)
            .filter_map(|offset| now.date().checked_add_days(Days::new(offset)))
            .map(|date| date.and_time(at))
            .find(|candidate| *candidate > now && self.recurs_on(candidate.weekday()))
            .map(|next| next - now)
    }
}

#[must_use]
pub fn minute_of(now: NaiveDateTime) -> u16 {
    // hour < 24 and minute < 60 so this always fits
    u16::try_from(now.hour() * 60 + now.minute()).unwrap_or_default()
}

/// normalizes "h:mm" (with a period) or "HH:mm" (24 hour) into minutes since midnight
#[must_use]
pub fn parse_minute_of_day(time: &str, period: Option<TimeOfDay>) -> Option<u16> {
    let (hour, minute) = time.trim().split_once(':')?;
    let hour: u16 = hour.trim().parse().ok()?;
    let minute: u16 = minute.trim().parse().ok()?;
    if minute > 59 {
        return None;
    }
    let hour = match period {
        // 12 am is midnight, 12 pm is noon
        Some(TimeOfDay::AM) if hour <= 12 => hour % 12,
        Some(TimeOfDay::PM) if hour <= 12 => hour % 12 + 12,
        None if hour <= 23 => hour,
        _ => return None,
    };
    Some(hour * 60 + minute)
}

/// the alarm list, kept in insertion order which is also the order alarms get checked in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Alarm>", into = "Vec<Alarm>")]
pub struct AlarmSet {
    alarms: Vec<Alarm>,
}

impl From<Vec<Alarm>> for AlarmSet {
    fn from(value: Vec<Alarm>) -> Self {
        let mut set = Self::new();
        // a hand edited config could repeat an id, first one wins
        for alarm in value {
            if set.get(alarm.id).is_none() {
                set.alarms.push(alarm);
            }
        }
        set
    }
}

impl From<AlarmSet> for Vec<Alarm> {
    fn from(value: AlarmSet) -> Self {
        value.alarms
    }
}

impl AlarmSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { alarms: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    fn get_mut(&mut self, id: AlarmId) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|alarm| alarm.id == id)
    }

    /// one past the highest id, or the lowest free one once the highest is `u64::MAX`
    fn next_id(&self) -> AlarmId {
        match self.alarms.iter().map(|alarm| alarm.id.0).max() {
            None => AlarmId(1),
            Some(highest) => highest.checked_add(1).map_or_else(
                || {
                    (1..=u64::MAX)
                        .find(|id| self.get(AlarmId(*id)).is_none())
                        .map_or(AlarmId(1), AlarmId)
                },
                AlarmId,
            ),
        }
    }

    pub fn insert(&mut self, builder: AlarmBuilder) -> AlarmId {
        let id = self.next_id();
        self.alarms.push(builder.build(id));
        id
    }

    pub fn remove(&mut self, id: AlarmId) -> Option<Alarm> {
        let index = self.alarms.iter().position(|alarm| alarm.id == id)?;
        Some(self.alarms.remove(index))
    }

    /// # Errors
    /// if there is no alarm with that id
    pub fn update(&mut self, id: AlarmId, edit: crate::alarm_edit::AlarmEdit) -> Result<(), ConfigError> {
        let alarm = self.get_mut(id).ok_or(ConfigError::UnknownAlarm(id))?;
        *alarm += edit;
        Ok(())
    }

    /// flips the active flag, returns the new value
    pub fn toggle(&mut self, id: AlarmId) -> Option<bool> {
        let alarm = self.get_mut(id)?;
        alarm.active = !alarm.active;
        Some(alarm.active)
    }

    /// first alarm (in list order) that should start ringing at `now`
    #[must_use]
    pub fn due(&self, now: NaiveDateTime) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.fires_at(now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        // 2024-01-01 was a monday
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .unwrap()
    }

    fn alarm(time: &str, period: Option<TimeOfDay>, days: Option<Vec<Weekday>>) -> Alarm {
        Alarm {
            id: AlarmId(1),
            time: time.to_string(),
            period,
            active: true,
            days,
            label: String::new(),
            sound: Sound::default(),
            effects: Effects::default(),
        }
    }

    #[test]
    fn twelve_hour_times_normalize() {
        assert_eq!(parse_minute_of_day("5:00", Some(TimeOfDay::AM)), Some(300));
        assert_eq!(parse_minute_of_day("12:00", Some(TimeOfDay::AM)), Some(0));
        assert_eq!(parse_minute_of_day("12:30", Some(TimeOfDay::PM)), Some(750));
        assert_eq!(parse_minute_of_day("10:15", Some(TimeOfDay::PM)), Some(1335));
        assert_eq!(parse_minute_of_day("05:00", Some(TimeOfDay::AM)), Some(300));
    }

    #[test]
    fn twenty_four_hour_times_normalize() {
        assert_eq!(parse_minute_of_day("17:30", None), Some(1050));
        assert_eq!(parse_minute_of_day("0:00", None), Some(0));
        assert_eq!(parse_minute_of_day("23:59", None), Some(1439));
    }

    #[test]
    fn malformed_times_never_match() {
        for bad in ["", "5", "five:00", "5:60", "24:00", "5:00:00", ":"] {
            assert_eq!(parse_minute_of_day(bad, None), None, "{bad}");
        }
        assert_eq!(parse_minute_of_day("13:00", Some(TimeOfDay::PM)), None);

        let broken = alarm("nope", None, None);
        assert!(!broken.fires_at(at(1, 0, 0, 0)));
        assert_eq!(broken.time_until_next(at(1, 0, 0, 0)), None);
    }

    #[test]
    fn fires_only_on_second_zero_of_a_listed_day() {
        let monday_five = alarm("5:00", Some(TimeOfDay::AM), Some(vec![Weekday::Mon]));
        assert!(monday_five.fires_at(at(1, 5, 0, 0)));
        assert!(!monday_five.fires_at(at(1, 5, 0, 1)));
        assert!(!monday_five.fires_at(at(2, 5, 0, 0)));
    }

    #[test]
    fn empty_days_is_valid_but_never_fires() {
        let never = alarm("5:00", Some(TimeOfDay::AM), Some(vec![]));
        assert!((1..=7).all(|day| !never.fires_at(at(day, 5, 0, 0))));
        assert_eq!(never.time_until_next(at(1, 4, 0, 0)), None);
    }

    #[test]
    fn days_less_alarms_fire_every_day() {
        let daily = alarm("17:30", None, None);
        assert!((1..=7).all(|day| daily.fires_at(at(day, 17, 30, 0))));
    }

    #[test]
    fn inactive_alarms_never_fire() {
        let mut off = alarm("5:00", Some(TimeOfDay::AM), None);
        off.active = false;
        assert!(!off.fires_at(at(1, 5, 0, 0)));
        assert_eq!(off.time_until_next(at(1, 4, 0, 0)), None);
    }

    #[test]
    fn time_until_next_wraps_to_the_next_listed_day() {
        let monday_five = alarm("5:00", Some(TimeOfDay::AM), Some(vec![Weekday::Mon]));
        assert_eq!(monday_five.time_until_next(at(1, 4, 30, 0)), Some(TimeDelta::minutes(30)));
        // exactly at the trigger means the next one is a week away
        assert_eq!(monday_five.time_until_next(at(1, 5, 0, 0)), Some(TimeDelta::days(7)));
        assert_eq!(
            monday_five.time_until_next(at(2, 5, 0, 0)),
            Some(TimeDelta::days(6))
        );
    }

    #[test]
    fn due_picks_the_first_match_in_list_order() {
        let mut set = AlarmSet::new();
        let first = set.insert(AlarmBuilder::new(5, 0, Some(TimeOfDay::AM)).label("first"));
        set.insert(AlarmBuilder::new(5, 0, Some(TimeOfDay::AM)).label("second"));
        assert_eq!(set.due(at(1, 5, 0, 0)).map(|alarm| alarm.id), Some(first));
    }

    #[test]
    fn ids_stay_unique_after_removal() {
        let mut set = AlarmSet::new();
        let a = set.insert(AlarmBuilder::new(1, 0, None));
        let b = set.insert(AlarmBuilder::new(2, 0, None));
        assert!(set.remove(a).is_some());
        let c = set.insert(AlarmBuilder::new(3, 0, None));
        assert_ne!(b, c);
        assert_eq!(set.len(), 2);
        assert!(set.remove(a).is_none());
    }

    #[test]
    fn toggle_and_unknown_ids() {
        let mut set = AlarmSet::new();
        let id = set.insert(AlarmBuilder::new(7, 0, None));
        assert_eq!(set.toggle(id), Some(false));
        assert_eq!(set.toggle(id), Some(true));
        assert_eq!(set.toggle(AlarmId(99)), None);
        assert!(matches!(
            set.update(AlarmId(99), crate::alarm_edit::AlarmEdit::Active(false)),
            Err(ConfigError::UnknownAlarm(AlarmId(99)))
        ));
    }

    #[test]
    fn ids_past_the_largest_reuse_a_free_one() {
        let mut last = alarm("5:00", None, None);
        last.id = AlarmId(u64::MAX);
        let mut set = AlarmSet::from(vec![alarm("4:00", None, None), last]);
        let id = set.insert(AlarmBuilder::new(6, 0, None));
        assert_eq!(id, AlarmId(2));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn duplicate_ids_from_disk_keep_the_first() {
        let mut second = alarm("6:00", None, None);
        second.label = "dupe".to_string();
        let set = AlarmSet::from(vec![alarm("5:00", None, None), second]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().map(|alarm| alarm.time.as_str()), Some("5:00"));
    }
}

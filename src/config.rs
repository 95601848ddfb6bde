use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use chrono::Weekday;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    alarm::{AlarmSet, Sound, TimeOfDay},
    alarm_edit::AlarmBuilder,
    audio::{ALARM_CROSSFADE, PREVIEW_CROSSFADE, STOP_FADE},
    error::ConfigError,
    ringing::FadePolicy,
};

const ALL_WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingingSettings {
    pub fade_floor: f32,
    pub fade_step: f32,
    pub fade_interval_secs: f32,
    pub snooze_minutes: u32,
}

impl Default for RingingSettings {
    fn default() -> Self {
        let policy = FadePolicy::default();
        Self {
            fade_floor: policy.floor,
            fade_step: policy.step,
            fade_interval_secs: policy.interval.as_secs_f32(),
            snooze_minutes: 5,
        }
    }
}

/// durations are in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub alarm_fade: f32,
    pub preview_fade: f32,
    pub preview_volume: f32,
    pub stop_fade: f32,
    /// clicks and ticks when using the timer
    pub ui_sounds: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            alarm_fade: ALARM_CROSSFADE.as_secs_f32(),
            preview_fade: PREVIEW_CROSSFADE.as_secs_f32(),
            preview_volume: 0.5,
            stop_fade: STOP_FADE.as_secs_f32(),
            ui_sounds: true,
        }
    }
}

impl AudioSettings {
    #[must_use]
    pub fn alarm_fade(&self) -> Duration {
        seconds(self.alarm_fade, ALARM_CROSSFADE)
    }

    #[must_use]
    pub fn preview_fade(&self) -> Duration {
        seconds(self.preview_fade, PREVIEW_CROSSFADE)
    }

    #[must_use]
    pub fn stop_fade(&self) -> Duration {
        seconds(self.stop_fade, STOP_FADE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub sound: Sound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default)]
    pub alarms: AlarmSet,
    #[serde(default)]
    pub ringing: RingingSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub timer: TimerSettings,
}

fn default_time_format() -> String {
    "%l:%M %p".to_string()
}

/// negative or garbage durations from a hand edited file fall back to the default
fn seconds(value: f32, fallback: Duration) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(fallback)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
            alarms: seed_alarms(),
            ringing: RingingSettings::default(),
            audio: AudioSettings::default(),
            timer: TimerSettings::default(),
        }
    }
}

/// what a fresh install starts with
#[must_use]
pub fn seed_alarms() -> AlarmSet {
    let mut alarms = AlarmSet::new();
    for (hour, minute, period, active) in [
        (5, 0, TimeOfDay::AM, true),
        (6, 0, TimeOfDay::AM, false),
        (8, 30, TimeOfDay::AM, true),
        (10, 15, TimeOfDay::PM, false),
    ] {
        let id = alarms.insert(AlarmBuilder::new(hour, minute, Some(period)).days(ALL_WEEK));
        if !active {
            alarms.toggle(id);
        }
    }
    alarms
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fade_policy(&self) -> FadePolicy {
        let default = FadePolicy::default();
        FadePolicy {
            floor: self.ringing.fade_floor.clamp(0.0, 1.0),
            step: if self.ringing.fade_step > 0.0 {
                self.ringing.fade_step
            } else {
                default.step
            },
            interval: seconds(self.ringing.fade_interval_secs, default.interval),
        }
    }

    /// # Errors
    /// if there is no home directory to put the config in
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = directories::ProjectDirs::from("", "", "lumina_clock")
            .ok_or(ConfigError::NoProjectDir)?
            .config_dir()
            .to_path_buf();
        path.push("config.toml");
        Ok(path)
    }
}

/// where the config lives between runs
pub trait Store {
    /// `None` when nothing has been saved yet
    ///
    /// # Errors
    /// if something was saved but can't be read back
    fn load(&self) -> Result<Option<Config>, ConfigError>;

    /// # Errors
    /// if the config couldn't be written
    fn save(&mut self, config: &Config) -> Result<(), ConfigError>;
}

/// a toml file on disk
#[derive(Debug, Clone)]
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// the file in the usual per user config directory
    ///
    /// # Errors
    /// if there is no home directory
    pub fn user() -> Result<Self, ConfigError> {
        Config::config_path().map(Self::new)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }
}

impl Store for TomlStore {
    fn load(&self) -> Result<Option<Config>, ConfigError> {
        if !self.is_present() {
            debug!("no config at {}", self.path.display());
            return Ok(None);
        }
        let config = fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&config)?))
    }

    fn save(&mut self, config: &Config) -> Result<(), ConfigError> {
        let text = toml::to_string(config)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, text)?;
        info!("saved config to {}", self.path.display());
        Ok(())
    }
}

/// keeps the config in memory, clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Rc<RefCell<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    config: Option<Config>,
    saves: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(config: Config) -> Self {
        let store = Self::new();
        store.slot.borrow_mut().config = Some(config);
        store
    }

    /// the last saved (or initial) config
    #[must_use]
    pub fn current(&self) -> Option<Config> {
        self.slot.borrow().config.clone()
    }

    #[must_use]
    pub fn saves(&self) -> usize {
        self.slot.borrow().saves
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Option<Config>, ConfigError> {
        Ok(self.current())
    }

    fn save(&mut self, config: &Config) -> Result<(), ConfigError> {
        let mut slot = self.slot.borrow_mut();
        slot.config = Some(config.clone());
        slot.saves += 1;
        Ok(())
    }
}

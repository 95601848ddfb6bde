#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::time::Instant;

use alarm::{Alarm, AlarmId, AlarmSet, Sound};
use alarm_edit::{AlarmBuilder, AlarmEdit};
use audio::{tone::Cue, AudioBackend, AudioEngine, AudioState, LayerName};
use chrono::{NaiveDateTime, TimeDelta};
use config::{Config, Store};
use elapsed::{Lap, Stopwatch, Timer, TimerSetup, TimerState};
use error::ConfigError;
use log::{info, warn};
use ringing::{RingingMachine, RingingSession, RingingState};
use scheduler::{Scheduler, Snooze};

pub mod alarm;
/// alarm creation and editing
pub mod alarm_edit;
pub mod audio;
pub mod clock_source;
pub mod communication;
pub mod config;
pub mod elapsed;
pub mod error;
pub mod ringing;
pub mod scheduler;
pub mod ticker;

/// what happened during one [`Clock::pump`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pumped {
    /// the alarm that started ringing
    pub rang: Option<AlarmId>,
    pub timer_finished: bool,
}

/// the whole engine: alarms, ringing, sound, stopwatch and timer
///
/// nothing runs on its own, the host calls [`Clock::pump`] as often as it redraws
/// (or at least once a second) and reads the state back out afterwards.
pub struct Clock<B: AudioBackend, S: Store> {
    config: Config,
    store: S,
    audio: AudioEngine<B>,
    scheduler: Scheduler,
    ringing: RingingMachine,
    stopwatch: Stopwatch,
    timer: Timer,
}

impl<B: AudioBackend, S: Store> Clock<B, S> {
    /// loads the saved config, or starts from the default alarms if there is none
    ///
    /// # Errors
    /// if a saved config exists but can't be read
    pub fn load(store: S, audio: AudioEngine<B>) -> Result<Self, ConfigError> {
        let config = match store.load()? {
            Some(config) => config,
            None => {
                info!("no saved config, starting with the default alarms");
                Config::default()
            }
        };
        Ok(Self::with_config(config, store, audio))
    }

    #[must_use]
    pub fn with_config(config: Config, store: S, audio: AudioEngine<B>) -> Self {
        let ringing = RingingMachine::new(
            config.fade_policy(),
            config.audio.alarm_fade(),
            config.audio.stop_fade(),
        );
        Self {
            config,
            store,
            audio,
            scheduler: Scheduler::new(),
            ringing,
            stopwatch: Stopwatch::new(),
            timer: Timer::new(),
        }
    }

    /// advances everything to `wall`/`now`
    pub fn pump(&mut self, wall: NaiveDateTime, now: Instant) -> Pumped {
        let mut pumped = Pumped::default();
        self.audio.update(now);

        if let Some(alarm) = self
            .scheduler
            .tick(wall, &self.config.alarms, self.ringing.is_ringing())
        {
            let id = alarm.id;
            if self.ringing.ring(alarm, &mut self.audio, wall, now) {
                pumped.rang = Some(id);
            }
        }

        self.ringing.poll_fade(&mut self.audio, now);

        if self.timer.poll(now) {
            pumped.timer_finished = true;
            // an alarm already owns the alarm layer
            if !self.ringing.is_ringing() {
                self.audio.play(
                    LayerName::Alarm,
                    &self.config.timer.sound,
                    1.0,
                    self.config.audio.alarm_fade(),
                    now,
                );
            }
        }

        self.stopwatch.frame(now);
        pumped
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.config) {
            warn!("couldn't save alarms: {e}");
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn alarms(&self) -> &AlarmSet {
        &self.config.alarms
    }

    pub fn add_alarm(&mut self, builder: AlarmBuilder) -> AlarmId {
        let id = self.config.alarms.insert(builder);
        info!("added alarm {id}");
        if let Some(alarm) = self.config.alarms.get(id) {
            self.audio.preload(&alarm.sound);
        }
        self.persist();
        id
    }

    /// removing the alarm that is ringing also silences it
    pub fn remove_alarm(&mut self, id: AlarmId, now: Instant) -> Option<Alarm> {
        let removed = self.config.alarms.remove(id)?;
        info!("removed alarm {id}");
        if self.ringing().is_some_and(|session| session.alarm().id == id) {
            self.ringing.dismiss(&mut self.audio, now);
        }
        if self.scheduler.snoozed().is_some_and(|snooze| snooze.alarm.id == id) {
            self.scheduler.cancel_snooze();
        }
        self.persist();
        Some(removed)
    }

    /// # Errors
    /// if there is no alarm with that id
    pub fn update_alarm(&mut self, id: AlarmId, edit: AlarmEdit) -> Result<(), ConfigError> {
        if let AlarmEdit::Sound(sound) = &edit {
            self.audio.preload(sound);
        }
        self.config.alarms.update(id, edit)?;
        self.persist();
        Ok(())
    }

    /// flips an alarm on or off, returns the new state
    pub fn toggle_alarm(&mut self, id: AlarmId) -> Option<bool> {
        let active = self.config.alarms.toggle(id)?;
        info!("alarm {id} {}", if active { "on" } else { "off" });
        self.persist();
        Some(active)
    }

    /// every alarm with how long until it next rings
    pub fn upcoming(&self, now: NaiveDateTime) -> impl Iterator<Item = (&Alarm, Option<TimeDelta>)> {
        self.config
            .alarms
            .iter()
            .map(move |alarm| (alarm, alarm.time_until_next(now)))
    }

    /// the alarm that will ring soonest
    #[must_use]
    pub fn next_alarm(&self, now: NaiveDateTime) -> Option<(&Alarm, TimeDelta)> {
        self.upcoming(now)
            .filter_map(|(alarm, until)| until.map(|until| (alarm, until)))
            .min_by_key(|(_, until)| *until)
    }

    #[must_use]
    pub const fn ringing(&self) -> Option<&RingingSession> {
        self.ringing.session()
    }

    #[must_use]
    pub fn ringing_state(&self) -> RingingState {
        self.ringing.state()
    }

    /// fade completeness of the ringing alarm, for the visual ramp
    #[must_use]
    pub fn fade_progress(&self) -> Option<f32> {
        self.ringing().map(RingingSession::progress)
    }

    /// the volume the ringing alarm is heading for
    #[must_use]
    pub fn ringing_volume(&self) -> Option<f32> {
        self.ringing.target_volume()
    }

    /// fine to call when nothing is ringing
    pub fn dismiss(&mut self, now: Instant) -> Option<RingingSession> {
        self.ringing.dismiss(&mut self.audio, now)
    }

    /// dismisses the ringing alarm and rings it again after the configured snooze
    pub fn snooze(&mut self, wall: NaiveDateTime, now: Instant) -> Option<NaiveDateTime> {
        let session = self.ringing.dismiss(&mut self.audio, now)?;
        Some(self.scheduler.snooze(
            session.alarm().clone(),
            wall,
            self.config.ringing.snooze_minutes,
        ))
    }

    #[must_use]
    pub const fn snoozed(&self) -> Option<&Snooze> {
        self.scheduler.snoozed()
    }

    #[must_use]
    pub const fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn start_stopwatch(&mut self, now: Instant) {
        self.stopwatch.start(now);
    }

    pub fn pause_stopwatch(&mut self, now: Instant) {
        self.stopwatch.pause(now);
    }

    pub fn toggle_stopwatch(&mut self, now: Instant) {
        self.stopwatch.toggle(now);
    }

    pub fn reset_stopwatch(&mut self) {
        self.stopwatch.reset();
    }

    pub fn lap(&mut self) -> Option<Lap> {
        self.stopwatch.lap().cloned()
    }

    #[must_use]
    pub const fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_setup_mut(&mut self) -> &mut TimerSetup {
        self.timer.setup_mut()
    }

    fn cue(&mut self, cue: Cue) {
        if self.config.audio.ui_sounds {
            self.audio.cue(cue);
        }
    }

    /// starts the duration picked in the setup, a ringing timer is silenced first
    pub fn start_timer(&mut self, now: Instant) -> bool {
        let was_ringing = self.timer.state() == TimerState::Ringing;
        let started = self.timer.start_setup(now);
        self.timer_started(started, was_ringing, now)
    }

    pub fn start_timer_preset(&mut self, minutes: u64, now: Instant) -> bool {
        let was_ringing = self.timer.state() == TimerState::Ringing;
        let started = self.timer.start_preset(minutes, now);
        self.timer_started(started, was_ringing, now)
    }

    fn timer_started(&mut self, started: bool, was_ringing: bool, now: Instant) -> bool {
        if started {
            if was_ringing {
                self.silence_timer(now);
            }
            self.cue(Cue::Tick);
        }
        started
    }

    pub fn pause_timer(&mut self) -> bool {
        let paused = self.timer.pause();
        if paused {
            self.cue(Cue::Click);
        }
        paused
    }

    pub fn resume_timer(&mut self, now: Instant) -> bool {
        let resumed = self.timer.resume(now);
        if resumed {
            self.cue(Cue::Tick);
        }
        resumed
    }

    /// start, pause or resume, whichever the timer is ready for
    pub fn toggle_timer(&mut self, now: Instant) -> bool {
        match self.timer.state() {
            TimerState::Setup => self.start_timer(now),
            TimerState::Running => self.pause_timer(),
            TimerState::Paused => self.resume_timer(now),
            TimerState::Ringing => self.stop_timer(now),
        }
    }

    /// back to the setup, silences the timer if it was ringing
    pub fn cancel_timer(&mut self, now: Instant) {
        if self.timer.cancel() == TimerState::Ringing {
            self.silence_timer(now);
        }
        self.cue(Cue::Click);
    }

    /// silences a ringing timer
    pub fn stop_timer(&mut self, now: Instant) -> bool {
        let stopped = self.timer.stop_ringing();
        if stopped {
            self.silence_timer(now);
            self.cue(Cue::Click);
        }
        stopped
    }

    fn silence_timer(&mut self, now: Instant) {
        // the sound on the alarm layer belongs to a ringing alarm now
        if !self.ringing.is_ringing() {
            self.audio
                .stop(LayerName::Alarm, self.config.audio.stop_fade(), now);
        }
    }

    /// plays `sound` on the preview layer, replacing any earlier preview
    pub fn preview(&mut self, sound: &Sound, now: Instant) {
        self.audio.play(
            LayerName::Preview,
            sound,
            self.config.audio.preview_volume,
            self.config.audio.preview_fade(),
            now,
        );
    }

    pub fn stop_preview(&mut self, now: Instant) {
        self.audio
            .stop(LayerName::Preview, self.config.audio.preview_fade(), now);
    }

    #[must_use]
    pub const fn audio_state(&self) -> AudioState {
        self.audio.state()
    }

    #[must_use]
    pub const fn audio(&self) -> &AudioEngine<B> {
        &self.audio
    }

    /// stops checking alarms and fades everything out, the clock can be dropped afterwards
    pub fn shutdown(&mut self, now: Instant) {
        self.scheduler.stop();
        self.ringing.dismiss(&mut self.audio, now);
        self.timer.cancel();
        self.stopwatch.pause(now);
        self.audio.stop_all(self.config.audio.stop_fade(), now);
    }
}

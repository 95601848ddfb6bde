use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::{
    alarm::Alarm,
    audio::{AudioBackend, AudioEngine, LayerName},
    ticker::Ticker,
};

/// how a fading alarm ramps up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadePolicy {
    /// never start quieter than this
    pub floor: f32,
    /// progress added every interval
    pub step: f32,
    pub interval: Duration,
}

impl Default for FadePolicy {
    fn default() -> Self {
        Self {
            floor: 0.1,
            step: 0.05,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingingState {
    Idle,
    /// full volume from the start
    Ringing,
    /// volume ramping up from the floor
    Fading,
}

/// an alarm that is currently going off
#[derive(Debug, Clone, PartialEq)]
pub struct RingingSession {
    alarm: Alarm,
    progress: f32,
    steps: u32,
    started: NaiveDateTime,
}

impl RingingSession {
    /// copy of the alarm as it was when it started ringing
    #[must_use]
    pub const fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    /// fade completeness in [0, 1], always 1 for alarms that don't fade
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    #[must_use]
    pub const fn started(&self) -> NaiveDateTime {
        self.started
    }
}

#[derive(Debug)]
pub struct RingingMachine {
    session: Option<RingingSession>,
    policy: FadePolicy,
    fade: Ticker,
    crossfade: Duration,
    stop_fade: Duration,
}

impl RingingMachine {
    /// `crossfade` is how long the alarm sound takes to come in, `stop_fade` how long it takes to go
    #[must_use]
    pub const fn new(policy: FadePolicy, crossfade: Duration, stop_fade: Duration) -> Self {
        Self {
            session: None,
            policy,
            fade: Ticker::new(policy.interval),
            crossfade,
            stop_fade,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> FadePolicy {
        self.policy
    }

    #[must_use]
    pub const fn session(&self) -> Option<&RingingSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn is_ringing(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn state(&self) -> RingingState {
        match &self.session {
            None => RingingState::Idle,
            Some(session) if session.alarm.effects.fade => RingingState::Fading,
            Some(_) => RingingState::Ringing,
        }
    }

    /// the volume the alarm layer is being driven to
    #[must_use]
    pub fn target_volume(&self) -> Option<f32> {
        self.session
            .as_ref()
            .map(|session| self.policy.floor.max(session.progress).min(1.0))
    }

    /// starts ringing `alarm`, returns false (and does nothing) if something is already ringing
    pub fn ring<B: AudioBackend>(
        &mut self,
        alarm: Alarm,
        audio: &mut AudioEngine<B>,
        wall: NaiveDateTime,
        now: Instant,
    ) -> bool {
        if let Some(session) = &self.session {
            debug!(
                "alarm {} suppressed, alarm {} is still ringing",
                alarm.id, session.alarm.id
            );
            return false;
        }
        info!("alarm {} ({}) ringing", alarm.id, alarm.label);
        let fade = alarm.effects.fade;
        self.session = Some(RingingSession {
            alarm,
            progress: if fade { 0.0 } else { 1.0 },
            steps: 0,
            started: wall,
        });
        if fade {
            self.fade.start(now);
        }
        self.push_volume(audio, now);
        true
    }

    /// runs the fade ticker, call as often as you like
    pub fn poll_fade<B: AudioBackend>(&mut self, audio: &mut AudioEngine<B>, now: Instant) {
        for _ in 0..self.fade.poll(now) {
            self.step_fade(audio, now);
        }
    }

    /// one fade step, once progress reaches 1 further steps change nothing
    pub fn step_fade<B: AudioBackend>(&mut self, audio: &mut AudioEngine<B>, now: Instant) {
        let Some(session) = &mut self.session else {
            return;
        };
        if !session.alarm.effects.fade {
            return;
        }
        if session.progress < 1.0 {
            // steps * step, not a running sum
            session.steps += 1;
            #[allow(clippy::cast_precision_loss)]
            let progress = session.steps as f32 * self.policy.step;
            session.progress = progress.clamp(0.0, 1.0);
        }
        self.push_volume(audio, now);
    }

    fn push_volume<B: AudioBackend>(&self, audio: &mut AudioEngine<B>, now: Instant) {
        if let (Some(session), Some(volume)) = (&self.session, self.target_volume()) {
            // same sound on the alarm layer is only a volume change
            audio.play(LayerName::Alarm, &session.alarm.sound, volume, self.crossfade, now);
        }
    }

    /// silences and forgets the ringing alarm, fine to call when nothing is ringing
    pub fn dismiss<B: AudioBackend>(
        &mut self,
        audio: &mut AudioEngine<B>,
        now: Instant,
    ) -> Option<RingingSession> {
        self.fade.cancel();
        let session = self.session.take()?;
        info!("alarm {} dismissed", session.alarm.id);
        audio.stop(LayerName::Alarm, self.stop_fade, now);
        Some(session)
    }
}

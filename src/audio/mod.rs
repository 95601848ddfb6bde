//! layered playback
//!
//! there are two layers, one for a ringing alarm/timer and one for previewing sounds.
//! each layer owns at most one live source plus the sources it is still fading out.
//! a new `play` fades the old source out and the new one in at the same time, the old
//! one is released once its fade (plus a small margin) is over, see [`AudioEngine::update`].
//!
//! if the audio device can't be opened every operation quietly does nothing, the rest
//! of the clock keeps working without sound.

use std::{
    collections::{hash_map::DefaultHasher, HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::{alarm::Sound, error::AudioError};

pub mod mock;
mod rodio_backend;
pub mod tone;

pub use rodio_backend::{RodioBackend, RodioVoice};
use tone::{Cue, Tone, DEFAULT_TONE};

/// gain never goes fully to zero so exponential ramps have somewhere to go
pub const SILENCE: f32 = 0.001;
pub const ALARM_CROSSFADE: Duration = Duration::from_millis(1500);
pub const PREVIEW_CROSSFADE: Duration = Duration::from_millis(500);
pub const STOP_FADE: Duration = Duration::from_millis(1000);
/// extra time a faded out source is kept before being released
pub const RELEASE_MARGIN: Duration = Duration::from_millis(100);
/// time constant used when only the volume of a playing source changes
pub const RETARGET_TIME_CONSTANT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerName {
    Alarm,
    Preview,
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alarm => "alarm",
            Self::Preview => "preview",
        })
    }
}

/// how a gain moves to a new target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// straight line, reaching the target after the duration
    Linear(Duration),
    /// exponential approach with the given time constant
    Approach(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub channels: u16,
    pub sample_rate: u32,
    /// interleaved
    pub samples: Arc<[f32]>,
}

/// a sound that is ready to be handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedSound {
    Tone(Tone),
    /// looped forever
    Clip(Arc<DecodedClip>),
}

/// the device side of the engine
///
/// a voice is one playing source together with its own gain, it is never shared
pub trait AudioBackend {
    type Voice;

    /// starts playing `sound` right away at `gain`
    ///
    /// # Errors
    /// if the device refuses a new source
    fn start(&mut self, sound: &PreparedSound, gain: f32) -> Result<Self::Voice, AudioError>;

    fn ramp(&mut self, voice: &Self::Voice, target: f32, ramp: Ramp);

    /// stops the voice and frees whatever it holds
    fn release(&mut self, voice: Self::Voice);

    /// # Errors
    /// if the payload isn't audio we understand
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedClip, AudioError>;

    /// fire and forget ui sound, not part of any layer
    ///
    /// # Errors
    /// if the device refuses a new source
    fn cue(&mut self, cue: Cue) -> Result<(), AudioError>;
}

type Init<B> = Box<dyn FnOnce() -> Result<B, AudioError>>;

enum Backend<B> {
    Pending(Init<B>),
    Ready(B),
    Unavailable,
}

impl<B> Backend<B> {
    /// opens the device on first use
    fn get(&mut self) -> Option<&mut B> {
        if matches!(self, Self::Pending(_)) {
            if let Self::Pending(init) = std::mem::replace(self, Self::Unavailable) {
                match init() {
                    Ok(backend) => {
                        info!("audio output ready");
                        *self = Self::Ready(backend);
                    }
                    Err(e) => warn!("audio unavailable, alarms will ring silently: {e}"),
                }
            }
        }
        match self {
            Self::Ready(backend) => Some(backend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// nothing has been played yet so the device hasn't been opened
    Uninitialized,
    Ready,
    Unavailable,
}

struct ActiveSource<V> {
    name: String,
    voice: V,
}

struct Releasing<V> {
    voice: V,
    due: Instant,
}

struct Layer<V> {
    active: Option<ActiveSource<V>>,
    releasing: Vec<Releasing<V>>,
}

impl<V> Layer<V> {
    const fn new() -> Self {
        Self {
            active: None,
            releasing: Vec::new(),
        }
    }

    /// fades the active source out and queues it for release
    fn retire<B: AudioBackend<Voice = V>>(&mut self, backend: &mut B, ramp: Ramp, due: Instant) {
        if let Some(old) = self.active.take() {
            backend.ramp(&old.voice, SILENCE, ramp);
            self.releasing.push(Releasing {
                voice: old.voice,
                due,
            });
        }
    }

    fn release_due<B: AudioBackend<Voice = V>>(&mut self, backend: &mut B, now: Instant) {
        if self.releasing.is_empty() {
            return;
        }
        let (done, pending) = self
            .releasing
            .drain(..)
            .partition::<Vec<_>, _>(|releasing| releasing.due <= now);
        self.releasing = pending;
        for releasing in done {
            backend.release(releasing.voice);
        }
    }

    fn release_all<B: AudioBackend<Voice = V>>(&mut self, backend: &mut B) {
        for releasing in self.releasing.drain(..) {
            backend.release(releasing.voice);
        }
        if let Some(active) = self.active.take() {
            backend.release(active.voice);
        }
    }

    fn live(&self) -> usize {
        self.releasing.len() + usize::from(self.active.is_some())
    }
}

pub struct AudioEngine<B: AudioBackend> {
    backend: Backend<B>,
    alarm: Layer<B::Voice>,
    preview: Layer<B::Voice>,
    clips: ClipCache,
}

impl<B: AudioBackend> fmt::Debug for AudioEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state())
            .field("alarm", &self.active_sound(LayerName::Alarm))
            .field("preview", &self.active_sound(LayerName::Preview))
            .field("cached_clips", &self.clips.decoded.len())
            .finish()
    }
}

impl<B: AudioBackend> AudioEngine<B> {
    /// `init` runs the first time anything is played
    #[must_use]
    pub fn new(init: impl FnOnce() -> Result<B, AudioError> + 'static) -> Self {
        Self::from_backend(Backend::Pending(Box::new(init)))
    }

    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        Self::from_backend(Backend::Ready(backend))
    }

    /// an engine without any output, every call is a no-op
    #[must_use]
    pub fn disabled() -> Self {
        Self::from_backend(Backend::Unavailable)
    }

    fn from_backend(backend: Backend<B>) -> Self {
        Self {
            backend,
            alarm: Layer::new(),
            preview: Layer::new(),
            clips: ClipCache::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> AudioState {
        match self.backend {
            Backend::Pending(_) => AudioState::Uninitialized,
            Backend::Ready(_) => AudioState::Ready,
            Backend::Unavailable => AudioState::Unavailable,
        }
    }

    const fn layer(&self, layer: LayerName) -> &Layer<B::Voice> {
        match layer {
            LayerName::Alarm => &self.alarm,
            LayerName::Preview => &self.preview,
        }
    }

    /// name of the sound the layer is currently playing
    #[must_use]
    pub fn active_sound(&self, layer: LayerName) -> Option<&str> {
        self.layer(layer)
            .active
            .as_ref()
            .map(|active| active.name.as_str())
    }

    /// the active source plus the ones still fading out
    #[must_use]
    pub fn live_sources(&self, layer: LayerName) -> usize {
        self.layer(layer).live()
    }

    /// plays `sound` on `layer`, crossfading from whatever was playing there over `fade`
    ///
    /// on the alarm layer asking for the sound that is already playing only moves its
    /// volume, the ringing fade re-asserts the sound every step and restarting would stutter.
    /// the preview layer always restarts.
    pub fn play(
        &mut self,
        layer: LayerName,
        sound: &Sound,
        volume: f32,
        fade: Duration,
        now: Instant,
    ) {
        let volume = volume.clamp(SILENCE, 1.0);
        let Some(backend) = self.backend.get() else {
            return;
        };
        let slot = match layer {
            LayerName::Alarm => &mut self.alarm,
            LayerName::Preview => &mut self.preview,
        };

        if layer == LayerName::Alarm {
            if let Some(active) = slot.active.as_ref().filter(|a| a.name == sound.name()) {
                backend.ramp(&active.voice, volume, Ramp::Approach(RETARGET_TIME_CONSTANT));
                return;
            }
        }

        if let Some(old) = &slot.active {
            debug!("{layer} layer: fading out {} over {fade:?}", old.name);
        }
        slot.retire(backend, Ramp::Approach(fade / 3), now + fade + RELEASE_MARGIN);

        let name = sound.name().to_string();
        let prepared = self.clips.prepare(backend, sound);
        match backend.start(&prepared, SILENCE) {
            Ok(voice) => {
                debug!("{layer} layer: fading in {name} to {volume} over {fade:?}");
                backend.ramp(&voice, volume, Ramp::Linear(fade));
                slot.active = Some(ActiveSource { name, voice });
            }
            Err(e) => warn!("couldn't start {name} on the {layer} layer: {e}"),
        }
    }

    /// decodes a custom sound ahead of time so ringing it later doesn't have to
    ///
    /// opens the device if it isn't yet, tones need no preparing
    pub fn preload(&mut self, sound: &Sound) {
        if !matches!(sound, Sound::Custom { .. }) {
            return;
        }
        if let Some(backend) = self.backend.get() {
            self.clips.prepare(backend, sound);
        }
    }

    /// smoothly moves the volume of whatever is playing on `layer`
    pub fn set_volume(&mut self, layer: LayerName, volume: f32) {
        let Some(backend) = self.backend.get() else {
            return;
        };
        let slot = match layer {
            LayerName::Alarm => &self.alarm,
            LayerName::Preview => &self.preview,
        };
        if let Some(active) = &slot.active {
            backend.ramp(
                &active.voice,
                volume.clamp(SILENCE, 1.0),
                Ramp::Approach(RETARGET_TIME_CONSTANT),
            );
        }
    }

    /// fades `layer` out, the layer is free for a new `play` straight away
    pub fn stop(&mut self, layer: LayerName, fade: Duration, now: Instant) {
        let Some(backend) = self.backend.get() else {
            return;
        };
        let slot = match layer {
            LayerName::Alarm => &mut self.alarm,
            LayerName::Preview => &mut self.preview,
        };
        if let Some(active) = &slot.active {
            debug!("{layer} layer: stopping {} over {fade:?}", active.name);
        }
        slot.retire(backend, Ramp::Linear(fade), now + fade + RELEASE_MARGIN);
    }

    pub fn stop_all(&mut self, fade: Duration, now: Instant) {
        self.stop(LayerName::Alarm, fade, now);
        self.stop(LayerName::Preview, fade, now);
    }

    /// releases sources whose fade out is over
    pub fn update(&mut self, now: Instant) {
        if let Backend::Ready(backend) = &mut self.backend {
            self.alarm.release_due(backend, now);
            self.preview.release_due(backend, now);
        }
    }

    pub fn cue(&mut self, cue: Cue) {
        if let Some(backend) = self.backend.get() {
            if let Err(e) = backend.cue(cue) {
                debug!("couldn't play {cue:?} cue: {e}");
            }
        }
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        if let Backend::Ready(backend) = &mut self.backend {
            self.alarm.release_all(backend);
            self.preview.release_all(backend);
        }
    }
}

fn payload_key(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

/// decoded custom sounds keyed by a hash of their bytes, plus the ones that wouldn't decode
#[derive(Default)]
struct ClipCache {
    decoded: HashMap<u64, Arc<DecodedClip>>,
    failed: HashSet<u64>,
}

impl ClipCache {
    /// turns a sound into something playable, a clip that fails to decode plays the default tone
    ///
    /// each payload is decoded at most once, failures included
    fn prepare<B: AudioBackend>(&mut self, backend: &mut B, sound: &Sound) -> PreparedSound {
        match sound {
            Sound::Tone { name } => PreparedSound::Tone(Tone::lookup(name)),
            Sound::Custom { name, data } => {
                let key = payload_key(data);
                if let Some(clip) = self.decoded.get(&key) {
                    debug!("using cached clip for {name}");
                    return PreparedSound::Clip(Arc::clone(clip));
                }
                if self.failed.contains(&key) {
                    return PreparedSound::Tone(Tone::default());
                }
                match backend.decode(data) {
                    Ok(clip) => {
                        let clip = Arc::new(clip);
                        self.decoded.insert(key, Arc::clone(&clip));
                        PreparedSound::Clip(clip)
                    }
                    Err(e) => {
                        warn!("couldn't decode {name}, playing {DEFAULT_TONE} instead: {e}");
                        self.failed.insert(key);
                        PreparedSound::Tone(Tone::default())
                    }
                }
            }
        }
    }
}

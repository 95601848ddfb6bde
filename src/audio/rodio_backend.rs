use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use super::{
    tone::{Cue, Oscillator, Sweep, SAMPLE_RATE},
    AudioBackend, DecodedClip, PreparedSound, Ramp,
};
use crate::error::AudioError;

const HOLD: u8 = 0;
const LINEAR: u8 = 1;
const APPROACH: u8 = 2;

/// gain commands going from the engine to the audio thread
/// `generation` is bumped last so the reader sees a complete command
#[derive(Debug)]
struct SharedGain {
    target: AtomicU32,
    shape: AtomicU8,
    micros: AtomicU64,
    generation: AtomicU32,
}

impl SharedGain {
    fn new(gain: f32) -> Self {
        Self {
            target: AtomicU32::new(gain.to_bits()),
            shape: AtomicU8::new(HOLD),
            micros: AtomicU64::new(0),
            generation: AtomicU32::new(0),
        }
    }

    fn set(&self, target: f32, ramp: Ramp) {
        let (shape, over) = match ramp {
            Ramp::Linear(over) => (LINEAR, over),
            Ramp::Approach(time_constant) => (APPROACH, time_constant),
        };
        self.target.store(target.to_bits(), Ordering::Relaxed);
        self.shape.store(shape, Ordering::Relaxed);
        self.micros.store(
            u64::try_from(over.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        self.generation.fetch_add(1, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Hold,
    Linear { step: f32, remaining: u64 },
    Approach { coefficient: f32 },
}

/// applies a [`SharedGain`] to a source, moving sample by sample so changes never click
struct GainRamp<S> {
    inner: S,
    shared: Arc<SharedGain>,
    seen: u32,
    current: f32,
    target: f32,
    motion: Motion,
}

impl<S: Source> GainRamp<S> {
    fn new(inner: S, shared: Arc<SharedGain>) -> Self {
        let current = f32::from_bits(shared.target.load(Ordering::Relaxed));
        Self {
            inner,
            shared,
            seen: 0,
            current,
            target: current,
            motion: Motion::Hold,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn refresh(&mut self) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if generation == self.seen {
            return;
        }
        self.seen = generation;
        self.target = f32::from_bits(self.shared.target.load(Ordering::Relaxed));
        let seconds = self.shared.micros.load(Ordering::Relaxed) as f32 / 1_000_000.0;
        let samples_per_second = self.inner.sample_rate() as f32 * f32::from(self.inner.channels());
        let samples = (seconds * samples_per_second).max(1.0);
        self.motion = match self.shared.shape.load(Ordering::Relaxed) {
            LINEAR => Motion::Linear {
                step: (self.target - self.current) / samples,
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                remaining: samples as u64,
            },
            APPROACH => Motion::Approach {
                coefficient: 1.0 - (-1.0 / samples).exp(),
            },
            _ => {
                self.current = self.target;
                Motion::Hold
            }
        };
    }

    fn advance(&mut self) {
        match self.motion {
            Motion::Hold => {}
            Motion::Linear { step, remaining } if remaining > 1 => {
                self.current += step;
                self.motion = Motion::Linear {
                    step,
                    remaining: remaining - 1,
                };
            }
            Motion::Linear { .. } => {
                self.current = self.target;
                self.motion = Motion::Hold;
            }
            Motion::Approach { coefficient } => {
                self.current += (self.target - self.current) * coefficient;
            }
        }
    }
}

impl<S: Source> Iterator for GainRamp<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;
        self.refresh();
        self.advance();
        Some(sample * self.current)
    }
}

impl<S: Source> Source for GainRamp<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// a decoded clip played on repeat without copying its samples
struct LoopedClip {
    clip: Arc<DecodedClip>,
    position: usize,
}

impl Iterator for LoopedClip {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = *self.clip.samples.get(self.position)?;
        self.position = (self.position + 1) % self.clip.samples.len();
        Some(sample)
    }
}

impl Source for LoopedClip {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.clip.channels
    }

    fn sample_rate(&self) -> u32 {
        self.clip.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// plays through the default output device
pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    /// # Errors
    /// if there is no usable output device (or we aren't allowed to use it)
    pub fn open() -> Result<Self, AudioError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AudioError::Unavailable(e.to_string()))?;
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

/// one sink per voice so every voice has its own gain
pub struct RodioVoice {
    sink: Sink,
    gain: Arc<SharedGain>,
}

impl AudioBackend for RodioBackend {
    type Voice = RodioVoice;

    fn start(&mut self, sound: &PreparedSound, gain: f32) -> Result<RodioVoice, AudioError> {
        let shared = Arc::new(SharedGain::new(gain));
        let sink = Sink::connect_new(self.stream.mixer());
        match sound {
            PreparedSound::Tone(tone) => sink.append(GainRamp::new(
                Oscillator::new(*tone, SAMPLE_RATE),
                Arc::clone(&shared),
            )),
            PreparedSound::Clip(clip) => sink.append(GainRamp::new(
                LoopedClip {
                    clip: Arc::clone(clip),
                    position: 0,
                },
                Arc::clone(&shared),
            )),
        }
        sink.play();
        Ok(RodioVoice { sink, gain: shared })
    }

    fn ramp(&mut self, voice: &RodioVoice, target: f32, ramp: Ramp) {
        voice.gain.set(target, ramp);
    }

    fn release(&mut self, voice: RodioVoice) {
        voice.sink.stop();
    }

    // decodes the whole clip on the calling thread, the engine only asks once per payload
    // and `AudioEngine::preload` lets a host do it when a sound is picked instead of when it rings
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedClip, AudioError> {
        let decoder = Decoder::new(Cursor::new(payload.to_vec()))
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Arc<[f32]> = decoder.collect();
        if samples.is_empty() {
            return Err(AudioError::EmptyClip);
        }
        Ok(DecodedClip {
            channels,
            sample_rate,
            samples,
        })
    }

    fn cue(&mut self, cue: Cue) -> Result<(), AudioError> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(Sweep::new(cue.shape(), SAMPLE_RATE));
        // keeps playing after the handle is gone and ends on its own
        sink.detach();
        Ok(())
    }
}

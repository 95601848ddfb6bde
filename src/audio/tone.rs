//! procedural sounds: the named alarm tones and the short ui cues

use std::{f32::consts::TAU, time::Duration};

use rodio::Source;

pub const CLASSIC_BELL: &str = "Classic Bell";
pub const ZEN_GARDEN: &str = "Zen Garden";
pub const SUMMER_RAIN: &str = "Summer Rain";
pub const DIGITAL_PULSE: &str = "Digital Pulse";
pub const DEFAULT_TONE: &str = CLASSIC_BELL;

pub const SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
}

impl Waveform {
    /// value at `phase` in [0, 1), always within [-1, 1]
    #[must_use]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Self::Sine => (phase * TAU).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Triangle => 4.0f32.mul_add(-(phase - 0.5).abs(), 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub waveform: Waveform,
    pub frequency: f32,
}

const TONES: [(&str, Tone); 4] = [
    (
        CLASSIC_BELL,
        Tone {
            waveform: Waveform::Triangle,
            frequency: 320.0,
        },
    ),
    (
        ZEN_GARDEN,
        Tone {
            waveform: Waveform::Sine,
            frequency: 180.0,
        },
    ),
    (
        SUMMER_RAIN,
        Tone {
            waveform: Waveform::Triangle,
            frequency: 120.0,
        },
    ),
    (
        DIGITAL_PULSE,
        Tone {
            waveform: Waveform::Square,
            frequency: 440.0,
        },
    ),
];

impl Default for Tone {
    fn default() -> Self {
        TONES[0].1
    }
}

impl Tone {
    /// the timbre for a tone name, unknown names get the default bell
    #[must_use]
    pub fn lookup(name: &str) -> Self {
        TONES
            .iter()
            .find(|(tone_name, _)| *tone_name == name)
            .map_or_else(Self::default, |(_, tone)| *tone)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        TONES.iter().map(|(name, _)| *name)
    }
}

/// endless mono oscillator for a [`Tone`]
#[derive(Debug, Clone)]
pub struct Oscillator {
    tone: Tone,
    sample_rate: u32,
    phase: f32,
}

impl Oscillator {
    #[must_use]
    pub const fn new(tone: Tone, sample_rate: u32) -> Self {
        Self {
            tone,
            sample_rate,
            phase: 0.0,
        }
    }
}

impl Iterator for Oscillator {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let value = self.tone.waveform.sample(self.phase);
        #[allow(clippy::cast_precision_loss)]
        let step = self.tone.frequency / self.sample_rate as f32;
        self.phase = (self.phase + step).fract();
        Some(value)
    }
}

impl Source for Oscillator {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// short feedback sounds for button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Click,
    Tick,
}

/// a one shot tone whose pitch and gain both glide exponentially
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueShape {
    pub waveform: Waveform,
    pub start_frequency: f32,
    pub end_frequency: f32,
    pub start_gain: f32,
    pub end_gain: f32,
    pub duration: Duration,
}

impl Cue {
    #[must_use]
    pub const fn shape(self) -> CueShape {
        match self {
            Self::Click => CueShape {
                waveform: Waveform::Sine,
                start_frequency: 800.0,
                end_frequency: 100.0,
                start_gain: 0.08,
                end_gain: 0.001,
                duration: Duration::from_millis(100),
            },
            Self::Tick => CueShape {
                waveform: Waveform::Square,
                start_frequency: 1200.0,
                end_frequency: 1200.0,
                start_gain: 0.015,
                end_gain: 0.001,
                duration: Duration::from_millis(50),
            },
        }
    }
}

/// plays a [`CueShape`] once and ends
#[derive(Debug, Clone)]
pub struct Sweep {
    shape: CueShape,
    sample_rate: u32,
    index: u64,
    total: u64,
    phase: f32,
}

impl Sweep {
    #[must_use]
    pub fn new(shape: CueShape, sample_rate: u32) -> Self {
        let total = shape.duration.as_micros() * u128::from(sample_rate) / 1_000_000;
        Self {
            shape,
            sample_rate,
            index: 0,
            total: u64::try_from(total).unwrap_or(u64::MAX),
            phase: 0.0,
        }
    }
}

/// exponential interpolation, `from` and `to` must be positive
fn glide(from: f32, to: f32, t: f32) -> f32 {
    from * (to / from).powf(t)
}

impl Iterator for Sweep {
    type Item = f32;

    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<f32> {
        if self.index >= self.total {
            return None;
        }
        let t = self.index as f32 / self.total as f32;
        let shape = &self.shape;
        let value = shape.waveform.sample(self.phase) * glide(shape.start_gain, shape.end_gain, t);
        let frequency = glide(shape.start_frequency, shape.end_frequency, t);
        self.phase = (self.phase + frequency / self.sample_rate as f32).fract();
        self.index += 1;
        Some(value)
    }
}

impl Source for Sweep {
    fn current_span_len(&self) -> Option<usize> {
        usize::try_from(self.total - self.index).ok()
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.shape.duration)
    }
}

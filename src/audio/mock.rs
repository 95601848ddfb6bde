//! a backend that plays nothing and writes down what it was asked to do
//!
//! clones share their state so a test can keep one and hand the other to an [`AudioEngine`](super::AudioEngine)

use std::{cell::RefCell, collections::BTreeMap, rc::Rc, sync::Arc};

use super::{tone::Cue, AudioBackend, DecodedClip, PreparedSound, Ramp};
use crate::error::AudioError;

#[derive(Debug, PartialEq, Eq)]
pub struct MockVoice(u32);

#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Start {
        voice: u32,
        sound: PreparedSound,
        gain: f32,
    },
    Ramp {
        voice: u32,
        target: f32,
        ramp: Ramp,
    },
    Release {
        voice: u32,
    },
    Decode {
        bytes: usize,
    },
    Cue(Cue),
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<MockEvent>,
    /// live voice -> last gain it was asked for
    live: BTreeMap<u32, f32>,
    next_voice: u32,
    fail_decode: bool,
    fail_start: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_decoding(&self, fail: bool) {
        self.state.borrow_mut().fail_decode = fail;
    }

    pub fn fail_starting(&self, fail: bool) {
        self.state.borrow_mut().fail_start = fail;
    }

    #[must_use]
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.borrow().events.clone()
    }

    #[must_use]
    pub fn live_voices(&self) -> usize {
        self.state.borrow().live.len()
    }

    #[must_use]
    pub fn live_ids(&self) -> Vec<u32> {
        self.state.borrow().live.keys().copied().collect()
    }

    /// the gain the newest live voice was last ramped to
    #[must_use]
    pub fn current_gain(&self) -> Option<f32> {
        self.state.borrow().live.values().next_back().copied()
    }

    #[must_use]
    pub fn started(&self) -> usize {
        self.count(|event| matches!(event, MockEvent::Start { .. }))
    }

    #[must_use]
    pub fn decodes(&self) -> usize {
        self.count(|event| matches!(event, MockEvent::Decode { .. }))
    }

    #[must_use]
    pub fn cues(&self) -> Vec<Cue> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Cue(cue) => Some(*cue),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn last_started(&self) -> Option<PreparedSound> {
        self.state
            .borrow()
            .events
            .iter()
            .rev()
            .find_map(|event| match event {
                MockEvent::Start { sound, .. } => Some(sound.clone()),
                _ => None,
            })
    }

    #[must_use]
    pub fn last_ramp(&self, voice: u32) -> Option<(f32, Ramp)> {
        self.state
            .borrow()
            .events
            .iter()
            .rev()
            .find_map(|event| match event {
                MockEvent::Ramp {
                    voice: ramped,
                    target,
                    ramp,
                } if *ramped == voice => Some((*target, *ramp)),
                _ => None,
            })
    }

    fn count(&self, filter: impl Fn(&MockEvent) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| filter(e)).count()
    }
}

impl AudioBackend for MockBackend {
    type Voice = MockVoice;

    fn start(&mut self, sound: &PreparedSound, gain: f32) -> Result<MockVoice, AudioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_start {
            return Err(AudioError::Unavailable("mock refused".to_string()));
        }
        state.next_voice += 1;
        let voice = state.next_voice;
        state.live.insert(voice, gain);
        state.events.push(MockEvent::Start {
            voice,
            sound: sound.clone(),
            gain,
        });
        Ok(MockVoice(voice))
    }

    fn ramp(&mut self, voice: &MockVoice, target: f32, ramp: Ramp) {
        let mut state = self.state.borrow_mut();
        if let Some(gain) = state.live.get_mut(&voice.0) {
            *gain = target;
        }
        state.events.push(MockEvent::Ramp {
            voice: voice.0,
            target,
            ramp,
        });
    }

    fn release(&mut self, voice: MockVoice) {
        let mut state = self.state.borrow_mut();
        state.live.remove(&voice.0);
        state.events.push(MockEvent::Release { voice: voice.0 });
    }

    fn decode(&mut self, payload: &[u8]) -> Result<DecodedClip, AudioError> {
        let mut state = self.state.borrow_mut();
        state.events.push(MockEvent::Decode {
            bytes: payload.len(),
        });
        if state.fail_decode {
            return Err(AudioError::Decode("mock can't decode".to_string()));
        }
        if payload.is_empty() {
            return Err(AudioError::EmptyClip);
        }
        // one "sample" per byte is plenty for tests
        let samples: Arc<[f32]> = payload.iter().map(|byte| f32::from(*byte) / 255.0).collect();
        Ok(DecodedClip {
            channels: 1,
            sample_rate: 8_000,
            samples,
        })
    }

    fn cue(&mut self, cue: Cue) -> Result<(), AudioError> {
        self.state.borrow_mut().events.push(MockEvent::Cue(cue));
        Ok(())
    }
}

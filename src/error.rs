use std::io;

use thiserror::Error;

use crate::alarm::AlarmId;

/// failures inside the audio subsystem
/// these never leave [`crate::audio::AudioEngine`], they get logged and turned into fallbacks
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("couldn't open audio output: {0}")]
    Unavailable(String),
    #[error("couldn't decode audio payload: {0}")]
    Decode(String),
    #[error("decoded audio payload has no samples")]
    EmptyClip,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't find a home directory for the config file")]
    NoProjectDir,
    #[error("couldn't access config file: {0}")]
    Io(#[from] io::Error),
    #[error("couldn't parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no alarm with id {0}")]
    UnknownAlarm(AlarmId),
}

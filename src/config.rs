// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Synthesizer configuration.
//!
//! Every field is optional. Values come from a YAML file, then `WAVESYNTH_`
//! environment variables (`WAVESYNTH_MASTER_VOLUME`, `WAVESYNTH_RENDER__SILENCE_TIMEOUT`).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

mod error;
mod playback;
mod render;

pub use error::ConfigError;
pub use playback::Playback;
pub use render::Render;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BUFFER_SIZE: usize = 512;
const DEFAULT_MAX_VOICES: usize = 128;
const DEFAULT_MAX_VOICES_PER_CHANNEL: usize = 32;
const DEFAULT_MASTER_VOLUME: f32 = 0.3;
const DEFAULT_MESSAGE_CAPACITY: usize = 4096;
const DEFAULT_LOG_CAPACITY: usize = 256;

/// The prefix for environment overrides.
const ENV_PREFIX: &str = "WAVESYNTH";

/// A YAML representation of the synthesizer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SynthConfig {
    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Frames rendered per process call (default: 512)
    buffer_size: Option<usize>,

    /// Voices playing at once across all channels (default: 128)
    max_voices: Option<usize>,

    /// Voices playing at once on one channel (default: 32)
    max_voices_per_channel: Option<usize>,

    /// Gain applied to the final mix (default: 0.3)
    master_volume: Option<f32>,

    /// Retry a missing bank against bank 0, or 128 for percussion (default: false)
    bank_fallback: Option<bool>,

    /// Capacity of the control to audio message channel (default: 4096)
    message_capacity: Option<usize>,

    /// Capacity of the audio thread log channel (default: 256)
    log_capacity: Option<usize>,

    render: Option<Render>,

    playback: Option<Playback>,
}

impl SynthConfig {
    /// Loads a YAML file with environment overrides on top. With no file, only the
    /// environment is read.
    pub fn load(path: Option<&Path>) -> Result<SynthConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<SynthConfig>()?)
    }

    /// Parses a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<SynthConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<SynthConfig>()?)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE).max(1)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    /// Never more than [`max_voices`](Self::max_voices).
    pub fn max_voices_per_channel(&self) -> usize {
        self.max_voices_per_channel
            .unwrap_or(DEFAULT_MAX_VOICES_PER_CHANNEL)
            .clamp(1, self.max_voices())
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume.unwrap_or(DEFAULT_MASTER_VOLUME).max(0.0)
    }

    pub fn bank_fallback(&self) -> bool {
        self.bank_fallback.unwrap_or(false)
    }

    pub fn message_capacity(&self) -> usize {
        self.message_capacity.unwrap_or(DEFAULT_MESSAGE_CAPACITY).max(1)
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity.unwrap_or(DEFAULT_LOG_CAPACITY).max(1)
    }

    pub fn render(&self) -> Render {
        self.render.clone().unwrap_or_default()
    }

    pub fn playback(&self) -> Playback {
        self.playback.clone().unwrap_or_default()
    }
}

/// Parses a duration string such as `200ms` or `5s`.
fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|_| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
        })
}

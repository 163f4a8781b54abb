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

//! Offline rendering.
//!
//! The same engine that runs on the audio callback is driven in a loop with its own
//! frame counter. Progress and cancellation are checked between buffers.

use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info};

use crate::config::{ConfigError, SynthConfig};
use crate::synth::{DelayedEvent, EngineSettings, ImmediateEvent, SynthEngine, TracingSink};

pub mod midi_file;

pub use midi_file::{MidiFileError, MidiSong};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render cancelled")]
    Cancelled,
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("MIDI file error: {0}")]
    MidiFile(#[from] MidiFileError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How to run an offline render.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub settings: EngineSettings,
    /// Frames per process call.
    pub buffer_size: usize,
    /// Longest time to keep rendering after the last event.
    pub silence_timeout: Duration,
    /// Buffers between progress reports and cancellation checks.
    pub progress_interval: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        let config = SynthConfig::default();
        RenderOptions {
            settings: EngineSettings::from(&config),
            buffer_size: config.buffer_size(),
            silence_timeout: Duration::from_secs(5),
            progress_interval: config.render().progress_interval(),
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &SynthConfig) -> Result<RenderOptions, ConfigError> {
        let render = config.render();
        Ok(RenderOptions {
            settings: EngineSettings::from(config),
            buffer_size: config.buffer_size(),
            silence_timeout: render.silence_timeout()?,
            progress_interval: render.progress_interval(),
        })
    }
}

/// Rendered stereo audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl AudioData {
    /// Length in frames.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.len() as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// Writes a 32 bit float stereo WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), RenderError> {
        let mut writer = WavWriter::create(
            path,
            WavSpec {
                channels: 2,
                sample_rate: self.sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )?;
        for (left, right) in self.left.iter().zip(self.right.iter()) {
            writer.write_sample(*left)?;
            writer.write_sample(*right)?;
        }
        writer.finalize()?;
        info!(path = ?path, frames = self.len(), "Wrote WAV file");
        Ok(())
    }
}

type ProgressFn<'a> = Box<dyn FnMut(u64, u64) + 'a>;
type CancelFn<'a> = Box<dyn FnMut() -> bool + 'a>;

/// Drives an engine offline.
pub struct Renderer<'a> {
    options: RenderOptions,
    on_progress: Option<ProgressFn<'a>>,
    cancel: Option<CancelFn<'a>>,
}

impl<'a> Renderer<'a> {
    pub fn new(options: RenderOptions) -> Renderer<'a> {
        Renderer {
            options,
            on_progress: None,
            cancel: None,
        }
    }

    /// Called with (frames rendered, frames at most) every progress interval.
    pub fn on_progress(mut self, on_progress: impl FnMut(u64, u64) + 'a) -> Renderer<'a> {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Polled every progress interval. The render stops when it returns true.
    pub fn cancel_when(mut self, cancel: impl FnMut() -> bool + 'a) -> Renderer<'a> {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Loads the bank, schedules every event from frame zero and renders until the
    /// song is over and the output falls silent, or the silence timeout runs out.
    pub fn render(
        &mut self,
        bank: Vec<ImmediateEvent>,
        events: &[DelayedEvent],
    ) -> Result<AudioData, RenderError> {
        let settings = self.options.settings.clone();
        let sample_rate = settings.sample_rate.max(1);
        let buffer_size = self.options.buffer_size.max(1);
        let progress_interval = self.options.progress_interval.max(1);

        let mut engine = SynthEngine::new(settings).with_log_sink(TracingSink);
        for event in bank {
            engine.add_event(event);
        }
        for event in events {
            engine.add_event(*event);
        }

        let song_frames = events.iter().map(|event| event.delay).max().unwrap_or(0);
        let song_buffers = song_frames.div_ceil(buffer_size as u64);
        let timeout_frames =
            (self.options.silence_timeout.as_secs_f64() * f64::from(sample_rate)).ceil() as u64;
        let total_buffers = song_buffers + timeout_frames.div_ceil(buffer_size as u64);
        let total_frames = total_buffers * buffer_size as u64;
        debug!(song_frames, total_frames, buffer_size, "Rendering");

        let mut audio = AudioData {
            sample_rate,
            left: Vec::with_capacity(total_frames as usize),
            right: Vec::with_capacity(total_frames as usize),
        };
        let mut left = vec![0.0f32; buffer_size];
        let mut right = vec![0.0f32; buffer_size];

        for buffer in 0..total_buffers {
            engine.process(&mut left, &mut right);
            audio.left.extend_from_slice(&left);
            audio.right.extend_from_slice(&right);

            if buffer > song_buffers
                && engine.is_idle()
                && is_silent(&left)
                && is_silent(&right)
            {
                debug!(buffer, total_buffers, "Output fell silent, stopping early");
                break;
            }

            if buffer % progress_interval as u64 == 0 {
                if let Some(on_progress) = self.on_progress.as_mut() {
                    on_progress(audio.len() as u64, total_frames);
                }
                if self.cancel.as_mut().is_some_and(|cancel| cancel()) {
                    info!(frames = audio.len(), "Render cancelled");
                    return Err(RenderError::Cancelled);
                }
            }
        }

        info!(
            frames = audio.len(),
            seconds = audio.duration().as_secs_f64(),
            "Rendered audio"
        );
        Ok(audio)
    }
}

/// Renders with no progress reporting or cancellation.
pub fn render_audio(
    bank: Vec<ImmediateEvent>,
    events: &[DelayedEvent],
    options: RenderOptions,
) -> Result<AudioData, RenderError> {
    Renderer::new(options).render(bank, events)
}

fn is_silent(samples: &[f32]) -> bool {
    samples.iter().all(|sample| *sample == 0.0)
}

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

//! Real-time output through cpal.
//!
//! The engine moves into the stream's data callback and renders straight into the
//! device buffer. Nothing else touches it once the stream is built.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{error, info};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use crate::synth::SynthEngine;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no output device named {0}")]
    DeviceNotFound(String),

    #[error("no default output device")]
    NoDefaultDevice,

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error(transparent)]
    Host(#[from] cpal::HostUnavailable),

    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),

    #[error(transparent)]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error(transparent)]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error(transparent)]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An output device and the host it belongs to.
pub struct OutputDevice {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputDevice")
            .field("name", &self.name)
            .field("max_channels", &self.max_channels)
            .field("host", &self.host_id.name())
            .finish()
    }
}

/// Lists every output device on every available host.
pub fn list_devices() -> Result<Vec<OutputDevice>, AudioError> {
    // Suppress noisy backend output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = %e,
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push(OutputDevice {
                    name: device.name()?,
                    max_channels,
                    host_id,
                    device,
                });
            }
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

impl OutputDevice {
    /// Opens the named device, or the default host's default output device.
    pub fn open(name: Option<&str>) -> Result<OutputDevice, AudioError> {
        match name {
            Some(name) => list_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => {
                let host = cpal::default_host();
                let device = host
                    .default_output_device()
                    .ok_or(AudioError::NoDefaultDevice)?;
                let max_channels = device.default_output_config()?.channels();
                Ok(OutputDevice {
                    name: device.name()?,
                    max_channels,
                    host_id: host.id(),
                    device,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_channels(&self) -> u16 {
        self.max_channels
    }

    /// Starts a stream that plays the engine. The stream runs at the engine's sample
    /// rate with the device's default channel count and sample format.
    ///
    /// `max_frames` bounds the slice the engine renders per call. Device buffers
    /// larger than that are rendered in pieces.
    pub fn start(&self, engine: SynthEngine, max_frames: usize) -> Result<OutputStream, AudioError> {
        let default_config = self.device.default_output_config()?;
        let config = cpal::StreamConfig {
            channels: default_config.channels().max(1),
            sample_rate: engine.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_format = default_config.sample_format();

        info!(
            device = %self,
            channels = config.channels,
            sample_rate = engine.sample_rate(),
            format = ?sample_format,
            "Starting output stream"
        );

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &config, engine, max_frames),
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &config, engine, max_frames),
            cpal::SampleFormat::I32 => build_stream::<i32>(&self.device, &config, engine, max_frames),
            cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &config, engine, max_frames),
            other => Err(AudioError::UnsupportedFormat(other)),
        }?;
        stream.play()?;

        Ok(OutputStream {
            stream,
            channels: config.channels,
        })
    }
}

/// A running output stream. Playback stops when it is dropped.
pub struct OutputStream {
    stream: cpal::Stream,
    channels: u16,
}

impl OutputStream {
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream.pause()?;
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: SynthEngine,
    max_frames: usize,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let max_frames = max_frames.max(1);
    let mut left = vec![0.0f32; max_frames];
    let mut right = vec![0.0f32; max_frames];

    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
            for chunk in data.chunks_mut(max_frames * channels) {
                let frames = chunk.len() / channels;
                let (left, right) = (&mut left[..frames], &mut right[..frames]);
                engine.process(left, right);
                interleave(chunk, left, right, channels);
            }
        },
        |err| error!(err = %err, "Output stream error"),
        None,
    )?;
    Ok(stream)
}

/// Writes stereo frames into an interleaved device buffer. Mono devices get the
/// average of both sides and channels past the second stay silent.
fn interleave<T>(out: &mut [T], left: &[f32], right: &[f32], channels: usize)
where
    T: Sample + FromSample<f32>,
{
    for ((frame, &l), &r) in out.chunks_exact_mut(channels).zip(left).zip(right) {
        match frame {
            [mono] => *mono = T::from_sample((l + r) * 0.5),
            [first, second, rest @ ..] => {
                *first = T::from_sample(l);
                *second = T::from_sample(r);
                rest.fill(T::from_sample(0.0f32));
            }
            [] => {}
        }
    }
}

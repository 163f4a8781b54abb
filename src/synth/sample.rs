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
use serde::Serialize;

use super::envelope::EnvelopeParameter;
use super::message::SampleId;

/// How a zone loops its sample data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SampleLoop {
    None,
    /// Loops until the voice is stopped by its envelope.
    Continuous { start: usize, end: usize },
    /// Loops until note-off, then plays on through the tail.
    UntilRelease { start: usize, end: usize },
}

impl SampleLoop {
    /// Returns the loop bounds if the loop is active for a voice in the given state.
    pub fn active_bounds(&self, note_off: bool) -> Option<(usize, usize)> {
        match *self {
            SampleLoop::None => None,
            SampleLoop::Continuous { start, end } => Some((start, end)),
            SampleLoop::UntilRelease { start, end } => (!note_off).then_some((start, end)),
        }
    }
}

/// Everything needed to play one zone. Shared read-only by every voice playing it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleParameter {
    /// Sample header name, for diagnostics.
    pub name: String,
    /// The PCM block this zone plays.
    pub sample_id: SampleId,
    /// The key, in semitones, at which the sample plays back unshifted.
    pub pitch: f32,
    /// Loop points relative to the start of the PCM block.
    pub sample_loop: SampleLoop,
    /// First frame to play.
    pub sample_start: usize,
    /// One past the last frame to play.
    pub sample_end: usize,
    /// Native sample rate of the PCM data.
    pub sample_rate: u32,
    /// Amplitude envelope timing.
    pub envelope: EnvelopeParameter,
    /// 0 disables key tracking, 1 is twelve semitones per octave.
    pub scale_tuning: f32,
    /// -1 (left) to 1 (right).
    pub pan: f32,
    /// Choke group. Starting a voice in a group stops the others on its channel.
    pub exclusive_class: Option<u16>,
    /// Linear gain, 0 to 1.
    pub volume: f32,
}

impl Default for SampleParameter {
    fn default() -> Self {
        SampleParameter {
            name: String::new(),
            sample_id: 0,
            pitch: 60.0,
            sample_loop: SampleLoop::None,
            sample_start: 0,
            sample_end: 0,
            sample_rate: 44100,
            envelope: EnvelopeParameter::default(),
            scale_tuning: 1.0,
            pan: 0.0,
            exclusive_class: None,
            volume: 1.0,
        }
    }
}

/// Where a zone sits in the lookup table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SampleRange {
    pub bank: u16,
    pub instrument: u8,
    /// Inclusive.
    pub key_range: [u8; 2],
    /// Inclusive.
    pub vel_range: [u8; 2],
}

impl SampleRange {
    /// A range covering every key and velocity.
    pub fn full(bank: u16, instrument: u8) -> SampleRange {
        SampleRange {
            bank,
            instrument,
            key_range: [0, 127],
            vel_range: [0, 127],
        }
    }

    pub fn contains_velocity(&self, velocity: u8) -> bool {
        self.vel_range[0] <= velocity && velocity <= self.vel_range[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_release_loop_stops_after_note_off() {
        let until_release = SampleLoop::UntilRelease { start: 10, end: 20 };
        assert_eq!(until_release.active_bounds(false), Some((10, 20)));
        assert_eq!(until_release.active_bounds(true), None);

        let continuous = SampleLoop::Continuous { start: 10, end: 20 };
        assert_eq!(continuous.active_bounds(true), Some((10, 20)));
        assert_eq!(SampleLoop::None.active_bounds(false), None);
    }
}

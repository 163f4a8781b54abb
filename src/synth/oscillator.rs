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

//! Pitched, looped, interpolated sample playback for a single voice.

use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

use super::envelope::{AmplitudeEnvelope, EnvelopePhase};
use super::lfo::{Lfo, VIBRATO_FREQUENCY};
use super::sample::SampleParameter;

/// Vibrato depth at full modulation.
const VIBRATO_CENTS: f64 = 50.0;

/// Channel state the oscillator needs each block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelMix {
    /// Playback speed multiplier from pitch bend and tuning.
    pub speed: f64,
    /// Linear gain from channel volume and expression.
    pub volume: f32,
    /// -1 to 1.
    pub pan: f32,
    /// Modulation wheel depth, 0 to 1.
    pub modulation: f32,
}

impl Default for ChannelMix {
    fn default() -> Self {
        ChannelMix {
            speed: 1.0,
            volume: 1.0,
            pan: 0.0,
            modulation: 0.0,
        }
    }
}

/// Equal power pan law. Returns (left, right) gains.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (theta.cos(), theta.sin())
}

/// Advances a cursor, wrapping back into the loop with its fractional phase kept.
fn advance_cursor(cursor: f64, speed: f64, bounds: Option<(usize, usize)>) -> f64 {
    let advanced = cursor + speed;
    match bounds {
        Some((start, end)) if end > start && advanced >= end as f64 => {
            let (start, end) = (start as f64, end as f64);
            start + (advanced - end) % (end - start)
        }
        _ => advanced,
    }
}

/// One playing instance of a sample.
pub struct WavetableOscillator {
    /// The zone being played.
    parameter: Arc<SampleParameter>,
    /// PCM data for the zone's sample.
    data: Arc<[f32]>,
    /// Native sample rate over engine sample rate.
    rate_ratio: f64,
    envelope: AmplitudeEnvelope,
    lfo: Lfo,
    /// Fractional frame index into `data`.
    cursor: f64,
    /// Pitch ratio for the key being played.
    base_speed: f64,
    /// Velocity as linear gain.
    velocity: f32,
    /// Note-off has been applied.
    note_off: bool,
    /// The cursor ran off the end of the sample.
    finished: bool,
}

impl WavetableOscillator {
    pub fn new(
        parameter: Arc<SampleParameter>,
        data: Arc<[f32]>,
        sample_rate: u32,
    ) -> WavetableOscillator {
        let sample_rate = sample_rate.max(1);
        WavetableOscillator {
            rate_ratio: f64::from(parameter.sample_rate) / f64::from(sample_rate),
            envelope: AmplitudeEnvelope::new(parameter.envelope, sample_rate),
            lfo: Lfo::new(VIBRATO_FREQUENCY, sample_rate),
            cursor: parameter.sample_start as f64,
            base_speed: 1.0,
            velocity: 0.0,
            note_off: false,
            finished: true,
            parameter,
            data,
        }
    }

    /// Starts playback of `pitch` from the zone's start offset.
    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        let semitones = (f32::from(pitch) - self.parameter.pitch) * self.parameter.scale_tuning;
        self.base_speed = 2f64.powf(f64::from(semitones) / 12.0);
        self.velocity = f32::from(velocity.min(127)) / 127.0;
        self.cursor = self.parameter.sample_start as f64;
        self.note_off = false;
        self.finished = self.parameter.sample_start >= self.end();
        self.envelope.note_on();
    }

    /// Releases the voice through its envelope.
    pub fn note_off(&mut self) {
        self.note_off = true;
        self.envelope.note_off();
    }

    /// Fades the voice out quickly, ignoring its release time.
    pub fn force_stop(&mut self) {
        self.envelope.force_stop();
    }

    /// Mixes the next `left.len()` frames into the buffers.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32], mix: &ChannelMix) {
        if !self.is_playing() {
            return;
        }
        let frames = left.len().min(right.len());
        if frames == 0 {
            return;
        }

        let gain_start = self.envelope.compute_amplitude(frames) as f32;
        let gain_end = self.envelope.peek_amplitude() as f32;
        let gain_step = (gain_end - gain_start) / frames as f32;

        let vibrato =
            1.0 + self.lfo.value(frames) * f64::from(mix.modulation) * VIBRATO_CENTS / 1200.0;
        let speed = self.base_speed * mix.speed * self.rate_ratio * vibrato;

        let (pan_left, pan_right) = pan_gains(mix.pan + self.parameter.pan);
        let amplitude = self.velocity * self.parameter.volume * mix.volume;
        let bounds = self.parameter.sample_loop.active_bounds(self.note_off);
        let end = self.end();

        for i in 0..frames {
            let index = self.cursor as usize;
            if index >= end {
                self.finished = true;
                break;
            }
            let fraction = (self.cursor - index as f64) as f32;
            let current = self.data[index];
            let next = match bounds {
                Some((start, loop_end)) if index + 1 == loop_end => {
                    self.data.get(start).copied().unwrap_or(0.0)
                }
                _ if index + 1 < end => self.data[index + 1],
                _ => 0.0,
            };
            let sample = current + (next - current) * fraction;
            let gain = (gain_start + gain_step * i as f32) * amplitude;

            left[i] += sample * gain * pan_left;
            right[i] += sample * gain * pan_right;

            self.cursor = advance_cursor(self.cursor, speed, bounds);
        }

        if self.cursor as usize >= end {
            self.finished = true;
        }
    }

    /// False once the envelope has stopped or the sample has run out.
    pub fn is_playing(&self) -> bool {
        !self.finished && !self.envelope.is_stopped()
    }

    pub fn is_note_off(&self) -> bool {
        self.note_off
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn envelope_phase(&self) -> EnvelopePhase {
        self.envelope.phase()
    }

    pub fn exclusive_class(&self) -> Option<u16> {
        self.parameter.exclusive_class
    }

    pub fn parameter(&self) -> &SampleParameter {
        &self.parameter
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    fn end(&self) -> usize {
        self.parameter.sample_end.min(self.data.len())
    }
}

impl std::fmt::Debug for WavetableOscillator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavetableOscillator")
            .field("sample", &self.parameter.name)
            .field("cursor", &self.cursor)
            .field("phase", &self.envelope.phase())
            .field("note_off", &self.note_off)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::envelope::EnvelopeParameter;
    use crate::synth::sample::SampleLoop;

    const RATE: u32 = 1000;

    fn oscillator(data: Vec<f32>, sample_loop: SampleLoop) -> WavetableOscillator {
        let parameter = SampleParameter {
            sample_end: data.len(),
            sample_rate: RATE,
            sample_loop,
            envelope: EnvelopeParameter {
                release_time: 0.05,
                ..Default::default()
            },
            ..Default::default()
        };
        WavetableOscillator::new(Arc::new(parameter), data.into(), RATE)
    }

    #[test]
    fn test_loop_keeps_fractional_phase() {
        let bounds = Some((100, 200));
        let wrapped = advance_cursor(199.8, 0.5, bounds);
        assert!((wrapped - 100.3).abs() < 1e-9, "{wrapped}");
        assert_eq!(advance_cursor(150.0, 0.5, bounds), 150.5);
        assert_eq!(advance_cursor(199.8, 0.5, None), 200.3);
    }

    #[test]
    fn test_linear_interpolation() {
        let mut osc = oscillator(vec![0.0, 1.0, 0.0, -1.0], SampleLoop::None);
        osc.note_on(60, 127);
        // Half speed lands between frames.
        osc.base_speed = 0.5;
        let mut left = [0.0f32; 3];
        let mut right = [0.0f32; 3];
        let center = ChannelMix::default();
        osc.process(&mut left, &mut right, &center);

        let (pan_left, _) = pan_gains(0.0);
        assert_eq!(left[0], 0.0);
        assert!((left[1] - 0.5 * pan_left).abs() < 1e-6);
        assert!((left[2] - pan_left).abs() < 1e-6);
        for (l, r) in left.iter().zip(right.iter()) {
            assert!((l - r).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stops_at_sample_end() {
        let mut osc = oscillator(vec![0.5; 8], SampleLoop::None);
        osc.note_on(60, 127);
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        osc.process(&mut left, &mut right, &ChannelMix::default());
        assert!(!osc.is_playing());
        assert!(left[..8].iter().all(|&s| s > 0.0));
        assert!(left[8..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_until_release_loop_plays_tail_after_note_off() {
        let mut osc = oscillator(vec![0.5; 64], SampleLoop::UntilRelease { start: 8, end: 16 });
        osc.note_on(60, 127);
        let mut left = [0.0f32; 32];
        let mut right = [0.0f32; 32];
        osc.process(&mut left, &mut right, &ChannelMix::default());
        assert!(osc.cursor() < 16.0);

        osc.note_off();
        for _ in 0..4 {
            osc.process(&mut left, &mut right, &ChannelMix::default());
        }
        assert!(!osc.is_playing());
    }

    #[test]
    fn test_continuous_loop_ignores_note_off() {
        let mut osc = oscillator(vec![0.5; 64], SampleLoop::Continuous { start: 8, end: 16 });
        osc.note_on(60, 127);
        osc.note_off();
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        osc.process(&mut left, &mut right, &ChannelMix::default());
        osc.process(&mut left, &mut right, &ChannelMix::default());
        assert!(osc.cursor() < 16.0);
    }

    #[test]
    fn test_stopped_voice_is_silent() {
        let mut osc = oscillator(vec![0.5; 10_000], SampleLoop::None);
        osc.note_on(60, 127);
        osc.force_stop();
        let mut left = vec![0.0f32; 200];
        let mut right = vec![0.0f32; 200];
        osc.process(&mut left, &mut right, &ChannelMix::default());
        assert!(!osc.is_playing());

        let mut left = [0.0f32; 64];
        let mut right = [0.0f32; 64];
        osc.process(&mut left, &mut right, &ChannelMix::default());
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_pitch_ratio() {
        let mut osc = oscillator(vec![0.0; 16], SampleLoop::None);
        osc.note_on(72, 100);
        assert!((osc.base_speed - 2.0).abs() < 1e-9);
        osc.note_on(48, 100);
        assert!((osc.base_speed - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pan_law() {
        let (l, r) = pan_gains(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = pan_gains(5.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
        let (l, r) = pan_gains(0.0);
        assert!((l * l + r * r - 1.0).abs() < 1e-6);
    }
}

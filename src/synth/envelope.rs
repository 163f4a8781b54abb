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

//! Attack, hold, decay, sustain, release amplitude envelope.
//!
//! Decay and release move in the decibel domain, so they sound even to the ear.

use serde::Serialize;

/// Length of the fade used when a voice is choked or silenced.
pub const FORCE_STOP_TIME: f64 = 0.1;

/// The level treated as silence at the end of decay and release.
const SILENCE_DB: f64 = -100.0;

/// Envelope timing, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EnvelopeParameter {
    pub attack_time: f64,
    pub hold_time: f64,
    pub decay_time: f64,
    /// Linear, 0 to 1.
    pub sustain_level: f64,
    pub release_time: f64,
}

impl Default for EnvelopeParameter {
    fn default() -> Self {
        EnvelopeParameter {
            attack_time: 0.0,
            hold_time: 0.0,
            decay_time: 0.0,
            sustain_level: 1.0,
            release_time: 0.0,
        }
    }
}

impl EnvelopeParameter {
    /// The decay target in decibels.
    fn sustain_db(&self) -> f64 {
        if self.sustain_level <= 0.0 {
            SILENCE_DB
        } else {
            (20.0 * self.sustain_level.log10()).max(SILENCE_DB)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    ForceStop,
    Stopped,
}

/// Exponential move from `from` towards `db` decibels below it over `duration`.
fn log_decay(from: f64, db: f64, duration: f64, time: f64) -> f64 {
    from * 10f64.powf((db / duration) * time / 20.0)
}

/// Per-voice envelope state.
#[derive(Clone, Debug)]
pub struct AmplitudeEnvelope {
    parameter: EnvelopeParameter,
    sample_rate: f64,
    phase: EnvelopePhase,
    /// Seconds spent in the current phase.
    phase_time: f64,
    /// The last amplitude handed out.
    last_amplitude: f64,
    /// The amplitude release and force stop start from.
    release_level: f64,
    /// Whether the envelope has been computed since note-on.
    stepped: bool,
    /// A note-off arrived before the first computed block.
    release_pending: bool,
}

impl AmplitudeEnvelope {
    pub fn new(parameter: EnvelopeParameter, sample_rate: u32) -> AmplitudeEnvelope {
        AmplitudeEnvelope {
            parameter,
            sample_rate: f64::from(sample_rate.max(1)),
            phase: EnvelopePhase::Stopped,
            phase_time: 0.0,
            last_amplitude: 0.0,
            release_level: 0.0,
            stepped: false,
            release_pending: false,
        }
    }

    /// Restarts the envelope from the beginning of the attack.
    pub fn note_on(&mut self) {
        self.phase = EnvelopePhase::Attack;
        self.phase_time = 0.0;
        self.last_amplitude = 0.0;
        self.release_level = 0.0;
        self.stepped = false;
        self.release_pending = false;
    }

    /// Moves to release. A note-off that lands before the attack has produced any
    /// output waits for one block so the note is still heard.
    pub fn note_off(&mut self) {
        match self.phase {
            EnvelopePhase::Release | EnvelopePhase::ForceStop | EnvelopePhase::Stopped => {}
            EnvelopePhase::Attack if !self.stepped => self.release_pending = true,
            _ => self.begin(EnvelopePhase::Release),
        }
    }

    /// Fades out over [`FORCE_STOP_TIME`] regardless of the release time.
    pub fn force_stop(&mut self) {
        match self.phase {
            EnvelopePhase::ForceStop | EnvelopePhase::Stopped => {}
            _ => {
                self.release_pending = false;
                self.begin(EnvelopePhase::ForceStop);
            }
        }
    }

    /// Returns the gain for the next `frames` frames and advances time past them.
    pub fn compute_amplitude(&mut self, frames: usize) -> f64 {
        let amplitude = self.current_amplitude();
        self.last_amplitude = amplitude;
        self.phase_time += frames as f64 / self.sample_rate;
        self.stepped = true;

        if self.release_pending {
            self.release_pending = false;
            self.begin(EnvelopePhase::Release);
        }
        amplitude
    }

    /// The amplitude at the current time, without advancing.
    pub fn peek_amplitude(&mut self) -> f64 {
        self.current_amplitude()
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == EnvelopePhase::Stopped
    }

    /// True once the voice is on its way out.
    pub fn is_releasing(&self) -> bool {
        matches!(
            self.phase,
            EnvelopePhase::Release | EnvelopePhase::ForceStop | EnvelopePhase::Stopped
        ) || self.release_pending
    }

    pub fn last_amplitude(&self) -> f64 {
        self.last_amplitude
    }

    fn begin(&mut self, phase: EnvelopePhase) {
        self.release_level = self.current_amplitude();
        self.phase = phase;
        self.phase_time = 0.0;
    }

    /// Resolves any finished phases and returns the amplitude at `phase_time`.
    fn current_amplitude(&mut self) -> f64 {
        let p = self.parameter;
        loop {
            let t = self.phase_time;
            let (duration, next) = match self.phase {
                EnvelopePhase::Attack => {
                    if t < p.attack_time {
                        return t / p.attack_time;
                    }
                    (p.attack_time, EnvelopePhase::Hold)
                }
                EnvelopePhase::Hold => {
                    if t < p.hold_time {
                        return 1.0;
                    }
                    (p.hold_time, EnvelopePhase::Decay)
                }
                EnvelopePhase::Decay => {
                    if t < p.decay_time {
                        return log_decay(1.0, p.sustain_db(), p.decay_time, t);
                    }
                    let next = if p.sustain_level <= 0.0 {
                        EnvelopePhase::Stopped
                    } else {
                        EnvelopePhase::Sustain
                    };
                    (p.decay_time, next)
                }
                EnvelopePhase::Sustain => return p.sustain_level.clamp(0.0, 1.0),
                EnvelopePhase::Release => {
                    if t < p.release_time {
                        return log_decay(self.release_level, SILENCE_DB, p.release_time, t);
                    }
                    (p.release_time, EnvelopePhase::Stopped)
                }
                EnvelopePhase::ForceStop => {
                    if t < FORCE_STOP_TIME {
                        return self.release_level * (1.0 - t / FORCE_STOP_TIME);
                    }
                    (FORCE_STOP_TIME, EnvelopePhase::Stopped)
                }
                EnvelopePhase::Stopped => return 0.0,
            };
            self.phase_time = (t - duration).max(0.0);
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn parameter() -> EnvelopeParameter {
        EnvelopeParameter {
            attack_time: 0.1,
            hold_time: 0.1,
            decay_time: 0.2,
            sustain_level: 0.5,
            release_time: 0.3,
        }
    }

    #[test]
    fn test_attack_is_linear() {
        let mut envelope = AmplitudeEnvelope::new(parameter(), RATE);
        envelope.note_on();
        assert_eq!(envelope.compute_amplitude(50), 0.0);
        assert!((envelope.compute_amplitude(50) - 0.5).abs() < 1e-9);
        // Hold.
        assert!((envelope.compute_amplitude(50) - 1.0).abs() < 1e-9);
        assert_eq!(envelope.phase(), EnvelopePhase::Hold);
    }

    #[test]
    fn test_decay_reaches_sustain_in_db() {
        let mut envelope = AmplitudeEnvelope::new(parameter(), RATE);
        envelope.note_on();
        envelope.compute_amplitude(200);
        // Halfway through decay is halfway in decibels, not linear.
        envelope.compute_amplitude(100);
        let halfway = envelope.peek_amplitude();
        let expected = 10f64.powf(20.0 * 0.5f64.log10() / 2.0 / 20.0);
        assert!((halfway - expected).abs() < 1e-6, "{halfway} vs {expected}");
        assert!(halfway < 0.75);

        envelope.compute_amplitude(100);
        assert!((envelope.compute_amplitude(10) - 0.5).abs() < 1e-9);
        assert_eq!(envelope.phase(), EnvelopePhase::Sustain);
    }

    #[test]
    fn test_zero_sustain_stops_after_decay() {
        let mut envelope = AmplitudeEnvelope::new(
            EnvelopeParameter {
                sustain_level: 0.0,
                ..parameter()
            },
            RATE,
        );
        envelope.note_on();
        envelope.compute_amplitude(450);
        assert_eq!(envelope.compute_amplitude(1), 0.0);
        assert!(envelope.is_stopped());
    }

    #[test]
    fn test_release_decays_to_silence() {
        let mut envelope = AmplitudeEnvelope::new(parameter(), RATE);
        envelope.note_on();
        envelope.compute_amplitude(600);
        envelope.note_off();
        assert_eq!(envelope.phase(), EnvelopePhase::Release);

        let start = envelope.compute_amplitude(150);
        assert!((start - 0.5).abs() < 1e-9);
        let middle = envelope.compute_amplitude(150);
        assert!(middle < start && middle > 0.0);
        assert_eq!(envelope.compute_amplitude(1), 0.0);
        assert!(envelope.is_stopped());
    }

    #[test]
    fn test_note_off_before_first_block_still_sounds() {
        let mut envelope = AmplitudeEnvelope::new(
            EnvelopeParameter {
                attack_time: 0.0,
                ..parameter()
            },
            RATE,
        );
        envelope.note_on();
        envelope.note_off();
        assert!(envelope.is_releasing());
        assert!(envelope.compute_amplitude(10) > 0.9);
        assert_eq!(envelope.phase(), EnvelopePhase::Release);
        assert!(envelope.compute_amplitude(10) > 0.0);
    }

    #[test]
    fn test_force_stop_ignores_release_time() {
        let mut envelope = AmplitudeEnvelope::new(
            EnvelopeParameter {
                release_time: 10.0,
                ..parameter()
            },
            RATE,
        );
        envelope.note_on();
        envelope.compute_amplitude(150);
        envelope.force_stop();
        assert_eq!(envelope.phase(), EnvelopePhase::ForceStop);

        let first = envelope.compute_amplitude(50);
        assert!((first - 1.0).abs() < 1e-9);
        assert!((envelope.compute_amplitude(50) - 0.5).abs() < 1e-9);
        assert_eq!(envelope.compute_amplitude(1), 0.0);
        assert!(envelope.is_stopped());
    }

    #[test]
    fn test_amplitude_never_negative() {
        let cases = [
            parameter(),
            EnvelopeParameter::default(),
            EnvelopeParameter {
                attack_time: 0.0,
                hold_time: 0.0,
                decay_time: 0.01,
                sustain_level: 0.0,
                release_time: 0.0,
            },
            EnvelopeParameter {
                attack_time: 1.0,
                hold_time: 0.0,
                decay_time: 0.0,
                sustain_level: 1.0,
                release_time: 0.05,
            },
        ];

        for case in cases {
            for release_at in [0usize, 3, 40, 400] {
                let mut envelope = AmplitudeEnvelope::new(case, RATE);
                envelope.note_on();
                let mut reached_zero = false;
                for block in 0..400 {
                    if block == release_at {
                        envelope.note_off();
                    }
                    if block == 350 {
                        envelope.force_stop();
                    }
                    let amplitude = envelope.compute_amplitude(7);
                    assert!(amplitude >= 0.0, "{case:?} went negative: {amplitude}");
                    if envelope.is_stopped() {
                        reached_zero = true;
                        assert_eq!(envelope.peek_amplitude(), 0.0);
                    }
                }
                assert!(reached_zero, "{case:?} never stopped");
            }
        }
    }
}

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
use std::f64::consts::TAU;

/// Vibrato rate.
pub const VIBRATO_FREQUENCY: f64 = 5.0;

/// A sine low frequency oscillator advanced a block at a time.
#[derive(Clone, Debug)]
pub struct Lfo {
    /// Radians.
    phase: f64,
    /// Radians per frame.
    step: f64,
}

impl Lfo {
    pub fn new(frequency: f64, sample_rate: u32) -> Lfo {
        Lfo {
            phase: 0.0,
            step: TAU * frequency / f64::from(sample_rate.max(1)),
        }
    }

    /// Returns the value at the current phase, then advances `frames` frames.
    pub fn value(&mut self, frames: usize) -> f64 {
        let value = self.phase.sin();
        self.phase = (self.phase + self.step * frames as f64) % TAU;
        value
    }
}

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
use super::oscillator::ChannelMix;

/// Number of channels the engine keeps state for.
pub const CHANNEL_COUNT: usize = 16;

/// The 0-based General MIDI percussion channel.
pub const RHYTHM_CHANNEL: u8 = 9;

/// The bank the percussion channel always plays from.
pub const RHYTHM_BANK: u16 = 128;

/// Center of the 14 bit pitch bend range.
const PITCH_BEND_CENTER: f32 = 8192.0;

const DEFAULT_PITCH_BEND_SENSITIVITY: f32 = 2.0;

/// Controller derived state for one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    /// This channel's number.
    channel: u8,
    /// Linear, 0 to 1.
    pub volume: f32,
    pub bank: u16,
    pub instrument: u8,
    /// Raw 14 bit pitch bend.
    pub pitch_bend: u16,
    /// Semitones at full bend.
    pub pitch_bend_sensitivity: f32,
    /// Semitones, from fine tuning.
    pub fine_tuning: f32,
    /// Semitones, from coarse tuning.
    pub coarse_tuning: f32,
    /// Linear, 0 to 1.
    pub expression: f32,
    /// -1 to 1.
    pub pan: f32,
    /// 0 to 1.
    pub modulation: f32,
    /// Sustain pedal.
    pub hold: bool,
}

impl ChannelState {
    pub fn new(channel: u8) -> ChannelState {
        ChannelState {
            channel,
            volume: 1.0,
            bank: 0,
            instrument: 0,
            pitch_bend: PITCH_BEND_CENTER as u16,
            pitch_bend_sensitivity: DEFAULT_PITCH_BEND_SENSITIVITY,
            fine_tuning: 0.0,
            coarse_tuning: 0.0,
            expression: 1.0,
            pan: 0.0,
            modulation: 0.0,
            hold: false,
        }
    }

    /// Restores every channel default, bank and program included.
    pub fn reset(&mut self) {
        *self = ChannelState::new(self.channel);
    }

    pub fn is_rhythm(&self) -> bool {
        self.channel == RHYTHM_CHANNEL
    }

    /// The bank note-ons look up.
    pub fn effective_bank(&self) -> u16 {
        if self.is_rhythm() {
            RHYTHM_BANK
        } else {
            self.bank
        }
    }

    pub fn set_volume(&mut self, value: u8) {
        self.volume = controller_level(value);
    }

    pub fn set_expression(&mut self, value: u8) {
        self.expression = controller_level(value);
    }

    pub fn set_pan(&mut self, value: u8) {
        self.pan = (f32::from(value.min(127)) / 127.0 - 0.5) * 2.0;
    }

    pub fn set_modulation(&mut self, value: u8) {
        self.modulation = controller_level(value);
    }

    /// Pitch bend in semitones.
    pub fn pitch_bend_semitones(&self) -> f32 {
        (f32::from(self.pitch_bend) / PITCH_BEND_CENTER - 1.0) * self.pitch_bend_sensitivity
    }

    /// What the channel contributes to each of its voices.
    pub fn mix(&self) -> ChannelMix {
        let semitones = self.pitch_bend_semitones() + self.fine_tuning + self.coarse_tuning;
        ChannelMix {
            speed: 2f64.powf(f64::from(semitones) / 12.0),
            volume: self.volume * self.expression,
            pan: self.pan,
            modulation: self.modulation,
        }
    }
}

/// Controller value as a level. Full scale is the unreachable 128.
fn controller_level(value: u8) -> f32 {
    f32::from(value.min(127)) / 128.0
}

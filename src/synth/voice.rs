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

//! Voice management for polyphonic sample playback.
//!
//! Voices live in a fixed set of slots allocated up front. Allocation, stealing and
//! removal reuse slots in place.

use super::oscillator::WavetableOscillator;

/// An oscillator tagged with the note that started it.
pub struct Voice {
    /// The channel that triggered this voice.
    channel: u8,
    /// The key that triggered this voice (for note-off matching).
    pitch: u8,
    /// Start order. Lower serials started earlier.
    serial: u64,
    /// Note-off arrived while the hold pedal was down.
    held: bool,
    oscillator: WavetableOscillator,
}

impl Voice {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Checks if this voice matches a note-off.
    pub fn matches_note_off(&self, channel: u8, pitch: u8) -> bool {
        self.channel == channel && self.pitch == pitch
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn set_held(&mut self, held: bool) {
        self.held = held;
    }

    pub fn oscillator(&self) -> &WavetableOscillator {
        &self.oscillator
    }

    pub fn oscillator_mut(&mut self) -> &mut WavetableOscillator {
        &mut self.oscillator
    }
}

/// The note a stolen voice was playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StolenVoice {
    pub channel: u8,
    pub pitch: u8,
}

/// Manages active voices.
pub struct VoicePool {
    /// Preallocated voice slots.
    slots: Vec<Option<Voice>>,
    /// Maximum voices on any one channel.
    max_voices_per_channel: usize,
    /// Serial handed to the next voice.
    next_serial: u64,
}

impl VoicePool {
    /// Creates a pool with `max_voices` slots.
    pub fn new(max_voices: usize, max_voices_per_channel: usize) -> VoicePool {
        let max_voices = max_voices.max(1);
        VoicePool {
            slots: (0..max_voices).map(|_| None).collect(),
            max_voices_per_channel: max_voices_per_channel.clamp(1, max_voices),
            next_serial: 0,
        }
    }

    /// The serial the next added voice will get.
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Adds a voice, stealing one if the channel or global limit is reached.
    /// Returns the note the stolen voice was playing.
    pub fn add_voice(
        &mut self,
        channel: u8,
        pitch: u8,
        oscillator: WavetableOscillator,
    ) -> Option<StolenVoice> {
        let (index, stolen) = if self.channel_count(channel) >= self.max_voices_per_channel {
            self.steal(|voice| voice.channel == channel)
        } else if let Some(free) = self.slots.iter().position(Option::is_none) {
            (free, None)
        } else {
            self.steal(|_| true)
        };

        self.slots[index] = Some(Voice {
            channel,
            pitch,
            serial: self.next_serial,
            held: false,
            oscillator,
        });
        self.next_serial += 1;
        stolen
    }

    /// Picks the oldest releasing voice among the candidates, otherwise the oldest.
    fn steal(&mut self, candidate: impl Fn(&Voice) -> bool) -> (usize, Option<StolenVoice>) {
        let victim = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|voice| (index, voice)))
            .filter(|(_, voice)| candidate(voice))
            .min_by_key(|(_, voice)| (!voice.oscillator.is_releasing(), voice.serial))
            .map(|(index, _)| index);

        match victim {
            Some(index) => {
                let stolen = self.slots[index].take().map(|voice| StolenVoice {
                    channel: voice.channel,
                    pitch: voice.pitch,
                });
                (index, stolen)
            }
            // Only reachable when the candidates are empty, which the limits rule out.
            None => (0, None),
        }
    }

    /// Every active voice.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.slots.iter_mut().flatten()
    }

    /// Active voices on one channel.
    pub fn iter_channel_mut(&mut self, channel: u8) -> impl Iterator<Item = &mut Voice> {
        self.iter_mut().filter(move |voice| voice.channel == channel)
    }

    /// Frees the slots of voices that have finished.
    pub fn retain_playing(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot
                .as_ref()
                .is_some_and(|voice| !voice.oscillator.is_playing())
            {
                *slot = None;
            }
        }
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn channel_count(&self, channel: u8) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|voice| voice.channel == channel)
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("max_voices", &self.slots.len())
            .field("max_voices_per_channel", &self.max_voices_per_channel)
            .finish()
    }
}

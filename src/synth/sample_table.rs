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

//! Maps (bank, instrument, key, velocity) to the zones that should sound.

use std::collections::HashMap;
use std::sync::Arc;

use super::sample::{SampleParameter, SampleRange};

/// Number of MIDI keys.
const KEY_COUNT: usize = 128;

/// The percussion bank.
const PERCUSSION_BANK: u16 = 128;

struct TableEntry {
    parameter: Arc<SampleParameter>,
    /// Inclusive.
    vel_range: [u8; 2],
}

/// Zones indexed by bank, instrument and key.
#[derive(Default)]
pub struct SampleTable {
    /// Per (bank, instrument), one list of entries per key.
    instruments: HashMap<(u16, u8), Vec<Vec<TableEntry>>>,
    /// Retry missing banks against the default melodic or percussion bank.
    bank_fallback: bool,
    /// Number of zones inserted.
    zones: usize,
}

impl SampleTable {
    pub fn new(bank_fallback: bool) -> SampleTable {
        SampleTable {
            bank_fallback,
            ..Default::default()
        }
    }

    /// Adds a zone under every key in its key range.
    pub fn insert(&mut self, parameter: Arc<SampleParameter>, range: SampleRange) {
        let keys = self
            .instruments
            .entry((range.bank, range.instrument))
            .or_insert_with(|| (0..KEY_COUNT).map(|_| Vec::new()).collect());

        let low = usize::from(range.key_range[0]);
        let high = usize::from(range.key_range[1]).min(KEY_COUNT - 1);
        for entries in keys.iter_mut().take(high + 1).skip(low) {
            entries.push(TableEntry {
                parameter: parameter.clone(),
                vel_range: range.vel_range,
            });
        }
        self.zones += 1;
    }

    /// Every zone for the key whose velocity range contains `velocity`.
    pub fn lookup(
        &self,
        bank: u16,
        instrument: u8,
        pitch: u8,
        velocity: u8,
    ) -> impl Iterator<Item = &Arc<SampleParameter>> + '_ {
        self.resolve(bank, instrument)
            .and_then(|keys| keys.get(usize::from(pitch)))
            .into_iter()
            .flatten()
            .filter(move |entry| entry.vel_range[0] <= velocity && velocity <= entry.vel_range[1])
            .map(|entry| &entry.parameter)
    }

    /// Whether any zone was inserted for the instrument, honouring bank fallback.
    pub fn has_instrument(&self, bank: u16, instrument: u8) -> bool {
        self.resolve(bank, instrument).is_some()
    }

    /// Number of zones inserted.
    pub fn zone_count(&self) -> usize {
        self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.zones == 0
    }

    fn resolve(&self, bank: u16, instrument: u8) -> Option<&Vec<Vec<TableEntry>>> {
        if let Some(keys) = self.instruments.get(&(bank, instrument)) {
            return Some(keys);
        }
        if !self.bank_fallback {
            return None;
        }
        let fallback = if bank < PERCUSSION_BANK {
            0
        } else {
            PERCUSSION_BANK
        };
        self.instruments.get(&(fallback, instrument))
    }
}

impl std::fmt::Debug for SampleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleTable")
            .field("instruments", &self.instruments.len())
            .field("zones", &self.zones)
            .field("bank_fallback", &self.bank_fallback)
            .finish()
    }
}

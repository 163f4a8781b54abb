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

//! Splits presets and instruments into zones.

use super::error::SoundFontError;
use super::generator::GeneratorSet;
use super::records::{Bag, GeneratorRecord};

type Result<T> = std::result::Result<T, SoundFontError>;

/// A zone that ends in a reference to an instrument or sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    /// Instrument index for preset zones, sample index for instrument zones.
    pub target: usize,
    pub generators: GeneratorSet,
}

/// The zones of one preset or instrument.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneList {
    /// Generators shared by every zone. Empty if there is no global zone.
    pub global: GeneratorSet,
    pub zones: Vec<Zone>,
}

impl ZoneList {
    /// Each zone's generators with the global zone underneath.
    pub fn resolved(&self) -> impl Iterator<Item = (usize, GeneratorSet)> + '_ {
        self.zones
            .iter()
            .map(|zone| (zone.target, self.global.overlay(&zone.generators)))
    }
}

/// Splits every header's bags into zones. `bag_indices` includes the terminal
/// header, so there is one fewer list than indices.
pub(crate) fn zone_lists(
    kind: &'static str,
    bag_indices: &[u16],
    bags: &[Bag],
    generators: &[GeneratorRecord],
    terminal: u16,
) -> Result<Vec<ZoneList>> {
    bag_indices
        .windows(2)
        .enumerate()
        .map(|(index, window)| {
            let (start, end) = (usize::from(window[0]), usize::from(window[1]));
            if start > end || end >= bags.len() {
                return Err(SoundFontError::InvalidReference {
                    kind: "bag",
                    index: start,
                });
            }
            split(kind, index, &bags[start..=end], generators, terminal)
        })
        .collect()
}

/// `bags` holds the header's bags plus the one after, which ends the last zone.
fn split(
    kind: &'static str,
    index: usize,
    bags: &[Bag],
    generators: &[GeneratorRecord],
    terminal: u16,
) -> Result<ZoneList> {
    let mut list = ZoneList::default();

    for (position, pair) in bags.windows(2).enumerate() {
        let start = usize::from(pair[0].generator_index);
        let end = usize::from(pair[1].generator_index);
        let records = generators
            .get(start..end)
            .ok_or(SoundFontError::InvalidReference {
                kind: "generator",
                index: start,
            })?;

        match records.last() {
            Some(last) if last.operator == terminal => list.zones.push(Zone {
                target: usize::from(last.amount),
                generators: GeneratorSet::from_records(records),
            }),
            // Only the first zone may omit the reference, which makes it global.
            _ if position == 0 => list.global = GeneratorSet::from_records(records),
            _ => return Err(SoundFontError::MissingTerminalGenerator { kind, index }),
        }
    }

    if list.zones.is_empty() {
        return Err(SoundFontError::MissingTerminalGenerator { kind, index });
    }
    Ok(list)
}

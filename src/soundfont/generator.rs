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

//! Generator operators and zone generator sets.

use super::records::GeneratorRecord;

pub const START_ADDRS_OFFSET: u16 = 0;
pub const END_ADDRS_OFFSET: u16 = 1;
pub const START_LOOP_ADDRS_OFFSET: u16 = 2;
pub const END_LOOP_ADDRS_OFFSET: u16 = 3;
pub const START_ADDRS_COARSE_OFFSET: u16 = 4;
pub const END_ADDRS_COARSE_OFFSET: u16 = 12;
pub const PAN: u16 = 17;
pub const ATTACK_VOL_ENV: u16 = 34;
pub const HOLD_VOL_ENV: u16 = 35;
pub const DECAY_VOL_ENV: u16 = 36;
pub const SUSTAIN_VOL_ENV: u16 = 37;
pub const RELEASE_VOL_ENV: u16 = 38;
pub const INSTRUMENT: u16 = 41;
pub const KEY_RANGE: u16 = 43;
pub const VEL_RANGE: u16 = 44;
pub const START_LOOP_ADDRS_COARSE_OFFSET: u16 = 45;
pub const KEYNUM: u16 = 46;
pub const VELOCITY: u16 = 47;
pub const INITIAL_ATTENUATION: u16 = 48;
pub const END_LOOP_ADDRS_COARSE_OFFSET: u16 = 50;
pub const COARSE_TUNE: u16 = 51;
pub const FINE_TUNE: u16 = 52;
pub const SAMPLE_ID: u16 = 53;
pub const SAMPLE_MODES: u16 = 54;
pub const SCALE_TUNING: u16 = 56;
pub const EXCLUSIVE_CLASS: u16 = 57;
pub const OVERRIDING_ROOT_KEY: u16 = 58;

/// Operators 0 through 59. 60 is the end marker.
const GENERATOR_COUNT: usize = 60;

/// Time cents are clamped to this range before conversion.
const MIN_TIMECENTS: i32 = -12000;
const MAX_TIMECENTS: i32 = 8000;

/// The value an operator takes when no zone sets it.
fn default_value(operator: u16) -> i32 {
    match operator {
        ATTACK_VOL_ENV | HOLD_VOL_ENV | DECAY_VOL_ENV | RELEASE_VOL_ENV => MIN_TIMECENTS,
        SCALE_TUNING => 100,
        OVERRIDING_ROOT_KEY | KEYNUM | VELOCITY => -1,
        _ => 0,
    }
}

/// Whether a preset level value adds to the instrument level one. The rest are
/// instrument only and ignored at preset level.
fn is_additive(operator: u16) -> bool {
    !matches!(
        operator,
        START_ADDRS_OFFSET
            | END_ADDRS_OFFSET
            | START_LOOP_ADDRS_OFFSET
            | END_LOOP_ADDRS_OFFSET
            | START_ADDRS_COARSE_OFFSET
            | END_ADDRS_COARSE_OFFSET
            | START_LOOP_ADDRS_COARSE_OFFSET
            | END_LOOP_ADDRS_COARSE_OFFSET
            | INSTRUMENT
            | KEY_RANGE
            | VEL_RANGE
            | KEYNUM
            | VELOCITY
            | SAMPLE_ID
            | SAMPLE_MODES
            | EXCLUSIVE_CLASS
            | OVERRIDING_ROOT_KEY
    )
}

/// Converts time cents to seconds.
pub fn timecents_to_seconds(timecents: i32) -> f64 {
    if timecents <= i32::from(i16::MIN) {
        return 0.0;
    }
    let timecents = timecents.clamp(MIN_TIMECENTS, MAX_TIMECENTS);
    2f64.powf(f64::from(timecents) / 1200.0)
}

/// The generators one zone sets.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorSet {
    values: [Option<i32>; GENERATOR_COUNT],
    key_range: Option<[u8; 2]>,
    vel_range: Option<[u8; 2]>,
}

impl Default for GeneratorSet {
    fn default() -> Self {
        GeneratorSet {
            values: [None; GENERATOR_COUNT],
            key_range: None,
            vel_range: None,
        }
    }
}

impl GeneratorSet {
    /// Collects a zone's records. Operators this parser doesn't know are skipped.
    pub fn from_records(records: &[GeneratorRecord]) -> GeneratorSet {
        let mut set = GeneratorSet::default();
        for record in records {
            match record.operator {
                KEY_RANGE => set.key_range = Some(record.range()),
                VEL_RANGE => set.vel_range = Some(record.range()),
                operator if usize::from(operator) < GENERATOR_COUNT => {
                    let amount = match operator {
                        INSTRUMENT | SAMPLE_ID => i32::from(record.amount),
                        _ => i32::from(record.signed()),
                    };
                    set.values[usize::from(operator)] = Some(amount);
                }
                _ => {}
            }
        }
        set
    }

    /// The value set for an operator, if any.
    pub fn get(&self, operator: u16) -> Option<i32> {
        self.values.get(usize::from(operator)).copied().flatten()
    }

    /// The value for an operator, falling back to its default.
    pub fn value(&self, operator: u16) -> i32 {
        self.get(operator).unwrap_or_else(|| default_value(operator))
    }

    /// Returns `self` with everything `local` sets taking precedence.
    pub fn overlay(&self, local: &GeneratorSet) -> GeneratorSet {
        let mut merged = self.clone();
        for (value, local) in merged.values.iter_mut().zip(local.values.iter()) {
            if local.is_some() {
                *value = *local;
            }
        }
        merged.key_range = local.key_range.or(self.key_range);
        merged.vel_range = local.vel_range.or(self.vel_range);
        merged
    }

    /// Adds the additive preset level values onto this instrument level set. A
    /// value the instrument leaves unset starts from its default.
    pub fn add_preset(&mut self, preset: &GeneratorSet) {
        for (operator, amount) in preset.values.iter().enumerate() {
            let (Some(amount), Ok(operator)) = (amount, u16::try_from(operator)) else {
                continue;
            };
            if is_additive(operator) {
                self.values[usize::from(operator)] = Some(self.value(operator) + amount);
            }
        }
    }

    pub fn key_range(&self) -> [u8; 2] {
        self.key_range.unwrap_or([0, 127])
    }

    pub fn vel_range(&self) -> [u8; 2] {
        self.vel_range.unwrap_or([0, 127])
    }

    /// Intersects key and velocity ranges with a preset zone's. Returns `None` if
    /// either intersection is empty.
    pub fn intersect_ranges(&self, preset: &GeneratorSet) -> Option<([u8; 2], [u8; 2])> {
        let intersect = |a: [u8; 2], b: [u8; 2]| {
            let range = [a[0].max(b[0]), a[1].min(b[1])];
            (range[0] <= range[1]).then_some(range)
        };
        Some((
            intersect(self.key_range(), preset.key_range())?,
            intersect(self.vel_range(), preset.vel_range())?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(operator: u16, amount: i16) -> GeneratorRecord {
        GeneratorRecord {
            operator,
            amount: amount as u16,
        }
    }

    fn range(operator: u16, lo: u8, hi: u8) -> GeneratorRecord {
        GeneratorRecord {
            operator,
            amount: u16::from_le_bytes([lo, hi]),
        }
    }

    #[test]
    fn test_timecents() {
        assert_eq!(timecents_to_seconds(0), 1.0);
        assert_eq!(timecents_to_seconds(1200), 2.0);
        assert_eq!(timecents_to_seconds(-32768), 0.0);
        assert_eq!(timecents_to_seconds(-32767), 2f64.powf(-10.0));
        assert_eq!(timecents_to_seconds(-20000), 2f64.powf(-10.0));
        assert_eq!(timecents_to_seconds(-13000), 2f64.powf(-10.0));
        assert_eq!(timecents_to_seconds(9000), 2f64.powf(8000.0 / 1200.0));
    }

    #[test]
    fn test_defaults_and_unknown_operators() {
        let set = GeneratorSet::from_records(&[record(FINE_TUNE, -20), record(200, 5)]);
        assert_eq!(set.get(FINE_TUNE), Some(-20));
        assert_eq!(set.value(SCALE_TUNING), 100);
        assert_eq!(set.value(ATTACK_VOL_ENV), -12000);
        assert_eq!(set.value(OVERRIDING_ROOT_KEY), -1);
        assert_eq!(set.key_range(), [0, 127]);
    }

    #[test]
    fn test_overlay_prefers_local() {
        let global = GeneratorSet::from_records(&[
            record(PAN, 100),
            record(COARSE_TUNE, 2),
            range(KEY_RANGE, 0, 60),
        ]);
        let local = GeneratorSet::from_records(&[record(PAN, -100), record(SAMPLE_ID, 3)]);
        let merged = global.overlay(&local);
        assert_eq!(merged.get(PAN), Some(-100));
        assert_eq!(merged.get(COARSE_TUNE), Some(2));
        assert_eq!(merged.get(SAMPLE_ID), Some(3));
        assert_eq!(merged.key_range(), [0, 60]);
    }

    #[test]
    fn test_preset_values_add() {
        let mut instrument = GeneratorSet::from_records(&[
            record(COARSE_TUNE, 2),
            record(SAMPLE_MODES, 1),
            record(SAMPLE_ID, 0),
        ]);
        let preset = GeneratorSet::from_records(&[
            record(COARSE_TUNE, 3),
            record(ATTACK_VOL_ENV, 1200),
            record(SAMPLE_MODES, 3),
            record(INSTRUMENT, 0),
        ]);
        instrument.add_preset(&preset);

        assert_eq!(instrument.get(COARSE_TUNE), Some(5));
        // Added to the default.
        assert_eq!(instrument.get(ATTACK_VOL_ENV), Some(-10800));
        assert_eq!(instrument.get(SAMPLE_MODES), Some(1));
        assert_eq!(instrument.get(INSTRUMENT), None);
    }

    #[test]
    fn test_range_intersection() {
        let instrument =
            GeneratorSet::from_records(&[range(KEY_RANGE, 40, 80), range(VEL_RANGE, 0, 100)]);
        let preset = GeneratorSet::from_records(&[range(KEY_RANGE, 60, 127)]);
        assert_eq!(instrument.intersect_ranges(&preset), Some(([60, 80], [0, 100])));

        let disjoint = GeneratorSet::from_records(&[range(VEL_RANGE, 101, 127)]);
        assert_eq!(instrument.intersect_ranges(&disjoint), None);
    }
}

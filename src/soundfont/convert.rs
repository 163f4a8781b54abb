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

//! Generator values to playback parameters.

use super::generator::{self as op, timecents_to_seconds, GeneratorSet};
use super::records::SampleHeader;
use crate::synth::{EnvelopeParameter, SampleId, SampleLoop, SampleParameter};

/// Sample points per coarse address offset.
const COARSE_OFFSET: i64 = 32768;

/// Sustain attenuation at or beyond which the sustain level is silence, in centibels.
const SILENT_SUSTAIN: i32 = 1000;

fn offset(generators: &GeneratorSet, fine: u16, coarse: u16) -> i64 {
    i64::from(generators.value(coarse)) * COARSE_OFFSET + i64::from(generators.value(fine))
}

fn clamp_frame(frame: i64, frames: usize) -> usize {
    usize::try_from(frame.max(0)).unwrap_or(0).min(frames)
}

/// The key the sample plays back unshifted at.
fn root_pitch(generators: &GeneratorSet, header: &SampleHeader) -> f32 {
    let root = match generators.value(op::OVERRIDING_ROOT_KEY) {
        key @ 0..=127 => key as f32,
        _ => f32::from(header.original_pitch),
    };
    let tune =
        generators.value(op::COARSE_TUNE) as f32 + generators.value(op::FINE_TUNE) as f32 / 100.0;
    root - tune - f32::from(header.pitch_correction) / 100.0
}

fn sample_loop(generators: &GeneratorSet, header: &SampleHeader, frames: usize) -> SampleLoop {
    let base = i64::from(header.start);
    let start = i64::from(header.loop_start) - base
        + offset(generators, op::START_LOOP_ADDRS_OFFSET, op::START_LOOP_ADDRS_COARSE_OFFSET);
    let end = i64::from(header.loop_end) - base
        + offset(generators, op::END_LOOP_ADDRS_OFFSET, op::END_LOOP_ADDRS_COARSE_OFFSET);
    let (start, end) = (clamp_frame(start, frames), clamp_frame(end, frames));
    if end <= start {
        return SampleLoop::None;
    }

    match generators.value(op::SAMPLE_MODES) & 3 {
        1 => SampleLoop::Continuous { start, end },
        3 => SampleLoop::UntilRelease { start, end },
        _ => SampleLoop::None,
    }
}

fn envelope(generators: &GeneratorSet) -> EnvelopeParameter {
    let time = |operator| timecents_to_seconds(generators.value(operator));
    let sustain = generators.value(op::SUSTAIN_VOL_ENV);
    EnvelopeParameter {
        attack_time: time(op::ATTACK_VOL_ENV),
        hold_time: time(op::HOLD_VOL_ENV),
        decay_time: time(op::DECAY_VOL_ENV),
        sustain_level: if sustain >= SILENT_SUSTAIN {
            0.0
        } else {
            10f64.powf(-f64::from(sustain.max(0)) / 200.0)
        },
        release_time: time(op::RELEASE_VOL_ENV),
    }
}

/// Builds the parameters for one instrument zone. `generators` already carries the
/// preset level additions, and `frames` is the length of the sample's PCM data.
pub(crate) fn sample_parameter(
    generators: &GeneratorSet,
    header: &SampleHeader,
    sample_id: SampleId,
    frames: usize,
) -> SampleParameter {
    let sample_start = clamp_frame(
        offset(generators, op::START_ADDRS_OFFSET, op::START_ADDRS_COARSE_OFFSET),
        frames,
    );
    let sample_end = clamp_frame(
        frames as i64 + offset(generators, op::END_ADDRS_OFFSET, op::END_ADDRS_COARSE_OFFSET),
        frames,
    )
    .max(sample_start);

    SampleParameter {
        name: header.name.clone(),
        sample_id,
        pitch: root_pitch(generators, header),
        sample_loop: sample_loop(generators, header, frames),
        sample_start,
        sample_end,
        sample_rate: header.sample_rate,
        envelope: envelope(generators),
        scale_tuning: generators.value(op::SCALE_TUNING) as f32 / 100.0,
        pan: (generators.value(op::PAN) as f32 / 500.0).clamp(-1.0, 1.0),
        exclusive_class: u16::try_from(generators.value(op::EXCLUSIVE_CLASS))
            .ok()
            .filter(|class| *class != 0),
        volume: (1.0 - generators.value(op::INITIAL_ATTENUATION) as f32 / 1000.0).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::records::GeneratorRecord;

    fn header() -> SampleHeader {
        SampleHeader {
            name: "tone".to_string(),
            start: 1000,
            end: 2000,
            loop_start: 1100,
            loop_end: 1900,
            sample_rate: 22050,
            original_pitch: 69,
            pitch_correction: -50,
            sample_type: 1,
        }
    }

    fn generators(records: &[(u16, i16)]) -> GeneratorSet {
        let records: Vec<GeneratorRecord> = records
            .iter()
            .map(|&(operator, amount)| GeneratorRecord {
                operator,
                amount: amount as u16,
            })
            .collect();
        GeneratorSet::from_records(&records)
    }

    #[test]
    fn test_defaults() {
        let parameter = sample_parameter(&GeneratorSet::default(), &header(), 7, 1000);

        assert_eq!(parameter.sample_id, 7);
        assert_eq!(parameter.name, "tone");
        assert_eq!(parameter.pitch, 69.5);
        assert_eq!(parameter.sample_start, 0);
        assert_eq!(parameter.sample_end, 1000);
        assert_eq!(parameter.sample_loop, SampleLoop::None);
        assert_eq!(parameter.sample_rate, 22050);
        assert_eq!(parameter.scale_tuning, 1.0);
        assert_eq!(parameter.volume, 1.0);
        assert_eq!(parameter.exclusive_class, None);
        assert_eq!(parameter.envelope.sustain_level, 1.0);
        assert_eq!(parameter.envelope.attack_time, 2f64.powf(-10.0));
    }

    #[test]
    fn test_pitch_and_tuning() {
        let parameter = sample_parameter(
            &generators(&[
                (op::OVERRIDING_ROOT_KEY, 60),
                (op::COARSE_TUNE, 2),
                (op::FINE_TUNE, 25),
                (op::SCALE_TUNING, 50),
            ]),
            &header(),
            0,
            1000,
        );
        assert_eq!(parameter.pitch, 60.0 - 2.25 + 0.5);
        assert_eq!(parameter.scale_tuning, 0.5);
    }

    #[test]
    fn test_loop_modes_and_offsets() {
        let continuous = sample_parameter(
            &generators(&[(op::SAMPLE_MODES, 1), (op::START_LOOP_ADDRS_OFFSET, 10)]),
            &header(),
            0,
            1000,
        );
        assert_eq!(
            continuous.sample_loop,
            SampleLoop::Continuous { start: 110, end: 900 }
        );

        let until_release =
            sample_parameter(&generators(&[(op::SAMPLE_MODES, 3)]), &header(), 0, 1000);
        assert_eq!(
            until_release.sample_loop,
            SampleLoop::UntilRelease { start: 100, end: 900 }
        );

        let inverted = sample_parameter(
            &generators(&[(op::SAMPLE_MODES, 1), (op::END_LOOP_ADDRS_OFFSET, -850)]),
            &header(),
            0,
            1000,
        );
        assert_eq!(inverted.sample_loop, SampleLoop::None);

        let trimmed = sample_parameter(
            &generators(&[(op::START_ADDRS_OFFSET, 20), (op::END_ADDRS_OFFSET, -30)]),
            &header(),
            0,
            1000,
        );
        assert_eq!((trimmed.sample_start, trimmed.sample_end), (20, 970));
    }

    #[test]
    fn test_levels() {
        let parameter = sample_parameter(
            &generators(&[
                (op::PAN, -250),
                (op::INITIAL_ATTENUATION, 200),
                (op::SUSTAIN_VOL_ENV, 200),
                (op::RELEASE_VOL_ENV, 1200),
                (op::EXCLUSIVE_CLASS, 5),
            ]),
            &header(),
            0,
            1000,
        );
        assert_eq!(parameter.pan, -0.5);
        assert!((parameter.volume - 0.8).abs() < 1e-6);
        assert!((parameter.envelope.sustain_level - 0.1).abs() < 1e-9);
        assert_eq!(parameter.envelope.release_time, 2.0);
        assert_eq!(parameter.exclusive_class, Some(5));

        let silent =
            sample_parameter(&generators(&[(op::SUSTAIN_VOL_ENV, 1000)]), &header(), 0, 1000);
        assert_eq!(silent.envelope.sustain_level, 0.0);
    }
}

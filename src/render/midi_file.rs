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

//! Standard MIDI File to frame-delayed channel events.
//!
//! Tick timing lives here and nowhere else. Tracks are merged by absolute tick and
//! converted to frames with a tempo map that accumulates across tempo changes.

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::synth::{ChannelEvent, DelayedEvent};

/// Tempo assumed until the first tempo event, in microseconds per beat.
const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, thiserror::Error)]
pub enum MidiFileError {
    #[error("MIDI parse error: {0}")]
    Parse(#[from] midly::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid timing: {0} ticks per beat")]
    InvalidTiming(u16),
}

/// Seconds per tick, which only changes for metrical timing.
enum Clock {
    Metrical { ticks_per_beat: f64, seconds_per_tick: f64 },
    Timecode { seconds_per_tick: f64 },
}

impl Clock {
    fn new(timing: Timing) -> Result<Clock, MidiFileError> {
        match timing {
            Timing::Metrical(ticks) => {
                let ticks_per_beat = ticks.as_int();
                if ticks_per_beat == 0 {
                    return Err(MidiFileError::InvalidTiming(0));
                }
                let ticks_per_beat = f64::from(ticks_per_beat);
                Ok(Clock::Metrical {
                    ticks_per_beat,
                    seconds_per_tick: f64::from(DEFAULT_TEMPO) / 1_000_000.0 / ticks_per_beat,
                })
            }
            Timing::Timecode(fps, subframes) => Ok(Clock::Timecode {
                seconds_per_tick: 1.0 / (f64::from(fps.as_f32()) * f64::from(subframes.max(1))),
            }),
        }
    }

    fn seconds_per_tick(&self) -> f64 {
        match self {
            Clock::Metrical {
                seconds_per_tick, ..
            }
            | Clock::Timecode { seconds_per_tick } => *seconds_per_tick,
        }
    }

    /// Applies a tempo change. Timecode files ignore tempo.
    fn set_tempo(&mut self, microseconds_per_beat: u32) {
        if let Clock::Metrical {
            ticks_per_beat,
            seconds_per_tick,
        } = self
        {
            *seconds_per_tick = f64::from(microseconds_per_beat) / 1_000_000.0 / *ticks_per_beat;
        }
    }
}

/// The channel events of a MIDI file, delayed from the start of the song.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiSong {
    /// Sorted by delay, ties in file order.
    pub events: Vec<DelayedEvent>,
    /// The frame the last track ends on.
    pub end_frame: u64,
}

impl MidiSong {
    pub fn from_file(path: &Path, sample_rate: u32) -> Result<MidiSong, MidiFileError> {
        let data = std::fs::read(path)?;
        MidiSong::parse(&data, sample_rate)
    }

    pub fn parse(data: &[u8], sample_rate: u32) -> Result<MidiSong, MidiFileError> {
        let smf = Smf::parse(data)?;
        let mut clock = Clock::new(smf.header.timing)?;

        // (absolute tick, track, kind). Sorting is stable, so same-tick events keep
        // track order and order within a track.
        let mut merged = Vec::new();
        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u64;
            for event in track {
                tick += u64::from(event.delta.as_int());
                merged.push((tick, track_index, event.kind));
            }
        }
        merged.sort_by_key(|(tick, track, _)| (*tick, *track));

        let sample_rate = f64::from(sample_rate);
        let mut song = MidiSong::default();
        let (mut last_tick, mut seconds) = (0u64, 0f64);
        for (tick, track, kind) in merged {
            seconds += (tick - last_tick) as f64 * clock.seconds_per_tick();
            last_tick = tick;
            let frame = (seconds * sample_rate).round() as u64;
            song.end_frame = song.end_frame.max(frame);

            match kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match channel_event(channel, message) {
                        Some(event) => song.events.push(DelayedEvent::new(event, frame)),
                        None => debug!(
                            track,
                            channel,
                            message = ?message,
                            "Skipping unsupported channel message"
                        ),
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    clock.set_tempo(tempo.as_int())
                }
                TrackEventKind::Meta(MetaMessage::EndOfTrack) => {}
                TrackEventKind::Meta(meta) => debug!(track, meta = ?meta, "Skipping meta event"),
                TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {
                    debug!(track, "Skipping system exclusive event")
                }
            }
        }

        Ok(song)
    }
}

fn channel_event(channel: u8, message: MidiMessage) -> Option<ChannelEvent> {
    Some(match message {
        MidiMessage::NoteOn { key, vel } => ChannelEvent::NoteOn {
            channel,
            pitch: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, .. } => ChannelEvent::NoteOff {
            channel,
            pitch: key.as_int(),
        },
        MidiMessage::Controller { controller, value } => ChannelEvent::ControlChange {
            channel,
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => ChannelEvent::ProgramChange {
            channel,
            program: program.as_int(),
        },
        MidiMessage::PitchBend { bend } => ChannelEvent::PitchBend {
            channel,
            value: bend.0.as_int(),
        },
        MidiMessage::Aftertouch { .. } | MidiMessage::ChannelAftertouch { .. } => return None,
    })
}

#[cfg(test)]
mod tests {
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    use super::*;

    fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind,
        }
    }

    fn note_on(delta: u32, channel: u8, key: u8) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(100),
                },
            },
        )
    }

    fn tempo(delta: u32, microseconds_per_beat: u32) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(microseconds_per_beat))),
        )
    }

    fn end(delta: u32) -> TrackEvent<'static> {
        event(delta, TrackEventKind::Meta(MetaMessage::EndOfTrack))
    }

    fn write(timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let format = if tracks.len() == 1 {
            Format::SingleTrack
        } else {
            Format::Parallel
        };
        let mut smf = Smf::new(Header::new(format, timing));
        smf.tracks = tracks;
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    fn delays(song: &MidiSong) -> Vec<(u64, u8)> {
        song.events
            .iter()
            .map(|event| match event.event {
                ChannelEvent::NoteOn { pitch, .. } => (event.delay, pitch),
                _ => (event.delay, 0),
            })
            .collect()
    }

    #[test]
    fn test_default_tempo() {
        let bytes = write(
            Timing::Metrical(u15::new(480)),
            vec![vec![note_on(0, 0, 60), note_on(480, 0, 62), end(480)]],
        );
        let song = MidiSong::parse(&bytes, 44100).unwrap();

        // One beat at 120 bpm is half a second.
        assert_eq!(delays(&song), vec![(0, 60), (22050, 62)]);
        assert_eq!(song.end_frame, 44100);
    }

    #[test]
    fn test_tempo_changes_accumulate() {
        let bytes = write(
            Timing::Metrical(u15::new(100)),
            vec![
                vec![tempo(0, 1_000_000), tempo(100, 250_000), end(0)],
                vec![note_on(100, 1, 60), note_on(100, 1, 61), end(0)],
            ],
        );
        let song = MidiSong::parse(&bytes, 1000).unwrap();

        // First beat at one second, second beat at a quarter second.
        assert_eq!(delays(&song), vec![(1000, 60), (1250, 61)]);
        assert_eq!(song.events[0].event.channel(), 1);
    }

    #[test]
    fn test_timecode_timing() {
        let bytes = write(
            Timing::Timecode(midly::Fps::Fps25, 40),
            vec![vec![note_on(0, 0, 60), note_on(500, 0, 64), end(0)]],
        );
        let song = MidiSong::parse(&bytes, 48000).unwrap();

        // 1000 ticks per second.
        assert_eq!(delays(&song), vec![(0, 60), (24000, 64)]);
    }

    #[test]
    fn test_unsupported_messages_are_skipped() {
        let aftertouch = event(
            0,
            TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::ChannelAftertouch { vel: u7::new(10) },
            },
        );
        let bytes = write(
            Timing::Metrical(u15::new(96)),
            vec![vec![aftertouch, note_on(0, 0, 60), end(0)]],
        );
        let song = MidiSong::parse(&bytes, 44100).unwrap();
        assert_eq!(song.events.len(), 1);
    }

    #[test]
    fn test_invalid_data() {
        assert!(matches!(
            MidiSong::parse(b"not a midi file", 44100),
            Err(MidiFileError::Parse(_))
        ));
    }
}

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

//! Messages that cross from the control thread into the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, SendError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use super::sample::{SampleParameter, SampleRange};

/// Identifies a block of PCM data shared by every zone that plays it.
pub type SampleId = u32;

/// A MIDI-style channel event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// 14 bit, centered on 0x2000.
    PitchBend { channel: u8, value: u16 },
}

impl ChannelEvent {
    /// The channel this event is addressed to.
    pub fn channel(&self) -> u8 {
        match *self {
            ChannelEvent::NoteOn { channel, .. }
            | ChannelEvent::NoteOff { channel, .. }
            | ChannelEvent::ControlChange { channel, .. }
            | ChannelEvent::ProgramChange { channel, .. }
            | ChannelEvent::PitchBend { channel, .. } => channel,
        }
    }
}

/// A channel event that becomes due `delay` frames after the engine receives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedEvent {
    /// The event to dispatch.
    pub event: ChannelEvent,
    /// Frames between receipt and dispatch.
    pub delay: u64,
}

impl DelayedEvent {
    pub fn new(event: ChannelEvent, delay: u64) -> DelayedEvent {
        DelayedEvent { event, delay }
    }

    /// Returns the same event with its delay shifted by `offset` frames.
    pub fn shifted(self, offset: i64) -> DelayedEvent {
        DelayedEvent {
            event: self.event,
            delay: self.delay.saturating_add_signed(offset),
        }
    }
}

/// Events applied as soon as the engine drains them.
#[derive(Clone)]
pub enum ImmediateEvent {
    /// Registers PCM data under an id.
    LoadSample { sample_id: SampleId, data: Arc<[f32]> },
    /// Maps a zone into the sample table.
    LoadSampleParameter {
        parameter: Arc<SampleParameter>,
        range: SampleRange,
    },
}

impl std::fmt::Debug for ImmediateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmediateEvent::LoadSample { sample_id, data } => f
                .debug_struct("LoadSample")
                .field("sample_id", sample_id)
                .field("frames", &data.len())
                .finish(),
            ImmediateEvent::LoadSampleParameter { parameter, range } => f
                .debug_struct("LoadSampleParameter")
                .field("name", &parameter.name)
                .field("range", range)
                .finish(),
        }
    }
}

/// Everything the engine accepts.
#[derive(Clone, Debug)]
pub enum SynthEvent {
    Immediate(ImmediateEvent),
    Delayed(DelayedEvent),
}

impl From<ImmediateEvent> for SynthEvent {
    fn from(event: ImmediateEvent) -> Self {
        SynthEvent::Immediate(event)
    }
}

impl From<DelayedEvent> for SynthEvent {
    fn from(event: DelayedEvent) -> Self {
        SynthEvent::Delayed(event)
    }
}

/// An event stamped with its receipt order.
#[derive(Clone, Debug)]
pub struct SynthMessage {
    /// Monotonically increasing per sender.
    pub sequence: u64,
    pub event: SynthEvent,
}

/// The engine's end of the message channel.
pub type MessageReceiver = Receiver<SynthMessage>;

/// The control thread's end of the message channel.
///
/// Stamps each event with the next sequence number.
#[derive(Clone)]
pub struct SynthSender {
    tx: Sender<SynthMessage>,
    sequence: Arc<AtomicU64>,
}

impl SynthSender {
    fn stamp(&self, event: SynthEvent) -> SynthMessage {
        SynthMessage {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            event,
        }
    }

    /// Sends an event, blocking while the channel is full.
    pub fn send(&self, event: impl Into<SynthEvent>) -> Result<(), SynthEvent> {
        self.tx
            .send(self.stamp(event.into()))
            .map_err(|SendError(message)| message.event)
    }

    /// Sends an event if there is room. The event is handed back otherwise.
    pub fn try_send(&self, event: impl Into<SynthEvent>) -> Result<(), SynthEvent> {
        self.tx.try_send(self.stamp(event.into())).map_err(|e| match e {
            TrySendError::Full(message) | TrySendError::Disconnected(message) => message.event,
        })
    }

    /// Number of messages waiting for the engine.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl std::fmt::Debug for SynthSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthSender")
            .field("pending", &self.tx.len())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

/// Creates the bounded channel that feeds an engine.
pub fn message_channel(capacity: usize) -> (SynthSender, MessageReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (
        SynthSender {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

/// A read-only view of the engine's frame counter.
#[derive(Clone, Debug, Default)]
pub struct FrameClock(Arc<AtomicU64>);

impl FrameClock {
    /// The number of frames the engine has rendered.
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn store(&self, frame: u64) {
        self.0.store(frame, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_stamps_sequence() {
        let (tx, rx) = message_channel(4);
        let note = ChannelEvent::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 100,
        };
        tx.send(DelayedEvent::new(note, 0)).unwrap();
        tx.send(DelayedEvent::new(note, 10)).unwrap();

        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
    }

    #[test]
    fn test_try_send_returns_event_when_full() {
        let (tx, _rx) = message_channel(1);
        let event = DelayedEvent::new(
            ChannelEvent::NoteOff {
                channel: 1,
                pitch: 64,
            },
            5,
        );
        assert!(tx.try_send(event).is_ok());
        match tx.try_send(event) {
            Err(SynthEvent::Delayed(returned)) => assert_eq!(returned, event),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(tx.pending(), 1);
    }

    #[test]
    fn test_channel_event_serde() {
        let event = ChannelEvent::ControlChange {
            channel: 3,
            controller: 7,
            value: 100,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"control_change","channel":3,"controller":7,"value":100}"#
        );
        assert_eq!(event.channel(), 3);
    }

    #[test]
    fn test_shifted_saturates() {
        let event = DelayedEvent::new(ChannelEvent::ProgramChange { channel: 0, program: 1 }, 10);
        assert_eq!(event.shifted(-20).delay, 0);
        assert_eq!(event.shifted(5).delay, 15);
    }
}

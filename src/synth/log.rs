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

//! Logging for the audio thread.
//!
//! The engine never calls `tracing` directly. It reports small `Copy` records to a
//! [`LogSink`] handed to it at construction time. Sinks that run on the audio thread
//! must not block or allocate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::message::SampleId;

/// A single engine log record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SynthLog {
    /// A note-on found no sample zone.
    MissingSample {
        bank: u16,
        instrument: u8,
        pitch: u8,
        velocity: u8,
    },
    /// A zone references PCM data that was never loaded.
    MissingSampleData { sample_id: SampleId },
    /// PCM data was loaded.
    SampleLoaded { sample_id: SampleId, frames: usize },
    /// A voice was taken over because a voice limit was reached.
    VoiceStolen { channel: u8, pitch: u8 },
    /// An event addressed a channel the engine does not have.
    ChannelOutOfRange { channel: u8 },
    /// A controller number the engine does not handle.
    UnknownController { channel: u8, controller: u8, value: u8 },
    /// Data entry arrived without a registered parameter selected.
    DataEntryWithoutRpn { channel: u8, controller: u8 },
    /// Data entry for a registered parameter the engine does not handle.
    UnsupportedRpn { channel: u8, msb: u8, lsb: u8 },
    /// Pending events were dropped by "all sounds off".
    ScheduledEventsCancelled { channel: u8, count: usize },
}

impl SynthLog {
    /// Emits this record through `tracing`.
    pub fn emit(&self) {
        match *self {
            SynthLog::MissingSample {
                bank,
                instrument,
                pitch,
                velocity,
            } => warn!(bank, instrument, pitch, velocity, "No sample for note"),
            SynthLog::MissingSampleData { sample_id } => {
                warn!(sample_id, "Sample data not loaded")
            }
            SynthLog::SampleLoaded { sample_id, frames } => {
                debug!(sample_id, frames, "Sample loaded")
            }
            SynthLog::VoiceStolen { channel, pitch } => {
                debug!(channel, pitch, "Voice limit reached, stealing voice")
            }
            SynthLog::ChannelOutOfRange { channel } => {
                warn!(channel, "Event for unknown channel")
            }
            SynthLog::UnknownController {
                channel,
                controller,
                value,
            } => warn!(channel, controller, value, "Unhandled controller"),
            SynthLog::DataEntryWithoutRpn {
                channel,
                controller,
            } => warn!(channel, controller, "Data entry without RPN selected"),
            SynthLog::UnsupportedRpn { channel, msb, lsb } => {
                warn!(channel, msb, lsb, "Unsupported RPN")
            }
            SynthLog::ScheduledEventsCancelled { channel, count } => {
                info!(channel, count, "Pending events cancelled")
            }
        }
    }
}

/// Receives log records from the engine.
pub trait LogSink: Send {
    fn log(&mut self, record: SynthLog);
}

/// Drops every record. The engine's default.
#[derive(Debug, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&mut self, _record: SynthLog) {}
}

/// Emits records through `tracing` as they arrive.
///
/// Only suitable off the audio thread (offline rendering, tests).
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, record: SynthLog) {
        record.emit();
    }
}

/// Pushes records into a bounded channel without blocking.
///
/// Records that don't fit are counted and dropped.
pub struct ChannelSink {
    /// Sending half of the log ring.
    tx: Sender<SynthLog>,
    /// Number of records dropped because the ring was full.
    dropped: Arc<AtomicU64>,
}

impl LogSink for ChannelSink {
    fn log(&mut self, record: SynthLog) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Forwards records queued by a [`ChannelSink`] to `tracing`.
pub struct LogDrain {
    /// Receiving half of the log ring.
    rx: Receiver<SynthLog>,
    /// Shared with the sink.
    dropped: Arc<AtomicU64>,
}

impl LogDrain {
    /// Emits every queued record. Returns the number emitted.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(record) = self.rx.try_recv() {
            record.emit();
            count += 1;
        }
        self.report_dropped();
        count
    }

    /// Emits records on a background thread until the sink is dropped.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while let Ok(record) = self.rx.recv() {
                record.emit();
                self.report_dropped();
            }
        })
    }

    /// Returns the number of records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn report_dropped(&self) {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped, "Engine log ring overflowed");
        }
    }
}

/// Creates a real-time safe sink and the drain that empties it.
pub fn log_channel(capacity: usize) -> (ChannelSink, LogDrain) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ChannelSink {
            tx,
            dropped: dropped.clone(),
        },
        LogDrain { rx, dropped },
    )
}

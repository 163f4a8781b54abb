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

//! Real-time wavetable synthesis.
//!
//! [`SynthEngine`] owns every piece of synthesis state and is driven a buffer at a
//! time. Other threads talk to it through [`message_channel`].

pub mod channel;
pub mod controller;
pub mod engine;
pub mod envelope;
pub mod lfo;
pub mod log;
pub mod message;
pub mod oscillator;
pub mod sample;
pub mod sample_table;
pub mod scheduler;
pub mod voice;


pub use engine::{EngineSettings, SynthEngine};
pub use envelope::EnvelopeParameter;
pub use log::{log_channel, ChannelSink, LogDrain, LogSink, NoopSink, SynthLog, TracingSink};
pub use message::{
    message_channel, ChannelEvent, DelayedEvent, FrameClock, ImmediateEvent, MessageReceiver,
    SampleId, SynthEvent, SynthMessage, SynthSender,
};
pub use sample::{SampleLoop, SampleParameter, SampleRange};

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

//! The synthesizer engine.
//!
//! `process` is called from the audio callback. It drains pending messages once,
//! then renders the buffer in slices split at the frames scheduled events fall on,
//! so every event takes effect on the exact frame it is due.

use std::collections::HashMap;
use std::sync::Arc;

use super::channel::{ChannelState, CHANNEL_COUNT};
use super::controller::{ControllerAction, ControllerState};
use super::log::{LogSink, NoopSink, SynthLog};
use super::message::{
    ChannelEvent, DelayedEvent, FrameClock, ImmediateEvent, MessageReceiver, SampleId,
    SynthEvent, SynthMessage,
};
use super::oscillator::{ChannelMix, WavetableOscillator};
use super::sample_table::SampleTable;
use super::scheduler::EventScheduler;
use super::voice::VoicePool;
use crate::config::SynthConfig;

/// Engine construction parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Voice slots allocated up front.
    pub max_voices: usize,
    /// Voices any one channel may hold.
    pub max_voices_per_channel: usize,
    /// Gain applied to the final mix.
    pub master_volume: f32,
    /// Retry missing banks against bank 0 (or 128 for percussion).
    pub bank_fallback: bool,
    /// Pending events the scheduler has room for before it grows.
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings::from(&SynthConfig::default())
    }
}

impl From<&SynthConfig> for EngineSettings {
    fn from(config: &SynthConfig) -> Self {
        EngineSettings {
            sample_rate: config.sample_rate(),
            max_voices: config.max_voices(),
            max_voices_per_channel: config.max_voices_per_channel(),
            master_volume: config.master_volume(),
            bank_fallback: config.bank_fallback(),
            event_capacity: config.message_capacity(),
        }
    }
}

/// A polyphonic wavetable synthesizer.
pub struct SynthEngine {
    sample_rate: u32,
    master_volume: f32,
    /// Frames rendered so far.
    current_frame: u64,
    /// Published copy of `current_frame`.
    clock: FrameClock,
    channels: [ChannelState; CHANNEL_COUNT],
    controllers: [ControllerState; CHANNEL_COUNT],
    sample_table: SampleTable,
    /// PCM blocks by id.
    samples: HashMap<SampleId, Arc<[f32]>>,
    scheduler: EventScheduler<ChannelEvent>,
    voices: VoicePool,
    /// Messages from the control thread.
    receiver: Option<MessageReceiver>,
    /// Sequence for events added directly. Kept ahead of received messages.
    next_sequence: u64,
    log: Box<dyn LogSink>,
}

impl SynthEngine {
    pub fn new(settings: EngineSettings) -> SynthEngine {
        SynthEngine {
            sample_rate: settings.sample_rate.max(1),
            master_volume: settings.master_volume,
            current_frame: 0,
            clock: FrameClock::default(),
            channels: std::array::from_fn(|channel| ChannelState::new(channel as u8)),
            controllers: std::array::from_fn(|_| ControllerState::new()),
            sample_table: SampleTable::new(settings.bank_fallback),
            samples: HashMap::new(),
            scheduler: EventScheduler::with_capacity(settings.event_capacity),
            voices: VoicePool::new(settings.max_voices, settings.max_voices_per_channel),
            receiver: None,
            next_sequence: 0,
            log: Box::new(NoopSink),
        }
    }

    /// Replaces the log sink.
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> SynthEngine {
        self.log = Box::new(sink);
        self
    }

    /// Attaches the channel `process` drains.
    pub fn with_receiver(mut self, receiver: MessageReceiver) -> SynthEngine {
        self.receiver = Some(receiver);
        self
    }

    /// Adds an event from the thread that owns the engine.
    pub fn add_event(&mut self, event: impl Into<SynthEvent>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.handle_event(event.into(), sequence);
    }

    /// Applies a message as if it had arrived on the channel.
    pub fn handle_message(&mut self, message: SynthMessage) {
        self.next_sequence = self.next_sequence.max(message.sequence + 1);
        self.handle_event(message.event, message.sequence);
    }

    fn handle_event(&mut self, event: SynthEvent, sequence: u64) {
        match event {
            SynthEvent::Immediate(ImmediateEvent::LoadSample { sample_id, data }) => {
                self.log.log(SynthLog::SampleLoaded {
                    sample_id,
                    frames: data.len(),
                });
                self.samples.insert(sample_id, data);
            }
            SynthEvent::Immediate(ImmediateEvent::LoadSampleParameter { parameter, range }) => {
                self.sample_table.insert(parameter, range);
            }
            SynthEvent::Delayed(DelayedEvent { event, delay }) => {
                if let Some(event) = self.scheduler.schedule(event, delay, sequence) {
                    self.dispatch(event);
                }
            }
        }
    }

    /// Renders the next block. Both buffers are overwritten.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        left.fill(0.0);
        right.fill(0.0);

        self.scheduler.advance_to(self.current_frame);
        self.drain_messages();

        let mut offset = 0;
        while offset < frames {
            let frame = self.current_frame + offset as u64;
            self.scheduler.advance_to(frame);
            while let Some(event) = self.scheduler.pop_due() {
                self.dispatch(event);
            }

            let end = match self.scheduler.next_due_frame() {
                Some(due) => frames.min(offset + (due - frame) as usize),
                None => frames,
            };
            self.render(&mut left[offset..end], &mut right[offset..end]);
            offset = end;
        }

        self.voices.retain_playing();

        for sample in left[..frames].iter_mut().chain(right[..frames].iter_mut()) {
            *sample *= self.master_volume;
        }

        self.current_frame += frames as u64;
        self.scheduler.advance_to(self.current_frame);
        self.clock.store(self.current_frame);
    }

    fn drain_messages(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        // Only what is queued now, so a busy producer can't hold up the buffer.
        let pending = receiver.len();
        for message in receiver.try_iter().take(pending) {
            self.handle_message(message);
        }
        self.receiver = Some(receiver);
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let mixes: [ChannelMix; CHANNEL_COUNT] =
            std::array::from_fn(|channel| self.channels[channel].mix());
        for voice in self.voices.iter_mut() {
            let mix = &mixes[usize::from(voice.channel())];
            voice.oscillator_mut().process(left, right, mix);
        }
    }

    fn dispatch(&mut self, event: ChannelEvent) {
        let channel = event.channel();
        if usize::from(channel) >= CHANNEL_COUNT {
            self.log.log(SynthLog::ChannelOutOfRange { channel });
            return;
        }

        match event {
            ChannelEvent::NoteOn {
                pitch, velocity: 0, ..
            } => self.note_off(channel, pitch),
            ChannelEvent::NoteOn {
                pitch, velocity, ..
            } => self.note_on(channel, pitch, velocity),
            ChannelEvent::NoteOff { pitch, .. } => self.note_off(channel, pitch),
            ChannelEvent::ControlChange {
                controller, value, ..
            } => self.control_change(channel, controller, value),
            ChannelEvent::ProgramChange { program, .. } => {
                self.channels[usize::from(channel)].instrument = program;
            }
            ChannelEvent::PitchBend { value, .. } => {
                self.channels[usize::from(channel)].pitch_bend = value.min(0x3FFF);
            }
        }
    }

    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        let state = &self.channels[usize::from(channel)];
        let bank = state.effective_bank();
        let instrument = state.instrument;
        // Voices started by this note-on are exempt from its own choke.
        let first_serial = self.voices.next_serial();

        let mut found = false;
        for parameter in self.sample_table.lookup(bank, instrument, pitch, velocity) {
            found = true;
            let Some(data) = self.samples.get(&parameter.sample_id) else {
                self.log.log(SynthLog::MissingSampleData {
                    sample_id: parameter.sample_id,
                });
                continue;
            };

            if let Some(class) = parameter.exclusive_class {
                for voice in self.voices.iter_channel_mut(channel) {
                    if voice.serial() < first_serial
                        && voice.oscillator().exclusive_class() == Some(class)
                    {
                        voice.oscillator_mut().force_stop();
                    }
                }
            }

            let mut oscillator =
                WavetableOscillator::new(parameter.clone(), data.clone(), self.sample_rate);
            oscillator.note_on(pitch, velocity);
            if let Some(stolen) = self.voices.add_voice(channel, pitch, oscillator) {
                self.log.log(SynthLog::VoiceStolen {
                    channel: stolen.channel,
                    pitch: stolen.pitch,
                });
            }
        }

        if !found {
            self.log.log(SynthLog::MissingSample {
                bank,
                instrument,
                pitch,
                velocity,
            });
        }
    }

    fn note_off(&mut self, channel: u8, pitch: u8) {
        let hold = self.channels[usize::from(channel)].hold;
        release_voices(&mut self.voices, channel, Some(pitch), hold);
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        let index = usize::from(channel);
        let action = self.controllers[index].apply(controller, value);
        let state = &mut self.channels[index];

        match action {
            ControllerAction::None => {}
            ControllerAction::BankSelect(bank) => state.bank = bank,
            ControllerAction::Modulation(value) => state.set_modulation(value),
            ControllerAction::Volume(value) => state.set_volume(value),
            ControllerAction::Pan(value) => state.set_pan(value),
            ControllerAction::Expression(value) => state.set_expression(value),
            ControllerAction::Hold(hold) => {
                state.hold = hold;
                if !hold {
                    release_held(&mut self.voices, channel);
                }
            }
            ControllerAction::PitchBendSensitivity(semitones) => {
                state.pitch_bend_sensitivity = semitones;
            }
            ControllerAction::FineTuning(semitones) => state.fine_tuning = semitones,
            ControllerAction::CoarseTuning(semitones) => state.coarse_tuning = semitones,
            ControllerAction::AllSoundsOff => {
                let count = self.scheduler.cancel(|event| event.channel() == channel);
                if count > 0 {
                    self.log
                        .log(SynthLog::ScheduledEventsCancelled { channel, count });
                }
                for voice in self.voices.iter_channel_mut(channel) {
                    voice.oscillator_mut().force_stop();
                }
            }
            ControllerAction::AllNotesOff => {
                release_voices(&mut self.voices, channel, None, state.hold);
            }
            ControllerAction::ResetControllers => {
                state.reset();
                release_held(&mut self.voices, channel);
            }
            ControllerAction::Unknown => self.log.log(SynthLog::UnknownController {
                channel,
                controller,
                value,
            }),
            ControllerAction::DataEntryWithoutRpn => {
                self.log.log(SynthLog::DataEntryWithoutRpn {
                    channel,
                    controller,
                })
            }
            ControllerAction::UnsupportedRpn { msb, lsb } => {
                self.log
                    .log(SynthLog::UnsupportedRpn { channel, msb, lsb })
            }
        }
    }

    /// A clock other threads can read the frame counter from.
    pub fn clock(&self) -> FrameClock {
        self.clock.clone()
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// State for a channel, if the engine has it.
    pub fn channel(&self, channel: u8) -> Option<&ChannelState> {
        self.channels.get(usize::from(channel))
    }

    pub fn sample_table(&self) -> &SampleTable {
        &self.sample_table
    }

    #[cfg(test)]
    pub(crate) fn voices(&mut self) -> &mut VoicePool {
        &mut self.voices
    }

    /// No voices are sounding and nothing is scheduled.
    pub fn is_idle(&self) -> bool {
        self.voices.active_count() == 0 && self.scheduler.is_empty()
    }
}

/// Note-off for the channel's voices on `pitch`, or all of them. Held voices wait
/// for the pedal.
fn release_voices(voices: &mut VoicePool, channel: u8, pitch: Option<u8>, hold: bool) {
    for voice in voices.iter_channel_mut(channel) {
        if pitch.is_some_and(|pitch| !voice.matches_note_off(channel, pitch))
            || voice.oscillator().is_note_off()
        {
            continue;
        }
        if hold {
            voice.set_held(true);
        } else {
            voice.oscillator_mut().note_off();
        }
    }
}

/// Releases voices waiting on the hold pedal.
fn release_held(voices: &mut VoicePool, channel: u8) {
    for voice in voices.iter_channel_mut(channel) {
        if voice.is_held() {
            voice.set_held(false);
            voice.oscillator_mut().note_off();
        }
    }
}

impl std::fmt::Debug for SynthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthEngine")
            .field("sample_rate", &self.sample_rate)
            .field("current_frame", &self.current_frame)
            .field("samples", &self.samples.len())
            .field("sample_table", &self.sample_table)
            .field("scheduler", &self.scheduler)
            .field("voices", &self.voices)
            .finish()
    }
}

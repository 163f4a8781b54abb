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

//! Feeds a song to an engine running on another thread.
//!
//! The engine only learns about events a short window ahead of the frame they are
//! due on. Each event's delay is computed against the engine clock at the moment
//! it is sent.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::playsync::CancelHandle;
use crate::soundfont::SoundFont;
use crate::synth::controller::ALL_SOUNDS_OFF;
use crate::synth::{ChannelEvent, DelayedEvent, FrameClock, SynthSender};

/// Longest the pacing loop sleeps between checks.
const MAX_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("the engine stopped receiving messages")]
    Disconnected,

    #[error("playback cancelled")]
    Cancelled,
}

/// Paces events into an engine's message channel.
pub struct Player {
    sender: SynthSender,
    clock: FrameClock,
    sample_rate: u32,
    /// Frames ahead of the clock an event may be sent.
    lookahead: u64,
    poll: Duration,
}

impl Player {
    pub fn new(sender: SynthSender, clock: FrameClock, sample_rate: u32, lookahead: Duration) -> Player {
        let lookahead_frames = (lookahead.as_secs_f64() * f64::from(sample_rate)).round() as u64;
        Player {
            sender,
            clock,
            sample_rate,
            lookahead: lookahead_frames,
            poll: (lookahead / 4).clamp(Duration::from_millis(1), MAX_POLL),
        }
    }

    /// Sends every sample and zone in the bank. Returns the number of events sent.
    pub fn load_bank(&self, soundfont: SoundFont) -> Result<usize, PlayerError> {
        let name = soundfont.name().to_string();
        let events = soundfont.into_events();
        let count = events.len();
        for event in events {
            self.sender.send(event).map_err(|_| PlayerError::Disconnected)?;
        }
        info!(soundfont = %name, events = count, "Sent sample bank to engine");
        Ok(count)
    }

    /// Plays events whose delays count from the moment playback starts. Returns once
    /// the engine clock passes the last event.
    ///
    /// On cancel every channel gets an all sounds off.
    pub fn play(&self, events: &[DelayedEvent], cancel: &CancelHandle) -> Result<(), PlayerError> {
        let start = self.clock.now();
        let end = start + events.iter().map(|event| event.delay).max().unwrap_or(0);
        info!(
            events = events.len(),
            seconds = (end - start) as f64 / f64::from(self.sample_rate),
            "Starting playback"
        );

        let mut next = 0;
        loop {
            if cancel.is_cancelled() {
                self.silence()?;
                return Err(PlayerError::Cancelled);
            }

            let now = self.clock.now();
            while let Some(event) = events.get(next) {
                let due = start + event.delay;
                if due > now + self.lookahead {
                    break;
                }
                if due < now {
                    debug!(late = now - due, "Event sent after its due frame");
                }
                self.sender
                    .send(DelayedEvent::new(event.event, due.saturating_sub(now)))
                    .map_err(|_| PlayerError::Disconnected)?;
                next += 1;
            }

            if next == events.len() && now >= end {
                info!("Playback finished");
                return Ok(());
            }
            spin_sleep::sleep(self.poll);
        }
    }

    /// Sends all sounds off to every channel, due immediately.
    pub fn silence(&self) -> Result<(), PlayerError> {
        for channel in 0..16 {
            let event = ChannelEvent::ControlChange {
                channel,
                controller: ALL_SOUNDS_OFF,
                value: 0,
            };
            if self.sender.try_send(DelayedEvent::new(event, 0)).is_err() {
                warn!(channel, "Unable to send all sounds off");
                self.sender
                    .send(DelayedEvent::new(event, 0))
                    .map_err(|_| PlayerError::Disconnected)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("sample_rate", &self.sample_rate)
            .field("lookahead", &self.lookahead)
            .field("clock", &self.clock.now())
            .finish()
    }
}

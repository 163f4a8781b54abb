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

use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;
use super::parse_duration;

const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(200);

/// Real-time playback settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// The output device. The host default is used when unset.
    device: Option<String>,

    /// How far ahead of the audio clock events are sent to the engine.
    lookahead: Option<String>,
}

impl Playback {
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the look-ahead window (default: 200ms)
    pub fn lookahead(&self) -> Result<Duration, ConfigError> {
        match &self.lookahead {
            Some(lookahead) => parse_duration("playback.lookahead", lookahead),
            None => Ok(DEFAULT_LOOKAHEAD),
        }
    }
}

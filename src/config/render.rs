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

const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PROGRESS_INTERVAL: usize = 64;

/// Offline rendering settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Render {
    /// How long to keep rendering after the last event while voices ring out.
    silence_timeout: Option<String>,

    /// Buffers rendered between progress reports and cancellation checks.
    progress_interval: Option<usize>,
}

impl Render {
    /// Returns the silence timeout (default: 5s)
    pub fn silence_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.silence_timeout {
            Some(timeout) => parse_duration("render.silence_timeout", timeout),
            None => Ok(DEFAULT_SILENCE_TIMEOUT),
        }
    }

    /// Returns the progress interval in buffers (default: 64)
    pub fn progress_interval(&self) -> usize {
        self.progress_interval
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL)
            .max(1)
    }
}

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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the audio callback thread when WAVESYNTH_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Parses a priority in 0-99.
fn parse_priority(value: &str) -> Option<ThreadPriorityValue> {
    let priority = value.trim().parse::<u8>().ok()?;
    (priority < 100)
        .then(|| ThreadPriorityValue::try_from(priority).ok())
        .flatten()
}

/// Reads WAVESYNTH_THREAD_PRIORITY (0-99) once, before the stream starts, so the
/// callback never touches the environment.
pub fn callback_thread_priority() -> ThreadPriority {
    std::env::var("WAVESYNTH_THREAD_PRIORITY")
        .ok()
        .and_then(|value| parse_priority(&value))
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).ok())
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

fn is_truthy(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// Returns whether to attempt RT (SCHED_FIFO) scheduling for the audio callback thread.
/// Enabled unless WAVESYNTH_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !std::env::var("WAVESYNTH_DISABLE_RT_AUDIO").is_ok_and(|value| is_truthy(&value))
}

/// Raises the calling thread's priority the first time it is called.
pub fn configure_audio_thread_priority(
    priority: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    if let Err(e) = set_current_thread_priority(priority) {
        warn!(error = ?e, "Failed to raise audio callback thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for audio callback thread"),
            Err(e) => warn!(
                error = %e,
                "Failed to set RT SCHED_FIFO for audio callback thread"
            ),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

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

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared cancellation for long running work: offline renders and real-time playback.
/// Whoever runs the work is responsible for checking it.
#[derive(Clone, Default)]
pub struct CancelHandle {
    /// Set once the work should stop.
    cancelled: Arc<Mutex<bool>>,
    /// Wakes threads waiting on the handle.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.state()
    }

    /// Blocks for up to `timeout`. Returns true if the handle was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (cancelled, _) = self
            .condvar
            .wait_timeout_while(self.state(), timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }

    /// Cancels the work and wakes any waiters.
    pub fn cancel(&self) {
        let mut cancelled = self.state();
        if !*cancelled {
            *cancelled = true;
            self.condvar.notify_all();
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_cancel_wakes_waiter() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait_timeout(Duration::from_secs(30)))
        };

        let start = Instant::now();
        cancel_handle.cancel();
        assert!(join.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(30));
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_wait_times_out() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.wait_timeout(Duration::from_millis(10)));
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancel_is_sticky() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        cancel_handle.cancel();
        assert!(cancel_handle.wait_timeout(Duration::ZERO));
    }
}

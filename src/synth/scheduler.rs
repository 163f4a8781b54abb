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

//! Frame-based event scheduling.
//!
//! Events are kept sorted by (due frame, sequence). Inserts binary search for their
//! slot, dispatch pops from the front.

use std::collections::VecDeque;

/// An event waiting for its frame.
#[derive(Debug)]
struct ScheduledEvent<E> {
    due_frame: u64,
    sequence: u64,
    event: E,
}

impl<E> ScheduledEvent<E> {
    fn key(&self) -> (u64, u64) {
        (self.due_frame, self.sequence)
    }
}

/// Orders events against a monotonically advancing frame counter.
pub struct EventScheduler<E> {
    /// Pending events in (due frame, sequence) order.
    queue: VecDeque<ScheduledEvent<E>>,
    /// The frame events are currently being dispatched for.
    current_frame: u64,
}

impl<E> EventScheduler<E> {
    /// Creates a scheduler with room for `capacity` pending events.
    pub fn with_capacity(capacity: usize) -> EventScheduler<E> {
        EventScheduler {
            queue: VecDeque::with_capacity(capacity),
            current_frame: 0,
        }
    }

    /// Moves the scheduler to the given frame. The frame never goes backwards.
    pub fn advance_to(&mut self, frame: u64) {
        self.current_frame = self.current_frame.max(frame);
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Schedules an event `delay` frames after the current frame.
    ///
    /// An event with no delay is handed straight back for synchronous dispatch,
    /// unless events received before it are already due. In that case it is
    /// queued behind them so receipt order holds.
    pub fn schedule(&mut self, event: E, delay: u64, sequence: u64) -> Option<E> {
        if delay == 0 && !self.has_due() {
            return Some(event);
        }

        let scheduled = ScheduledEvent {
            due_frame: self.current_frame.saturating_add(delay),
            sequence,
            event,
        };
        let key = scheduled.key();
        let index = self.queue.partition_point(|pending| pending.key() <= key);
        self.queue.insert(index, scheduled);
        None
    }

    /// Returns true if an event is due at or before the current frame.
    pub fn has_due(&self) -> bool {
        self.queue
            .front()
            .is_some_and(|pending| pending.due_frame <= self.current_frame)
    }

    /// Pops the next due event, if any.
    pub fn pop_due(&mut self) -> Option<E> {
        if self.has_due() {
            self.queue.pop_front().map(|pending| pending.event)
        } else {
            None
        }
    }

    /// Dispatches every due event in order. Returns the number dispatched.
    pub fn run_due(&mut self, mut handler: impl FnMut(E)) -> usize {
        let mut count = 0;
        while let Some(event) = self.pop_due() {
            handler(event);
            count += 1;
        }
        count
    }

    /// The frame the earliest pending event is due at.
    pub fn next_due_frame(&self) -> Option<u64> {
        self.queue.front().map(|pending| pending.due_frame)
    }

    /// Removes every pending event matching the predicate without dispatching it.
    pub fn cancel(&mut self, mut predicate: impl FnMut(&E) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|pending| !predicate(&pending.event));
        before - self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E> std::fmt::Debug for EventScheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScheduler")
            .field("pending", &self.queue.len())
            .field("current_frame", &self.current_frame)
            .field("next_due_frame", &self.next_due_frame())
            .finish()
    }
}

//! Deferred-event scheduler.
//!
//! A bounded, time-ordered queue of [`Task`]s.  The main loop calls
//! [`EventQueue::process_due`] with the current [`Instant`]; every task
//! whose due time has passed is handed to the caller's dispatcher in
//! due-time order.
//!
//! ```text
//!  PumpService ──schedule(PumpUpdate, now+250ms)──┐
//!  PumpController ──schedule(FloodReset, now+T)───┤
//!                                                 ▼
//!                              ┌──────────────────────────────┐
//!                              │   EventQueue<32> (min-heap)  │
//!                              └──────────────┬───────────────┘
//!                                             │ process_due(now)
//!                                             ▼
//!                               due batch ──▶ dispatcher(task, due, now)
//! ```
//!
//! ## Drain semantics
//!
//! Due events are popped into a transient batch **before** any of them is
//! dispatched.  A dispatcher that schedules new work (the periodic update
//! re-arming itself) therefore never sees that work in the same pass, even
//! when its due time is already in the past.
//!
//! Events with equal due times run in insertion order.

use core::cmp::Ordering;
use core::fmt;

use heapless::binary_heap::{BinaryHeap, Min};
use heapless::Vec;
use log::{debug, warn};

use crate::clock::Instant;

/// Maximum number of concurrently pending events.
pub const MAX_QUEUED_EVENTS: usize = 32;

// ═══════════════════════════════════════════════════════════════
//  Event types
// ═══════════════════════════════════════════════════════════════

/// Deferred actions the firmware can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Run one pump control cycle.
    PumpUpdate,
    /// Lift the flood override.
    FloodReset,
}

/// Returned when an event cannot be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The queue already holds its full capacity of pending events.
    Full,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "event queue full"),
        }
    }
}

/// A pending event.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: Instant,
    /// Insertion sequence; breaks due-time ties first-in first-out.
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Queue
// ═══════════════════════════════════════════════════════════════

/// Fixed-capacity queue of deferred tasks, earliest due first.
///
/// `N` is the hard capacity; scheduling beyond it fails with
/// [`ScheduleError::Full`] and the event is dropped.
pub struct EventQueue<const N: usize = MAX_QUEUED_EVENTS> {
    heap: BinaryHeap<Scheduled, Min, N>,
    next_seq: u64,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queue `task` to run at or after `due`.
    pub fn schedule(&mut self, task: Task, due: Instant) -> Result<(), ScheduleError> {
        let event = Scheduled {
            due,
            seq: self.next_seq,
            task,
        };
        if self.heap.push(event).is_err() {
            warn!("EventQueue: full ({} pending), dropped {:?}", N, task);
            return Err(ScheduleError::Full);
        }
        self.next_seq = self.next_seq.wrapping_add(1);
        debug!("EventQueue: {:?} due at {}ms", task, due.as_millis());
        Ok(())
    }

    /// Dispatch every event due at or before `now`, in due-time order.
    ///
    /// `dispatch` receives the queue itself (so it may schedule follow-up
    /// work), the task, its original due time, and `now`.  Returns the
    /// number of events dispatched.
    pub fn process_due<F>(&mut self, now: Instant, mut dispatch: F) -> usize
    where
        F: FnMut(&mut Self, Task, Instant, Instant),
    {
        let mut batch: Vec<Scheduled, N> = Vec::new();
        while self.heap.peek().is_some_and(|e| e.due <= now) {
            if let Some(event) = self.heap.pop() {
                // Cannot overflow: the heap never holds more than N.
                let _ = batch.push(event);
            }
        }

        for event in &batch {
            dispatch(self, event.task, event.due, now);
        }
        batch.len()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() == N
    }

    /// True if a `task` event is pending.
    pub fn contains(&self, task: Task) -> bool {
        self.heap.iter().any(|e| e.task == task)
    }

    /// Due time of the earliest pending event.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.due)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

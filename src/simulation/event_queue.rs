//! Virtual clock and event queue.
//!
//! The queue is the only source of ordering in the simulation. Events fire in
//! non-decreasing time order; events scheduled for the same instant fire in
//! the order they were scheduled, which keeps runs reproducible.
//!
//! An event is a boxed action receiving the simulation world and the queue
//! itself, so an action can schedule follow-up events (retransmission loops,
//! deliveries) without any recursion.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::time::Duration;

use super::types::SimTime;

/// Errors raised by the event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// An event was scheduled before the current virtual time.
    InvalidDelay { requested: SimTime, now: SimTime },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidDelay { requested, now } => write!(
                f,
                "Invalid delay: event requested at {:.6}s but clock is already at {:.6}s",
                requested.as_secs_f64(),
                now.as_secs_f64()
            ),
        }
    }
}

impl std::error::Error for SimError {}

/// Handle to a scheduled event, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

/// A scheduled action. Receives the world and the queue that dispatched it.
pub type Action<W> = Box<dyn FnOnce(&mut W, &mut EventQueue<W>) -> Result<(), SimError>>;

struct ScheduledEvent<W> {
    time: SimTime,
    sequence: u64,
    action: Action<W>,
}

impl<W> PartialEq for ScheduledEvent<W> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl<W> Eq for ScheduledEvent<W> {}

impl<W> PartialOrd for ScheduledEvent<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<W> Ord for ScheduledEvent<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap: reverse both keys so the earliest time,
        // then the earliest sequence, is popped first.
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

/// Priority queue of time-stamped actions plus the virtual clock.
pub struct EventQueue<W> {
    heap: BinaryHeap<ScheduledEvent<W>>,
    /// Sequences of events that are scheduled and not cancelled.
    pending: HashSet<u64>,
    now: SimTime,
    next_sequence: u64,
    dispatched: u64,
}

impl<W> EventQueue<W> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            now: Duration::ZERO,
            next_sequence: 0,
            dispatched: 0,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events still waiting to fire (cancelled ones excluded).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of actions executed so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Schedule `action` to fire `delay` after the current time.
    pub fn schedule<F>(&mut self, delay: Duration, action: F) -> EventId
    where
        F: FnOnce(&mut W, &mut EventQueue<W>) -> Result<(), SimError> + 'static,
    {
        let time = self.now + delay;
        self.push(time, Box::new(action))
    }

    /// Schedule `action` at an absolute virtual time.
    ///
    /// Fails with [`SimError::InvalidDelay`] when `time` lies in the past.
    pub fn schedule_at<F>(&mut self, time: SimTime, action: F) -> Result<EventId, SimError>
    where
        F: FnOnce(&mut W, &mut EventQueue<W>) -> Result<(), SimError> + 'static,
    {
        if time < self.now {
            return Err(SimError::InvalidDelay { requested: time, now: self.now });
        }
        Ok(self.push(time, Box::new(action)))
    }

    /// Skip a scheduled event. Safe to call on events that already fired or
    /// were already cancelled; returns whether a pending event was removed.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id.0)
    }

    fn push(&mut self, time: SimTime, action: Action<W>) -> EventId {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(sequence);
        self.heap.push(ScheduledEvent { time, sequence, action });
        EventId(sequence)
    }

    /// Pop the next live event, discarding cancelled ones.
    fn pop_live(&mut self) -> Option<ScheduledEvent<W>> {
        while let Some(event) = self.heap.pop() {
            if self.pending.remove(&event.sequence) {
                return Some(event);
            }
        }
        None
    }

    /// Time of the next live event, dropping cancelled entries at the top of the heap.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        while let Some(top) = self.heap.peek() {
            if self.pending.contains(&top.sequence) {
                return Some(top.time);
            }
            self.heap.pop();
        }
        None
    }

    /// Dispatch a single event. Returns `Ok(false)` when the queue is empty.
    pub fn step(&mut self, world: &mut W) -> Result<bool, SimError> {
        let Some(event) = self.pop_live() else {
            return Ok(false);
        };
        self.now = event.time;
        self.dispatched += 1;
        (event.action)(world, self)?;
        Ok(true)
    }

    /// Drain the queue until no events remain.
    pub fn run(&mut self, world: &mut W) -> Result<(), SimError> {
        while self.step(world)? {}
        Ok(())
    }

    /// Dispatch every event firing at or before `horizon`, then move the
    /// clock to `horizon`. Later events stay queued.
    pub fn run_until(&mut self, world: &mut W, horizon: SimTime) -> Result<(), SimError> {
        while let Some(time) = self.peek_time() {
            if time > horizon {
                break;
            }
            self.step(world)?;
        }
        if horizon > self.now {
            self.now = horizon;
        }
        Ok(())
    }
}

impl<W> Default for EventQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for EventQueue<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

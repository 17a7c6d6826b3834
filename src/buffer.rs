use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Why [`FrameBuffer::wait_ready`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least `threshold` items are queued
    Primed,
    /// The producer is done; whatever is queued is all there will be
    ProducerDone,
    /// The session was cancelled
    Cancelled,
}

/// Returned by [`FrameBuffer::push`] once the buffer has been cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

struct State<T> {
    queue: VecDeque<T>,
    producer_done: bool,
    cancelled: bool,
}

/// Bounded FIFO shared by one producer and one consumer.
///
/// The producer blocks while the queue is at capacity. The consumer blocks
/// until enough items are queued or the producer has finished. Both sides
/// are woken by cancellation.
pub struct FrameBuffer<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    changed: Condvar,
    capacity: usize,
}

impl<T> FrameBuffer<T> {
    /// Create a buffer holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.max(1)),
                producer_done: false,
                cancelled: false,
            }),
            not_full: Condvar::new(),
            changed: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail, waiting for room. Fails once cancelled.
    pub fn push(&self, item: T) -> Result<(), Cancelled> {
        let mut state = self.lock();
        while state.queue.len() >= self.capacity && !state.cancelled {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if state.cancelled {
            return Err(Cancelled);
        }
        state.queue.push_back(item);
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Mark the producer as finished (normally or not)
    pub fn finish(&self) {
        self.lock().producer_done = true;
        self.changed.notify_all();
    }

    /// Stop both sides: pending and future pushes fail, waits return
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.changed.notify_all();
        self.not_full.notify_all();
    }

    /// Block until `threshold` items are queued, the producer finished, or
    /// the buffer was cancelled.
    pub fn wait_ready(&self, threshold: usize) -> Readiness {
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return Readiness::Cancelled;
            }
            if state.queue.len() >= threshold {
                return Readiness::Primed;
            }
            if state.producer_done {
                return Readiness::ProducerDone;
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Pop the oldest item if at least `threshold` are queued, or if the
    /// producer is done and anything is left. The flag reports whether the
    /// producer had finished at the time of the pop.
    pub fn pop_ready(&self, threshold: usize) -> Option<(T, bool)> {
        let mut state = self.lock();
        if state.cancelled {
            return None;
        }
        if state.queue.len() < threshold && !state.producer_done {
            return None;
        }
        let item = state.queue.pop_front()?;
        let producer_done = state.producer_done;
        drop(state);
        self.not_full.notify_one();
        Some((item, producer_done))
    }

    /// Sleep for `timeout` unless cancelled first. Returns true if cancelled.
    pub fn sleep_unless_cancelled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_producer_done(&self) -> bool {
        self.lock().producer_done
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Producer finished and nothing left to pop
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.producer_done && state.queue.is_empty()
    }
}

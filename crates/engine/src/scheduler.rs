//! Deferred commit scheduling
//!
//! Coalesces bursts of mutations into a single flush. Each mutation pushes
//! the flush deadline out to `write_delay` from now, unless the store has
//! already been dirty for longer than `max_deferred_period`, in which case
//! the deadline is pulled in to now.
//!
//! There is exactly one deadline per store. A single timer thread waits on
//! it and runs the flush; mutating callers only update the deadline and
//! never wait for I/O. `flush_lock` serializes flush executions, while the
//! dirty flag, deferred-since time and deadline live under `state`, which
//! is held only for bookkeeping.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// Dirty tracking and the armed deadline
#[derive(Debug, Default)]
struct CommitState {
    dirty: bool,
    /// First unflushed mutation of the current dirty period
    deferred_since: Option<Instant>,
    /// When the timer thread should flush; None when disarmed
    deadline: Option<Instant>,
    /// Bumped on every mutation
    generation: u64,
    shutdown: bool,
}

/// How a mutation was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// Flush re-armed for `write_delay` from now
    Deferred {
        /// When the flush will fire unless pushed out again; None when
        /// `write_delay` reaches past any representable instant
        deadline: Option<Instant>,
    },
    /// Deferral cap exceeded; flush is due immediately
    Forced,
}

/// Per-store deferred commit state machine
#[derive(Debug)]
pub struct CommitScheduler {
    state: Mutex<CommitState>,
    wakeup: Condvar,
    flush_lock: Mutex<()>,
    write_delay: Duration,
    max_deferred_period: Duration,
}

impl CommitScheduler {
    /// Create a clean scheduler
    pub fn new(write_delay: Duration, max_deferred_period: Duration) -> Self {
        CommitScheduler {
            state: Mutex::new(CommitState::default()),
            wakeup: Condvar::new(),
            flush_lock: Mutex::new(()),
            write_delay,
            max_deferred_period,
        }
    }

    /// Record a mutation: mark dirty and (re)arm the deadline
    pub fn record_mutation(&self) -> CommitDecision {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);

        let since = match state.deferred_since {
            Some(since) if state.dirty => since,
            _ => {
                state.dirty = true;
                state.deferred_since = Some(now);
                now
            }
        };

        let decision = if now.duration_since(since) > self.max_deferred_period {
            state.deadline = Some(now);
            CommitDecision::Forced
        } else {
            let deadline = now.checked_add(self.write_delay);
            state.deadline = deadline;
            CommitDecision::Deferred { deadline }
        };
        drop(state);

        self.wakeup.notify_one();
        decision
    }

    /// Mark dirty without arming the timer
    ///
    /// Used while the store is being populated before the timer runs.
    pub fn mark_dirty(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        if !state.dirty {
            state.dirty = true;
            state.deferred_since = Some(Instant::now());
        }
    }

    /// Forget pending changes and disarm the timer
    pub fn mark_clean(&self) {
        let mut state = self.state.lock();
        state.dirty = false;
        state.deferred_since = None;
        state.deadline = None;
    }

    /// Whether there are mutations not yet written
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// When the current dirty period started
    pub fn deferred_since(&self) -> Option<Instant> {
        self.state.lock().deferred_since
    }

    /// Whether a flush is armed
    pub fn is_armed(&self) -> bool {
        self.state.lock().deadline.is_some()
    }

    /// Run `write` if the store is dirty, with flushes serialized
    ///
    /// Returns `Ok(None)` when there was nothing to write. On success the
    /// store becomes clean unless mutations arrived while `write` ran; those
    /// keep it dirty with their deadline intact. On failure the store stays
    /// dirty and the deadline is re-armed `write_delay` out so the timer
    /// retries; the deferral cap restarts from the failed attempt.
    pub fn flush_with<T, E, F>(&self, write: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _flushing = self.flush_lock.lock();

        let (generation, started) = {
            let state = self.state.lock();
            if !state.dirty {
                return Ok(None);
            }
            (state.generation, Instant::now())
        };

        let result = write();

        let mut state = self.state.lock();
        match result {
            Ok(value) => {
                if state.generation == generation {
                    state.dirty = false;
                    state.deferred_since = None;
                    state.deadline = None;
                } else {
                    // captured by the next flush
                    state.deferred_since = Some(started);
                    trace!(target: "jsonvault::scheduler", "Mutations arrived during flush");
                }
                Ok(Some(value))
            }
            Err(e) => {
                let now = Instant::now();
                state.deferred_since = Some(now);
                if let Some(retry) = now.checked_add(self.write_delay) {
                    state.deadline = Some(state.deadline.map_or(retry, |d| d.max(retry)));
                }
                drop(state);
                self.wakeup.notify_one();
                Err(e)
            }
        }
    }

    /// Timer loop: wait for the deadline, then call `flush`
    ///
    /// Runs on the store's commit thread until [`shutdown`](Self::shutdown).
    pub fn run_timer<F: FnMut()>(&self, mut flush: F) {
        loop {
            {
                let mut state = self.state.lock();
                loop {
                    if state.shutdown {
                        return;
                    }
                    match state.deadline {
                        None => self.wakeup.wait(&mut state),
                        Some(deadline) => {
                            if Instant::now() >= deadline {
                                break;
                            }
                            self.wakeup.wait_until(&mut state, deadline);
                        }
                    }
                }
                state.deadline = None;
            }
            flush();
        }
    }

    /// Stop the timer loop
    ///
    /// A flush already running completes first.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.wakeup.notify_all();
    }
}

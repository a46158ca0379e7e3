//! Per-timer recurring tick scheduling.
//!
//! Every running timer owns one [`TickHandle`]. Cancelling the handle is
//! synchronous: once `cancel()` returns, the callback will not run again,
//! and a callback already woken re-checks the token under the timer lock
//! before touching state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Returned by a tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

pub type TickFn = Box<dyn FnMut() -> TickControl + Send + 'static>;

/// Shared cancellation flag between a handle and its callback.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owned handle to one recurring tick. Dropping it cancels the tick.
#[derive(Debug)]
pub struct TickHandle {
    token: CancelToken,
    task: Option<AbortHandle>,
}

impl TickHandle {
    pub fn new(token: CancelToken, task: Option<AbortHandle>) -> Self {
        Self { token, task }
    }

    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Clock capability: run a callback once per period.
pub trait TickScheduler: Send + Sync {
    /// Invoke `tick` every `period`, first one period from now, until it
    /// returns [`TickControl::Stop`] or `token` is cancelled.
    fn schedule_every(&self, period: Duration, token: CancelToken, tick: TickFn) -> TickHandle;
}

/// Real-time scheduler: one tokio task per running timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler on the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn from_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule_every(&self, period: Duration, token: CancelToken, mut tick: TickFn) -> TickHandle {
        let task_token = token.clone();
        let task = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if task_token.is_cancelled() {
                    break;
                }
                if tick() == TickControl::Stop {
                    break;
                }
            }
        });
        TickHandle::new(token, Some(task.abort_handle()))
    }
}

struct ManualEntry {
    token: CancelToken,
    tick: TickFn,
}

/// Deterministic scheduler for tests and simulations.
///
/// Nothing fires until [`ManualScheduler::advance`] is called; each step
/// fires every live callback once, in registration order.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<ManualEntry>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `steps` periods.
    pub fn advance(&self, steps: u32) {
        for _ in 0..steps {
            self.fire_once();
        }
    }

    /// Callbacks that would still fire.
    pub fn pending(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| !e.token.is_cancelled())
            .count()
    }

    fn fire_once(&self) {
        // Run callbacks outside the lock so they may schedule new ticks.
        let mut current = std::mem::take(
            &mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner),
        );
        current.retain_mut(|entry| {
            if entry.token.is_cancelled() {
                return false;
            }
            (entry.tick)() == TickControl::Continue && !entry.token.is_cancelled()
        });
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        current.append(&mut entries);
        *entries = current;
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule_every(&self, _period: Duration, token: CancelToken, tick: TickFn) -> TickHandle {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ManualEntry {
                token: token.clone(),
                tick,
            });
        TickHandle::new(token, None)
    }
}

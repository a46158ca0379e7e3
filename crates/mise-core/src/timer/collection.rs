use std::sync::Arc;

use chrono::Utc;

use super::live::Timer;
use super::scheduler::TickScheduler;
use super::state::{validate, TimerSnapshot, TimerState};
use crate::error::TimerError;
use crate::events::Event;
use crate::ids::EntityId;
use crate::notify::CompletionNotifier;
use crate::store::TimerRecord;

/// The timers of one page, in display order.
///
/// Each timer ticks on its own handle; nothing here blocks one timer on
/// another.
pub struct TimerCollection {
    timers: Vec<Timer>,
    scheduler: Arc<dyn TickScheduler>,
    notifier: Arc<dyn CompletionNotifier>,
}

impl std::fmt::Debug for TimerCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerCollection")
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl TimerCollection {
    pub fn new(scheduler: Arc<dyn TickScheduler>, notifier: Arc<dyn CompletionNotifier>) -> Self {
        Self {
            timers: Vec::new(),
            scheduler,
            notifier,
        }
    }

    /// Build from store records. Records the store should never have
    /// accepted are skipped with a warning.
    pub fn from_records(
        records: &[TimerRecord],
        scheduler: Arc<dyn TickScheduler>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let mut collection = Self::new(scheduler, notifier);
        collection.timers = records.iter().filter_map(timer_from_record).collect();
        collection
    }

    /// Check a new timer before it is sent to the store.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidLabel`] or [`TimerError::InvalidDuration`].
    pub fn validate_new(label: &str, duration_secs: i64) -> Result<u64, TimerError> {
        validate(label, duration_secs)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id() == id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn snapshots(&self) -> Vec<TimerSnapshot> {
        self.timers.iter().map(Timer::snapshot).collect()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Append an idle timer.
    ///
    /// # Errors
    ///
    /// Rejects a blank label or a non-positive duration.
    pub fn add(&mut self, id: EntityId, label: &str, duration_secs: i64) -> Result<TimerSnapshot, TimerError> {
        let timer = Timer::new(TimerState::new(id, label, duration_secs)?);
        let snapshot = timer.snapshot();
        self.timers.push(timer);
        Ok(snapshot)
    }

    pub fn start(&mut self, id: &EntityId) -> Result<Option<Event>, TimerError> {
        let scheduler = Arc::clone(&self.scheduler);
        let notifier = Arc::clone(&self.notifier);
        let timer = self.find_mut(id)?;
        let event = timer.start(scheduler.as_ref(), &notifier);
        if event.is_some() {
            tracing::debug!(timer_id = %id, "timer started");
        }
        Ok(event)
    }

    pub fn pause(&mut self, id: &EntityId) -> Result<Option<Event>, TimerError> {
        let event = self.find_mut(id)?.pause();
        if event.is_some() {
            tracing::debug!(timer_id = %id, "timer paused");
        }
        Ok(event)
    }

    pub fn reset(&mut self, id: &EntityId) -> Result<Event, TimerError> {
        let event = self.find_mut(id)?.reset();
        tracing::debug!(timer_id = %id, "timer reset");
        Ok(event)
    }

    /// Stop ticking and drop the timer.
    pub fn remove(&mut self, id: &EntityId) -> Result<Event, TimerError> {
        self.detach(id)?;
        Ok(Event::TimerRemoved {
            timer_id: id.clone(),
            at: Utc::now(),
        })
    }

    /// Take a timer out with its ticking halted, keeping its position so a
    /// failed remote delete can put it back.
    pub fn detach(&mut self, id: &EntityId) -> Result<(usize, Timer), TimerError> {
        let index = self
            .timers
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))?;
        let mut timer = self.timers.remove(index);
        timer.halt();
        Ok((index, timer))
    }

    /// Undo a [`detach`](Self::detach). A timer that was running resumes.
    /// An idle copy added by a resync in the meantime is replaced.
    pub fn restore(&mut self, index: usize, mut timer: Timer) {
        self.timers.retain(|t| t.id() != timer.id());
        timer.rearm(self.scheduler.as_ref(), &self.notifier);
        let index = index.min(self.timers.len());
        self.timers.insert(index, timer);
    }

    /// Replace membership with the store's list. Surviving timers keep their
    /// countdown and ticking; vanished ones stop; new ones arrive idle.
    pub fn reconcile(&mut self, records: &[TimerRecord]) {
        let mut previous = std::mem::take(&mut self.timers);
        let mut next = Vec::with_capacity(records.len());

        for record in records {
            let kept = previous
                .iter()
                .position(|t| t.id() == &record.id)
                .map(|i| previous.remove(i))
                .filter(|t| {
                    let snap = t.snapshot();
                    snap.label == record.label
                        && i64::try_from(snap.duration_secs).ok() == Some(record.duration)
                });
            match kept {
                Some(timer) => next.push(timer),
                None => next.extend(timer_from_record(record)),
            }
        }

        for mut gone in previous {
            gone.halt();
            tracing::debug!(timer_id = %gone.id(), "timer dropped by resync");
        }
        self.timers = next;
    }

    /// Halt every timer. Used when the page closes.
    pub fn cancel_all(&mut self) {
        for timer in &mut self.timers {
            timer.halt();
        }
    }

    fn find_mut(&mut self, id: &EntityId) -> Result<&mut Timer, TimerError> {
        self.timers
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))
    }
}

fn timer_from_record(record: &TimerRecord) -> Option<Timer> {
    match TimerState::new(record.id.clone(), &record.label, record.duration) {
        Ok(state) => Some(Timer::new(state)),
        Err(err) => {
            tracing::warn!(timer_id = %record.id, error = %err, "skipping invalid timer record");
            None
        }
    }
}

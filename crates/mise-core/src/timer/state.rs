//! Countdown state machine for one timer.
//!
//! Pure: no clock, no tasks. Whoever owns the timer calls `tick()` once per
//! second while it is running (see [`super::scheduler`]).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> Completed -> Running (restarts from the full duration)
//! any -> Idle (reset)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::TimerError;
use crate::events::Event;
use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

/// One countdown: fixed duration, decreasing remaining time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    id: EntityId,
    label: String,
    duration_secs: u64,
    remaining_secs: u64,
    status: TimerStatus,
}

/// Read-only copy of a timer, including its `MM:SS` rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub id: EntityId,
    pub label: String,
    pub duration_secs: u64,
    pub remaining_secs: u64,
    pub status: TimerStatus,
    pub display: String,
}

/// Check a label/duration pair the way the store does.
///
/// # Errors
///
/// [`TimerError::InvalidLabel`] for a blank label,
/// [`TimerError::InvalidDuration`] for a duration below one second.
pub fn validate(label: &str, duration_secs: i64) -> Result<u64, TimerError> {
    if label.trim().is_empty() {
        return Err(TimerError::InvalidLabel);
    }
    u64::try_from(duration_secs)
        .ok()
        .filter(|d| *d > 0)
        .ok_or(TimerError::InvalidDuration(duration_secs))
}

/// Render seconds as `MM:SS`. Minutes grow past two digits instead of wrapping.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

impl TimerState {
    /// Create an idle timer with `remaining == duration`.
    ///
    /// # Errors
    ///
    /// See [`validate`].
    pub fn new(id: EntityId, label: &str, duration_secs: i64) -> Result<Self, TimerError> {
        let duration_secs = validate(label, duration_secs)?;
        Ok(Self {
            id,
            label: label.to_string(),
            duration_secs,
            remaining_secs: duration_secs,
            status: TimerStatus::Idle,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn display(&self) -> String {
        format_clock(self.remaining_secs)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            duration_secs: self.duration_secs,
            remaining_secs: self.remaining_secs,
            status: self.status,
            display: self.display(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Returns `None` when already running.
    pub fn start(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Idle | TimerStatus::Paused | TimerStatus::Completed => {
                if self.status == TimerStatus::Completed {
                    self.remaining_secs = self.duration_secs;
                }
                self.status = TimerStatus::Running;
                Some(Event::TimerStarted {
                    timer_id: self.id.clone(),
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            TimerStatus::Running => None,
        }
    }

    /// Returns `None` unless running.
    pub fn pause(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running => {
                self.status = TimerStatus::Paused;
                Some(Event::TimerPaused {
                    timer_id: self.id.clone(),
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) -> Event {
        self.status = TimerStatus::Idle;
        self.remaining_secs = self.duration_secs;
        Event::TimerReset {
            timer_id: self.id.clone(),
            duration_secs: self.duration_secs,
            at: Utc::now(),
        }
    }

    /// One second elapsed. Returns `TimerCompleted` exactly once, on the tick
    /// that reaches zero; ignored unless running.
    pub fn tick(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.status = TimerStatus::Completed;
            return Some(Event::TimerCompleted {
                timer_id: self.id.clone(),
                label: self.label.clone(),
                at: Utc::now(),
            });
        }
        Some(Event::TimerTicked {
            timer_id: self.id.clone(),
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }
}

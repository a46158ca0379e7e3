use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::timer::TimerSnapshot;

/// Every timer state change produces an Event.
/// Front ends render them; notifiers forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        timer_id: EntityId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        timer_id: EntityId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerTicked {
        timer_id: EntityId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        timer_id: EntityId,
        label: String,
        at: DateTime<Utc>,
    },
    TimerReset {
        timer_id: EntityId,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerRemoved {
        timer_id: EntityId,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn timer_id(&self) -> &EntityId {
        match self {
            Event::TimerStarted { timer_id, .. }
            | Event::TimerPaused { timer_id, .. }
            | Event::TimerTicked { timer_id, .. }
            | Event::TimerCompleted { timer_id, .. }
            | Event::TimerReset { timer_id, .. }
            | Event::TimerRemoved { timer_id, .. } => timer_id,
        }
    }

    pub fn ticked(snapshot: &TimerSnapshot) -> Self {
        Event::TimerTicked {
            timer_id: snapshot.id.clone(),
            remaining_secs: snapshot.remaining_secs,
            at: Utc::now(),
        }
    }

    pub fn completed(snapshot: &TimerSnapshot) -> Self {
        Event::TimerCompleted {
            timer_id: snapshot.id.clone(),
            label: snapshot.label.clone(),
            at: Utc::now(),
        }
    }
}

//! Completion notification.
//!
//! Timers call a [`CompletionNotifier`] from their tick callback: `ticked` on
//! every second, `completed` exactly once when the countdown reaches zero.
//! Sound and visual alerts live behind this trait in the front end.

use tokio::sync::mpsc;

use crate::events::Event;
use crate::timer::TimerSnapshot;

pub trait CompletionNotifier: Send + Sync {
    /// The timer reached zero.
    fn completed(&self, timer: &TimerSnapshot);

    /// One second elapsed on a running timer.
    fn ticked(&self, _timer: &TimerSnapshot) {}
}

/// Writes completions to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn completed(&self, timer: &TimerSnapshot) {
        tracing::info!(timer_id = %timer.id, label = %timer.label, "timer completed");
    }

    fn ticked(&self, timer: &TimerSnapshot) {
        tracing::trace!(timer_id = %timer.id, remaining = timer.remaining_secs, "tick");
    }
}

/// Forwards ticks and completions as [`Event`]s over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionNotifier for ChannelNotifier {
    fn completed(&self, timer: &TimerSnapshot) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(Event::completed(timer));
    }

    fn ticked(&self, timer: &TimerSnapshot) {
        let _ = self.tx.send(Event::ticked(timer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EntityId;
    use crate::timer::TimerStatus;

    #[test]
    fn channel_notifier_forwards_events() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let snap = TimerSnapshot {
            id: EntityId::new("t"),
            label: "Rest".into(),
            duration_secs: 3,
            remaining_secs: 0,
            status: TimerStatus::Completed,
            display: "00:00".into(),
        };
        notifier.ticked(&snap);
        notifier.completed(&snap);

        assert!(matches!(rx.try_recv().unwrap(), Event::TimerTicked { remaining_secs: 0, .. }));
        match rx.try_recv().unwrap() {
            Event::TimerCompleted { timer_id, label, .. } => {
                assert_eq!(timer_id.as_str(), "t");
                assert_eq!(label, "Rest");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::scheduler::{CancelToken, TickControl, TickHandle, TickScheduler};
use super::state::{TimerSnapshot, TimerState, TimerStatus};
use crate::events::Event;
use crate::ids::EntityId;
use crate::notify::CompletionNotifier;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A timer plus its scheduled tick.
///
/// State-changing commands cancel the pending tick before they touch the
/// state, so a tick that was already due cannot land afterwards.
#[derive(Debug)]
pub struct Timer {
    id: EntityId,
    state: Arc<Mutex<TimerState>>,
    ticker: Option<TickHandle>,
}

impl Timer {
    pub fn new(state: TimerState) -> Self {
        Self {
            id: state.id().clone(),
            state: Arc::new(Mutex::new(state)),
            ticker: None,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> TimerStatus {
        self.lock().status()
    }

    pub fn start(
        &mut self,
        scheduler: &dyn TickScheduler,
        notifier: &Arc<dyn CompletionNotifier>,
    ) -> Option<Event> {
        let event = self.lock().start()?;
        self.arm(scheduler, notifier);
        Some(event)
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.status() != TimerStatus::Running {
            return None;
        }
        self.halt();
        self.lock().pause()
    }

    pub fn reset(&mut self) -> Event {
        self.halt();
        self.lock().reset()
    }

    /// Cancel the scheduled tick without changing the countdown.
    pub fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    /// Re-schedule ticking for a timer that is still marked running.
    pub fn rearm(&mut self, scheduler: &dyn TickScheduler, notifier: &Arc<dyn CompletionNotifier>) {
        if self.status() == TimerStatus::Running {
            self.arm(scheduler, notifier);
        }
    }

    fn arm(&mut self, scheduler: &dyn TickScheduler, notifier: &Arc<dyn CompletionNotifier>) {
        self.halt();
        let token = CancelToken::new();
        let state = Arc::clone(&self.state);
        let notifier = Arc::clone(notifier);
        let guard = token.clone();

        let tick = Box::new(move || {
            let (event, snapshot) = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if guard.is_cancelled() {
                    return TickControl::Stop;
                }
                let event = state.tick();
                (event, state.snapshot())
            };
            match event {
                Some(Event::TimerCompleted { .. }) => {
                    notifier.completed(&snapshot);
                    TickControl::Stop
                }
                Some(_) => {
                    notifier.ticked(&snapshot);
                    TickControl::Continue
                }
                None => TickControl::Stop,
            }
        });

        self.ticker = Some(scheduler.schedule_every(TICK_PERIOD, token, tick));
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::timer::ManualScheduler;

    fn setup(duration: i64) -> (Timer, ManualScheduler, Arc<dyn CompletionNotifier>, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let state = TimerState::new(EntityId::new("t1"), "Sear", duration).unwrap();
        let (notifier, rx) = ChannelNotifier::new();
        (Timer::new(state), ManualScheduler::new(), Arc::new(notifier), rx)
    }

    #[test]
    fn runs_to_completion_and_notifies_once() {
        let (mut timer, scheduler, notifier, mut rx) = setup(3);
        timer.start(&scheduler, &notifier).unwrap();

        scheduler.advance(10);

        let snap = timer.snapshot();
        assert_eq!(snap.status, TimerStatus::Completed);
        assert_eq!(snap.remaining_secs, 0);
        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::TimerCompleted { .. }) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn pause_cancels_pending_tick() {
        let (mut timer, scheduler, notifier, _rx) = setup(10);
        timer.start(&scheduler, &notifier);
        scheduler.advance(2);
        timer.pause().unwrap();
        scheduler.advance(5);

        assert_eq!(timer.snapshot().remaining_secs, 8);
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn reset_discards_due_tick_and_restart_counts_once() {
        let (mut timer, scheduler, notifier, _rx) = setup(10);
        timer.start(&scheduler, &notifier);
        scheduler.advance(3);
        timer.reset();
        assert_eq!(timer.snapshot().remaining_secs, 10);
        assert_eq!(scheduler.pending(), 0);

        timer.start(&scheduler, &notifier);
        scheduler.advance(1);
        assert_eq!(timer.snapshot().remaining_secs, 9);
    }

    #[test]
    fn double_start_schedules_one_tick() {
        let (mut timer, scheduler, notifier, _rx) = setup(10);
        assert!(timer.start(&scheduler, &notifier).is_some());
        assert!(timer.start(&scheduler, &notifier).is_none());
        assert_eq!(scheduler.pending(), 1);
        scheduler.advance(1);
        assert_eq!(timer.snapshot().remaining_secs, 9);
    }

    #[test]
    fn halt_then_rearm_resumes_running_timer() {
        let (mut timer, scheduler, notifier, _rx) = setup(10);
        timer.start(&scheduler, &notifier);
        timer.halt();
        scheduler.advance(3);
        assert_eq!(timer.snapshot().remaining_secs, 10);

        timer.rearm(&scheduler, &notifier);
        scheduler.advance(2);
        assert_eq!(timer.snapshot().remaining_secs, 8);
    }
}

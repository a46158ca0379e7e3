//! Countdown timers.
//!
//! [`TimerState`] is the pure state machine, [`Timer`] pairs it with a
//! scheduled tick, and [`TimerCollection`] holds the timers of one page.

mod collection;
mod live;
mod scheduler;
mod state;

pub use collection::TimerCollection;
pub use live::Timer;
pub use scheduler::{
    CancelToken, ManualScheduler, TickControl, TickFn, TickHandle, TickScheduler, TokioScheduler,
};
pub use state::{format_clock, validate, TimerSnapshot, TimerState, TimerStatus};

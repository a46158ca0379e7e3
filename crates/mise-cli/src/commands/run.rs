//! Live countdown for one page.

use std::sync::Arc;
use std::time::Duration;

use mise_core::session::close_on_session_end;
use mise_core::{CompletionNotifier, EntityId, SessionStatus, TimerSnapshot, TimerStatus};

use super::{open_page, session_failure, OpenPage};

/// Rings the terminal bell when a timer reaches zero.
struct BellNotifier;

impl CompletionNotifier for BellNotifier {
    fn completed(&self, timer: &TimerSnapshot) {
        println!("\x07{} is done", timer.label);
        tracing::info!(timer_id = %timer.id, "timer completed");
    }
}

/// Load `page_id`, start the requested timers and show them until none is
/// running. Ctrl-C stops every timer.
pub async fn run(page_id: String, start_all: bool, timer_ids: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let OpenPage { store, session, .. } = open_page(&page_id, Arc::new(BellNotifier)).await?;
    let watcher = close_on_session_end(Arc::clone(&session), store.auth());

    println!("{}", session.label().unwrap_or_default());

    let targets: Vec<EntityId> = if start_all {
        session.timers().into_iter().map(|t| t.id).collect()
    } else {
        timer_ids.into_iter().map(EntityId::new).collect()
    };
    for id in &targets {
        session.start_timer(id).map_err(|e| session_failure(&store, e))?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                let timers = session.timers();
                println!("{}", render(&timers));
                let running = timers.iter().any(|t| t.status == TimerStatus::Running);
                if !running || session.status() == SessionStatus::Closed {
                    break;
                }
            }
        }
    }

    session.close();
    watcher.abort();
    Ok(())
}

fn render(timers: &[TimerSnapshot]) -> String {
    if timers.is_empty() {
        return "no timers on this page".into();
    }
    timers
        .iter()
        .map(|t| {
            let marker = match t.status {
                TimerStatus::Running => ">",
                TimerStatus::Paused => "=",
                TimerStatus::Completed => "*",
                TimerStatus::Idle => " ",
            };
            format!("{marker} {} {}", t.label, t.display)
        })
        .collect::<Vec<_>>()
        .join("  |  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(label: &str, remaining: u64, status: TimerStatus) -> TimerSnapshot {
        TimerSnapshot {
            id: EntityId::new(label),
            label: label.into(),
            duration_secs: 600,
            remaining_secs: remaining,
            status,
            display: mise_core::timer::format_clock(remaining),
        }
    }

    #[test]
    fn render_marks_status() {
        let line = render(&[
            snap("Boil", 65, TimerStatus::Running),
            snap("Rest", 0, TimerStatus::Completed),
        ]);
        assert_eq!(line, "> Boil 01:05  |  * Rest 00:00");
        assert_eq!(render(&[]), "no timers on this page");
    }
}

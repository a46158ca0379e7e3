use std::sync::Arc;

use clap::Subcommand;
use mise_core::{Config, EntityId, LogNotifier, TimerCollection};

use super::{open_page, session_failure};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Add a timer to a page
    Add {
        /// Page ID
        page_id: String,
        /// Timer label
        label: String,
        /// Duration in seconds (defaults to timers.default_duration_secs)
        #[arg(long, short)]
        duration: Option<i64>,
    },
    /// Delete a timer from a page
    Delete {
        /// Page ID
        page_id: String,
        /// Timer ID
        timer_id: String,
    },
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Add {
            page_id,
            label,
            duration,
        } => {
            let duration = match duration {
                Some(d) => d,
                None => i64::try_from(Config::load()?.timers.default_duration_secs)?,
            };
            TimerCollection::validate_new(&label, duration)?;

            let page = open_page(&page_id, Arc::new(LogNotifier)).await?;
            let timer = page
                .session
                .add_timer(&label, duration)
                .await
                .map_err(|e| session_failure(&page.store, e))?;
            println!("Timer added: {} ({}) {}", timer.label, timer.display, timer.id);
        }
        TimerAction::Delete { page_id, timer_id } => {
            let page = open_page(&page_id, Arc::new(LogNotifier)).await?;
            page.session
                .delete_timer(&EntityId::new(timer_id.clone()))
                .await
                .map_err(|e| session_failure(&page.store, e))?;
            println!("Timer deleted: {timer_id}");
        }
    }
    Ok(())
}

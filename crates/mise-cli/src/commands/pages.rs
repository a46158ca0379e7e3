use clap::Subcommand;
use mise_core::store::PageRecord;
use mise_core::timer::format_clock;
use mise_core::{EntityId, PageStore};

use super::auth::guarded;
use super::connect_authenticated;

#[derive(Subcommand)]
pub enum PagesAction {
    /// List your recipe pages
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a recipe page
    Create {
        /// Page name
        label: String,
    },
    /// Delete a recipe page
    Delete {
        /// Page ID
        page_id: String,
    },
}

pub async fn run(action: PagesAction) -> Result<(), Box<dyn std::error::Error>> {
    let (_, store) = connect_authenticated()?;
    match action {
        PagesAction::List { json } => {
            let pages = guarded(&store, store.list_pages()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pages)?);
            } else if pages.is_empty() {
                println!("no pages yet");
            } else {
                for page in &pages {
                    println!(
                        "{}  {}  ({} timers, {} converters)",
                        page.id,
                        page.label,
                        page.timers.len(),
                        page.converters.len()
                    );
                }
            }
        }
        PagesAction::Create { label } => {
            if label.trim().is_empty() {
                return Err("page name is required".into());
            }
            let page = guarded(&store, store.create_page(&label)).await?;
            println!("Page created: {} ({})", page.label, page.id);
        }
        PagesAction::Delete { page_id } => {
            guarded(&store, store.delete_page(&EntityId::new(page_id.clone()))).await?;
            println!("Page deleted: {page_id}");
        }
    }
    Ok(())
}

/// Print one page with its timers and converters.
pub async fn show(page_id: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (_, store) = connect_authenticated()?;
    let page = guarded(&store, store.get_page(&EntityId::new(page_id.clone())))
        .await?
        .ok_or_else(|| format!("page {page_id} not found"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_page(&page);
    }
    Ok(())
}

fn print_page(page: &PageRecord) {
    println!("{} ({})", page.label, page.id);
    println!("Timers:");
    if page.timers.is_empty() {
        println!("  none");
    }
    for timer in &page.timers {
        let clock = u64::try_from(timer.duration).map(format_clock).unwrap_or_default();
        println!("  {}  {:<24} {}", timer.id, timer.label, clock);
    }
    println!("Converters:");
    if page.converters.is_empty() {
        println!("  none");
    }
    for converter in &page.converters {
        println!(
            "  {}  {} to {} (x{})",
            converter.id, converter.from_unit, converter.to_unit, converter.conversion_factor
        );
    }
}

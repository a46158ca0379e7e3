use std::sync::Arc;

use clap::Subcommand;
use mise_core::conversion::ConverterView;
use mise_core::{Category, EntityId, LogNotifier};

use super::convert::driving_side;
use super::{open_page, session_failure};

#[derive(Subcommand)]
pub enum ConverterAction {
    /// List a page's converters
    List {
        /// Page ID
        page_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a new converter to a page
    #[command(visible_alias = "add")]
    Save {
        /// Page ID
        page_id: String,
        /// Category key (e.g. "grams", "Fahrenheit")
        category: String,
        /// Value in the first unit
        #[arg(long, allow_hyphen_values = true)]
        from: Option<String>,
        /// Value in the second unit
        #[arg(long, allow_hyphen_values = true)]
        to: Option<String>,
    },
    /// Delete a saved converter
    Delete {
        /// Page ID
        page_id: String,
        /// Converter ID
        converter_id: String,
    },
}

pub async fn run(action: ConverterAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConverterAction::List { page_id, json } => {
            let page = open_page(&page_id, Arc::new(LogNotifier)).await?;
            let converters: Vec<_> = page.session.converters().into_iter().filter(|c| c.saved).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&converters)?);
            } else if converters.is_empty() {
                println!("no saved converters");
            } else {
                for c in &converters {
                    println!("{}  {:<12} {}", c.id, c.category, c.label);
                }
            }
        }
        ConverterAction::Save {
            page_id,
            category,
            from,
            to,
        } => {
            category.parse::<Category>()?;
            let value = driving_side(from, to)?;

            let page = open_page(&page_id, Arc::new(LogNotifier)).await?;
            let session = &page.session;
            let local = session.add_converter()?;
            session.set_converter_category(&local, &category)?;
            if let Some((side, text)) = value {
                session.set_converter_field(&local, side, &text)?;
            }
            let saved = session
                .save_converter(&local)
                .await
                .map_err(|e| session_failure(&page.store, e))?;
            println!("Converter saved: {} ({}) {}", saved.label, saved.category, saved.id);
            print_values(&saved);
        }
        ConverterAction::Delete { page_id, converter_id } => {
            let page = open_page(&page_id, Arc::new(LogNotifier)).await?;
            page.session
                .delete_converter(&EntityId::new(converter_id.clone()))
                .await
                .map_err(|e| session_failure(&page.store, e))?;
            println!("Converter deleted: {converter_id}");
        }
    }
    Ok(())
}

fn print_values(view: &ConverterView) {
    if !view.field1.is_empty() && !view.field2.is_empty() {
        println!("{} {} = {} {}", view.field1, view.from_unit, view.field2, view.to_unit);
    }
}

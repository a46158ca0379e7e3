use clap::{Parser, Subcommand};
use clap_complete::Shell;

mod commands;
mod credentials;
mod logging;

#[derive(Parser)]
#[command(name = "mise", version, about = "Recipe pages of kitchen timers and unit converters")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session token
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the saved session token
    Logout,
    /// Create an account and log in
    Register {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Recipe page management
    Pages {
        #[command(subcommand)]
        action: commands::pages::PagesAction,
    },
    /// Show one page with its timers and converters
    Page {
        #[command(subcommand)]
        action: PageAction,
    },
    /// Timer management
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Converters saved on a page
    Converter {
        #[command(subcommand)]
        action: commands::converter::ConverterAction,
    },
    /// Count down a page's timers live
    Run {
        /// Page ID
        page_id: String,
        /// Start every timer on the page
        #[arg(long)]
        start: bool,
        /// Timer IDs to start
        timers: Vec<String>,
    },
    /// Convert a value with a built-in category
    Convert {
        /// Category key (e.g. "grams", "Fahrenheit")
        category: String,
        /// Value in the first unit
        #[arg(long, allow_hyphen_values = true)]
        from: Option<String>,
        /// Value in the second unit
        #[arg(long, allow_hyphen_values = true)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in conversion categories
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum PageAction {
    /// Show a page
    Show {
        /// Page ID
        page_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Login { username, password } => commands::auth::login(username, password).await,
        Commands::Logout => commands::auth::logout(),
        Commands::Register { username, password } => commands::auth::register(username, password).await,
        Commands::Pages { action } => commands::pages::run(action).await,
        Commands::Page {
            action: PageAction::Show { page_id, json },
        } => commands::pages::show(page_id, json).await,
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Converter { action } => commands::converter::run(action).await,
        Commands::Run { page_id, start, timers } => commands::run::run(page_id, start, timers).await,
        Commands::Convert {
            category,
            from,
            to,
            json,
        } => commands::convert::convert(&category, from, to, json),
        Commands::Categories { json } => commands::convert::categories(json),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

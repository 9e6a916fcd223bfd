//! Timehop CLI - move or remove time-tracking data between Clockify and Toggl Track.

mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::run::{DeleteArgs, FetchArgs, TransferArgs};

#[derive(Parser)]
#[command(name = "timehop")]
#[command(version)]
#[command(about = "Transfer or delete time-tracking records between Clockify and Toggl Track")]
#[command(
    long_about = "Timehop copies workspaces, clients, tags, projects, tasks and time entries \
from one time-tracking service to another, matching records that already exist on the \
target by name. It can also bulk-delete records from a single service."
)]
#[command(after_long_help = r#"EXAMPLES
    See what both accounts contain and how they line up:
        $ timehop fetch --from clockify --to toggl

    Copy one workspace from Clockify to Toggl, entries since January 1st:
        $ timehop transfer --from clockify --to toggl --since 2024-01-01 --workspace Acme

    Preview a transfer without writing anything:
        $ timehop transfer --from toggl --to clockify --dry-run

    Delete everything except tags from a Toggl workspace:
        $ timehop delete --from toggl --workspace Acme --skip tags

    Generate shell completions:
        $ timehop completions bash > ~/.local/share/bash-completion/completions/timehop

CONFIGURATION
    Timehop reads configuration from:
      1. ~/.config/timehop/config.toml (or $XDG_CONFIG_HOME/timehop/config.toml)
      2. ./timehop.toml
      3. Environment variables (TIMEHOP_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    TIMEHOP_CLOCKIFY_API_KEY          Clockify API key
    TIMEHOP_CLOCKIFY_BASE_URL         Clockify API base (default: https://api.clockify.me/api/v1)
    TIMEHOP_TOGGL_API_TOKEN           Toggl Track API token
    TIMEHOP_TOGGL_BASE_URL            Toggl API base (default: https://api.track.toggl.com/api/v9)
    TIMEHOP_TRANSFER_INCLUDE_USERS    Also write users and user groups
    TIMEHOP_TRANSFER_SINCE_DAYS       Default time-entry look-back in days (default: 365)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch records and show how source and target line up
    Fetch(FetchArgs),
    /// Create source records missing on the target
    Transfer(TransferArgs),
    /// Delete records from a service
    Delete(DeleteArgs),
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Progress bars own the terminal; log lines only when piped.
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("timehop=info,timehop_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => commands::run::handle_fetch(args, &config).await?,
        Commands::Transfer(args) => commands::run::handle_transfer(args, &config).await?,
        Commands::Delete(args) => commands::run::handle_delete(args, &config).await?,
        Commands::Completions { shell } => commands::meta::handle_completions(shell)?,
        Commands::Man { output } => commands::meta::handle_man(output)?,
    }

    Ok(())
}

//! HikeWise CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `doctor`: Check configuration and database
//! - `usage`: Show a student's daily usage records
//! - `estimate`: Price a token count for an assistant
//! - `set-tier`: Change a student's subscription tier

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hikewise",
    about = "HikeWise — study-assistant gateway",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.hikewise/config.toml)
    #[arg(short, long, global = true, env = "HIKEWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration, keys and database
    Doctor,

    /// Show daily usage for a student
    Usage {
        /// External subject of the student
        #[arg(short, long)]
        user: String,

        /// Only this day (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Estimate the cost of one exchange
    Estimate {
        /// `nora` or `patrick`
        assistant: String,
        input_tokens: u64,
        output_tokens: u64,
    },

    /// Change a student's subscription tier
    SetTier {
        /// External subject of the student
        subject: String,
        /// `free`, `trial`, `premium` or `pro`
        tier: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
        Commands::Usage { user, date } => commands::usage::usage(config, &user, date).await?,
        Commands::Estimate {
            assistant,
            input_tokens,
            output_tokens,
        } => commands::usage::estimate(config, &assistant, input_tokens, output_tokens)?,
        Commands::SetTier { subject, tier } => commands::tier::run(config, &subject, &tier).await?,
    }

    Ok(())
}

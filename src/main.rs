mod catalog;
mod cli;
mod config;
mod db;
mod embedding;
mod error;
mod intent;
mod memory;
mod recommend;
mod server;
mod service;
mod similarity;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kencot", version, about = "Campus canteen food recommendations over MCP")]
struct Cli {
    /// Path to config file (default: ~/.kencot/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport from config, stdio by default)
    Serve {
        /// Override the configured transport: stdio or sse
        #[arg(long)]
        transport: Option<String>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Run one recommendation from the terminal
    Recommend {
        /// User id for personalization
        #[arg(long)]
        user: Option<String>,
        /// Faculty to stay near, e.g. Teknik
        #[arg(long)]
        faculty: Option<String>,
        /// light, standard or heavy
        #[arg(long)]
        hunger: Option<String>,
        /// Maximum price, e.g. 15000, 15k or 15rb
        #[arg(long)]
        budget: Option<String>,
        /// morning, midday, afternoon or evening (default: now, WIB)
        #[arg(long)]
        time: Option<String>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Show a user's learned profile
    Profile {
        user: String,
        /// Number of feedback records to show
        #[arg(long, default_value_t = 5)]
        history: usize,
    },
    /// Show catalog and feedback statistics
    Stats {
        /// Restrict feedback statistics to one user
        #[arg(long)]
        user: Option<String>,
    },
    /// Export all profiles and feedback as JSON to stdout
    Export,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.kencot/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => config::KencotConfig::load_from(path)?,
        None => config::KencotConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "sse" | "http" => server::serve_sse(config).await?,
                other => anyhow::bail!("unknown transport: {other} (expected stdio or sse)"),
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Recommend {
            user,
            faculty,
            hunger,
            budget,
            time,
            json,
        } => {
            cli::recommend::recommend(
                &config,
                cli::recommend::RecommendArgs {
                    user,
                    faculty,
                    hunger,
                    budget,
                    time,
                    json,
                },
            )?;
        }
        Command::Profile { user, history } => {
            cli::profile::profile(&config, &user, history)?;
        }
        Command::Stats { user } => {
            cli::stats::stats(&config, user.as_deref())?;
        }
        Command::Export => {
            cli::export::export(&config)?;
        }
    }

    Ok(())
}

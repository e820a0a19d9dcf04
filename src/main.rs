use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yenni::commands;
use yenni::config::Config;
use yenni::events::Backend;
use yenni::gateway::HttpGateway;

#[derive(Parser)]
#[command(name = "yenni")]
#[command(version = "0.1.0")]
#[command(about = "Terminal chat client for Gemini and ChatGPT conversation backends", long_about = None)]
struct Cli {
    /// Backend route: gemini or chatgpt (anything else opens gemini)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Override the base URL of the selected backend
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Config file to use instead of ~/.yenni/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// List conversations
    List {
        /// Include deleted conversations
        #[arg(long)]
        all: bool,
    },
    /// Print one conversation
    Show { id: i64 },
    /// Remove a conversation from the history
    Delete { id: i64 },
    /// Permanently delete a conversation
    Purge {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Bring back a deleted conversation
    Restore { id: i64 },
    /// Replace the question of a conversation and print the new reply
    Edit {
        id: i64,
        #[arg(required = true)]
        message: Vec<String>,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "yenni=info".into())
}

/// The terminal UI owns stdout, so its logs go to a file.
fn init_file_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("yenni.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;

    let backend = cli
        .backend
        .as_deref()
        .map(Backend::from_route)
        .unwrap_or(config.default_backend);
    if let Some(url) = cli.base_url {
        config.set_base_url(backend, url);
    }

    let Some(command) = cli.command else {
        init_file_logging(&config.log_dir())?;
        info!(backend = backend.route(), "launching terminal UI");
        return yenni::ui::run(config, backend).await;
    };

    init_stderr_logging();
    let gateway = HttpGateway::new(config.base_url(backend), config.request_timeout())?;

    match command {
        Commands::Ask { message } => commands::ask(&gateway, backend, &message.join(" ")).await,
        Commands::List { all } => {
            commands::list(&gateway, backend, all, config.ui.preview_chars).await
        }
        Commands::Show { id } => commands::show(&gateway, id).await,
        Commands::Delete { id } => commands::delete(&gateway, id).await,
        Commands::Purge { id, yes } => commands::purge(&gateway, id, yes).await,
        Commands::Restore { id } => commands::restore(&gateway, id).await,
        Commands::Edit { id, message } => {
            commands::edit(&gateway, backend, id, &message.join(" ")).await
        }
    }
}

// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Civica - WhatsApp birthday messaging for municipal social programs.
//!
//! This is the binary entry point for the Civica command-line client.

mod list;
mod send;
mod shutdown;
mod watch;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use civica_config::CivicaConfig;
use civica_core::{CivicaError, MessageId};
use civica_store::MessageStore;
use clap::{Parser, Subcommand};

/// Civica - WhatsApp birthday messaging for municipal social programs.
#[derive(Parser, Debug)]
#[command(name = "civica", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List messages one page at a time.
    List(list::ListArgs),
    /// Send messages to people from a JSON file.
    Send(send::SendArgs),
    /// Retry one failed message.
    Retry {
        /// Message identifier.
        id: String,
    },
    /// Stream live status updates until Ctrl+C.
    Watch(watch::WatchArgs),
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => civica_config::load_and_validate_path(path),
        None => civica_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            civica_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_level);
    let use_color = !cli.plain && std::io::stdout().is_terminal();

    if let Err(e) = run(cli.command, &config, use_color).await {
        if use_color {
            use colored::Colorize;
            eprintln!("{} {e}", "error:".red().bold());
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &CivicaConfig, use_color: bool) -> Result<(), CivicaError> {
    if let Commands::Config = command {
        print!("{}", render_config(config)?);
        return Ok(());
    }

    let backend = Arc::new(civica_backend::from_config(config)?);
    let store = Arc::new(MessageStore::new(backend, config.store.page_size));

    match command {
        Commands::List(args) => list::run_list(&store, &args, config.store.page_size, use_color).await,
        Commands::Send(args) => send::run_send(&store, &args).await,
        Commands::Retry { id } => {
            let id = MessageId::from(id);
            store.retry(&id).await?;
            println!("  retry accepted for {id}");
            Ok(())
        }
        Commands::Watch(args) => watch::run_watch(config, store, &args, use_color).await,
        Commands::Config => Ok(()),
    }
}

/// Effective configuration as TOML, with the credential masked.
fn render_config(config: &CivicaConfig) -> Result<String, CivicaError> {
    let mut shown = config.clone();
    if shown.auth.token.is_some() {
        shown.auth.token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| CivicaError::Internal(format!("failed to render config: {e}")))
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("civica={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

//! Kino Embed CLI - Embed composition and preview tool
//!
//! Features:
//! - Compose embed URLs from a base URL and parameters
//! - Validate embed configuration files
//! - Preview an embed's lifecycle against the headless host

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Kino Embed CLI - iframe embed toolkit
#[derive(Parser)]
#[command(name = "kino-embed")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Compose, validate and preview Kino player embeds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose an embed URL
    Compose {
        /// Base URL of the embedded player
        src: String,

        /// Parameter to append (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Check an embed configuration file
    Validate {
        /// Path to a JSON embed configuration
        config: PathBuf,

        /// Fail on warnings
        #[arg(long)]
        strict: bool,
    },

    /// Run an embed through its lifecycle on the headless host
    Preview {
        /// Path to a JSON embed configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base URL (overrides the configuration file)
        #[arg(long)]
        src: Option<String>,

        /// Parameter to append (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Load immediately instead of waiting for the viewport
        #[arg(long)]
        eager: bool,

        /// Simulate the embed scrolling into view
        #[arg(long)]
        enter_viewport: bool,

        /// Simulate the embedded content finishing its load
        #[arg(long)]
        load: bool,

        /// Inbound message from the embed (repeatable)
        #[arg(short, long = "message", value_name = "ORIGIN=JSON")]
        messages: Vec<String>,

        /// Outbound JSON message to post into the embed (repeatable)
        #[arg(long = "post", value_name = "JSON")]
        posts: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    kino_embed::init();

    match cli.command {
        Commands::Compose { src, params } => {
            commands::compose(&src, &params, &cli.format)?;
        }
        Commands::Validate { config, strict } => {
            commands::validate(&config, strict, &cli.format)?;
        }
        Commands::Preview {
            config,
            src,
            params,
            eager,
            enter_viewport,
            load,
            messages,
            posts,
        } => {
            let options = commands::PreviewOptions {
                config,
                src,
                params,
                eager,
                enter_viewport,
                load,
                messages,
                posts,
            };
            commands::preview(options, &cli.format)?;
        }
    }

    Ok(())
}

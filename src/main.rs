//! Refmaster CLI - Reference-Matched Mastering
//!
//! Command-line driver for the Refmaster mastering core.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use refmaster::cli::commands::{self, MasterOptions};
use refmaster::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Refmaster v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Refmaster v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Master {
            target,
            reference,
            preset,
            params,
            quality,
            config,
            storage,
        } => {
            let options = MasterOptions {
                reference,
                preset,
                params,
                quality,
                config,
                storage,
            };
            commands::master(&target, options)
                .with_context(|| format!("mastering {} failed", target.display()))
        }
        Commands::Render {
            input,
            output,
            title,
            quality,
        } => commands::render(&input, &output, &title, quality)
            .with_context(|| format!("rendering {} failed", input.display())),
        Commands::Analyze { input } => commands::analyze(&input)
            .with_context(|| format!("analyzing {} failed", input.display())),
    }
}

//! Pinpoint CLI - Run the test nearest a cursor
//!
//! Locates the nearest test declaration, builds, runs it and prints
//! failures as `file:line: error: message` diagnostics.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pinpoint_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{LocateArgs, RunArgs};

/// Pinpoint: run the nearest test and annotate its failures
#[derive(Parser, Debug)]
#[command(name = "pinpoint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Build command (overrides config and env)
    #[arg(long, global = true)]
    build_command: Option<String>,

    /// Build directory (overrides config and env)
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    /// Skip the build step
    #[arg(long, global = true)]
    no_build: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Build and run the test nearest a line
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Show which test a line resolves to without running it
    #[command(visible_alias = "l")]
    Locate(LocateArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load configuration with overrides
    let config =
        Config::load_with_overrides(cli.build_command.clone(), cli.build_dir.clone(), cli.no_build)?;

    if cli.verbose {
        tracing::info!(
            build_command = %config.build.command,
            build_dir = %config.build.directory.display(),
            build_enabled = config.build.enabled,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("pinpoint {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run(args)) => {
            let code = args.execute(cli.verbose, &config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Some(Commands::Locate(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Config) => {
            println!("Pinpoint Configuration");
            println!("======================");
            println!();
            println!("Build Settings:");
            println!("  enabled: {}", config.build.enabled);
            println!("  command: {} {}", config.build.command, config.build.args.join(" "));
            println!("  directory: {}", config.build.directory.display());
            println!();
            println!("Runner Settings:");
            if config.runner.args.is_empty() {
                println!("  args: (none)");
            } else {
                println!("  args: {}", config.runner.args.join(" "));
            }
            println!();
            println!("Diagnostics source: {}", config.diagnostics.source);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Pinpoint - Run the nearest test and annotate its failures");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

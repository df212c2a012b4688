//! stepreel CLI - Inspect, export and replay recorded tutorials.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use stepreel::cli;
use stepreel::config::load_config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepreel")]
#[command(author, version, about = "Record browser interactions as step-by-step tutorials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recorded steps.
    Steps,

    /// Show one step as JSON.
    Show {
        /// Step number, starting at 1.
        number: usize,
    },

    /// Export recorded steps as an HTML slideshow.
    Export {
        /// Output file. Defaults to the configured file name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove all recorded steps.
    Clear,

    /// Replay a scripted browsing session and record it.
    Replay {
        /// JSON script of page actions and DOM events.
        script: PathBuf,

        /// JPEG used as every step's screenshot.
        #[arg(short, long)]
        screenshot: Option<PathBuf>,

        /// Also export the result as an HTML slideshow.
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let result = load_config().and_then(|config| match cli.command {
        Commands::Steps => cli::steps::run(&config),
        Commands::Show { number } => cli::show::run(&config, number),
        Commands::Export { output } => cli::export::run(&config, output.as_deref()),
        Commands::Clear => cli::clear::run(&config),
        Commands::Replay {
            script,
            screenshot,
            export,
        } => cli::replay::run(&config, &script, screenshot.as_deref(), export.as_deref()),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stepreel: error: {e}");
            ExitCode::FAILURE
        }
    }
}

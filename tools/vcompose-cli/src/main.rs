//! vcompose CLI: build and export media compositions.
//!
//! Usage:
//!   vcompose compose <EXPR.json> -o <OUT>    Build and export an expression
//!   vcompose compose --merge <FILES..> -o <OUT>
//!   vcompose plan <EXPR.json>                Build only and print the timeline
//!   vcompose probe <FILE>                    Show the tracks of one source
//!   vcompose check                           Check for ffmpeg/ffprobe
//!   vcompose init-config                     Write the default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vcompose_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vcompose",
    about = "Compose images and videos into a single timeline",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a composition and export it
    Compose {
        /// Expression file (JSON)
        #[arg(required_unless_present_any = ["merge", "concat"])]
        expr: Option<PathBuf>,

        /// Overlay these files instead of reading an expression
        #[arg(long, num_args = 1.., conflicts_with_all = ["expr", "concat"])]
        merge: Vec<PathBuf>,

        /// Play these files one after another instead of reading an expression
        #[arg(long, num_args = 1.., conflicts_with_all = ["expr", "merge"])]
        concat: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Encode profile: auto|passthrough|reencode
        #[arg(long)]
        preset: Option<String>,

        /// Asset mapping (id=path), repeatable
        #[arg(long = "asset")]
        assets: Vec<String>,
    },

    /// Build a composition and print its timeline without exporting
    Plan {
        /// Expression file (JSON)
        expr: PathBuf,

        /// Print the full composition result as JSON
        #[arg(long)]
        json: bool,

        /// Resolve sources from a track manifest instead of probing files
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Asset mapping (id=path), repeatable
        #[arg(long = "asset")]
        assets: Vec<String>,
    },

    /// Show the tracks a single source resolves to
    Probe {
        /// Media file, or asset:<id>
        source: String,

        /// Asset mapping (id=path), repeatable
        #[arg(long = "asset")]
        assets: Vec<String>,
    },

    /// Check for the external tools export depends on
    Check,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match &cli.config {
        Some(path) => (AppConfig::load_from(path)?, None),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    vcompose_common::logging::init_logging(&config.logging);
    if let Some(e) = load_error {
        tracing::warn!("Failed to load config, using defaults: {e}");
    }

    match cli.command {
        Commands::Compose {
            expr,
            merge,
            concat,
            output,
            preset,
            assets,
        } => {
            let expression = commands::load_expression(expr, merge, concat)?;
            commands::compose::run(&config, expression, output, preset, assets).await
        }
        Commands::Plan {
            expr,
            json,
            manifest,
            assets,
        } => commands::plan::run(&config, expr, json, manifest, assets),
        Commands::Probe { source, assets } => commands::probe::run(&config, source, assets),
        Commands::Check => commands::check::run(&config),
        Commands::InitConfig { force } => commands::init_config::run(force),
    }
}

//! # Trendline CLI (`trendline`)
//!
//! ## Usage
//!
//! ```bash
//! trendline --config ./config/trendline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trendline init` | Create the SQLite database and run schema migrations |
//! | `trendline run` | Execute one daily pipeline run |
//! | `trendline runs` | List recent runs and their status |
//! | `trendline trends --input <path>` | Aggregate raw trend samples into daily records |
//! | `trendline quality --input <file>` | Score a cluster assignment |
//!
//! Logs go to stderr; `RUST_LOG` overrides the configured level.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use trendline::config::{self, LoggingConfig};
use trendline::{migrate, quality_cmd, runs, trends_cmd};

/// Trendline: daily trend-signal pipeline with a durable run lifecycle.
///
/// Commands that touch the database read a TOML configuration file given
/// by `--config`. See `config/trendline.example.toml`.
#[derive(Parser)]
#[command(
    name = "trendline",
    about = "Trendline: a daily trend-signal pipeline with a durable run lifecycle",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/trendline.toml`.
    #[arg(long, global = true, default_value = "./config/trendline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the `pipeline_runs` and
    /// `artifacts` tables. Safe to run repeatedly.
    Init,

    /// Execute one daily run.
    ///
    /// Collects, deduplicates, preprocesses and (when configured) embeds,
    /// analyzes and aggregates trends. The run is recorded as `success`
    /// or `failed`; a failed run exits non-zero.
    Run,

    /// List recent runs, newest first.
    Runs {
        /// Maximum number of runs to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Aggregate raw trend samples into labelled daily records.
    ///
    /// Does not need a database.
    Trends {
        /// A JSON file or a directory of JSON files with
        /// `[{"keyword", "date", "value"}]` samples.
        #[arg(long)]
        input: PathBuf,

        /// Output directory. Defaults to `[trends].output_dir` or
        /// `./outputs/trends`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Score a cluster assignment with cosine cohesion and separation.
    ///
    /// Does not need a database.
    Quality {
        /// JSON file with `{"vectors": [[..]], "labels": [..]}`.
        #[arg(long)]
        input: PathBuf,

        /// Include per-cluster-pair separation.
        #[arg(long)]
        breakdown: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config);

    let logging = cfg
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    if let Err(err) = dispatch(cli.command, cfg).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands, cfg: Result<config::Config>) -> Result<()> {
    match command {
        // Commands that don't require config
        Commands::Trends { input, out } => {
            let out = out.unwrap_or_else(|| match &cfg {
                Ok(c) => c.trends.output_dir.clone(),
                Err(_) => PathBuf::from("./outputs/trends"),
            });
            trends_cmd::run_trends(&input, &out)?;
        }
        Commands::Quality { input, breakdown } => {
            quality_cmd::run_quality(&input, breakdown)?;
        }
        Commands::Init => {
            let cfg = cfg?;
            migrate::run_migrations(&cfg).await?;
            println!("initialized");
        }
        Commands::Run => {
            let cfg = cfg?;
            runs::run_daily(&cfg).await?;
        }
        Commands::Runs { limit } => {
            let cfg = cfg?;
            runs::list_runs(&cfg, limit).await?;
        }
    }

    Ok(())
}

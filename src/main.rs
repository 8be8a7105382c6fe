//! food-ehanpp command-line entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use food_ehanpp::{pipeline, PipelineConfig};

/// Command-line arguments for food-ehanpp
#[derive(Parser, Debug)]
#[command(name = "food-ehanpp")]
#[command(about = "Urban/rural split of food-related pressure")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "FOOD_EHANPP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the raw extracts and lookup tables
    #[arg(short, long, env = "FOOD_EHANPP_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory the output tables are written to
    #[arg(short, long, env = "FOOD_EHANPP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and write the median, upper and lower band panels
    Panel,
    /// Build the panels, then reconcile, allocate and aggregate
    Run {
        /// Load previously written CSV panels from this directory instead
        #[arg(long)]
        panels_from: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PipelineConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = args.input_dir {
        config.input_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        "starting food-ehanpp"
    );

    let written = match args.command {
        Command::Panel => pipeline::run_panels(&config).context("Panel build failed")?,
        Command::Run { panels_from } => {
            pipeline::run(&config, panels_from.as_deref()).context("Pipeline run failed")?
        }
    };

    for path in &written {
        info!(path = %path.display(), "output");
    }
    Ok(())
}

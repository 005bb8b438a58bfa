mod app;

use anyhow::{Context, Result};
use clap::Parser;
use fedsim_coordinator::ExperimentSpec;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Parse and expand the experiment file, reporting the runs it defines.
    ValidateConfig,
    /// Execute every run in the experiment, sequentially.
    Run,
}

#[derive(Parser, Debug, Clone)]
struct CommonArgs {
    /// Path to JSON experiment spec
    #[clap(long)]
    experiment: PathBuf,

    /// Directory for per-round model checkpoints; nothing is written if unset.
    #[clap(long)]
    log_dir: Option<PathBuf>,

    /// Override the experiment's seed.
    #[clap(long)]
    seed: Option<u64>,

    /// Override the experiment's per-round prune amount.
    #[clap(long)]
    prune: Option<u32>,
}

fn load_experiment(args: &CommonArgs) -> Result<ExperimentSpec> {
    let raw = std::fs::read(&args.experiment)
        .with_context(|| format!("failed to read experiment file {:?}", args.experiment))?;
    let mut spec: ExperimentSpec = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse experiment file {:?}", args.experiment))?;
    if let Some(seed) = args.seed {
        spec.seed = seed;
    }
    if let Some(prune) = args.prune {
        spec.prune = prune;
    }
    Ok(spec)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let spec = load_experiment(&args.common);

    match args.command {
        Commands::ValidateConfig => match spec.and_then(|s| app::validate(&s)) {
            Ok(num_runs) => info!(num_runs, "experiment config is OK"),
            Err(error) => {
                error!("error found in experiment config: {error:#}");
                std::process::exit(1);
            }
        },
        Commands::Run => app::run_all(&spec?, args.common.log_dir.as_deref())?,
    }

    Ok(())
}

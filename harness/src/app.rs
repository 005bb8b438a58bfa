use anyhow::{bail, Context, Result};
use fedsim_coordinator::{
    expand_experiment, Checkpointer, ClientTrainer, Coordinator, ExperimentSpec, RunConfig,
    SimClient,
};
use fedsim_core::seeded_rng;
use fedsim_data::load_dataset;
use std::path::Path;
use tracing::info;

/// Expand the experiment and sanity-check every run it defines.
pub fn validate(spec: &ExperimentSpec) -> Result<usize> {
    let runs = expand_experiment(spec)?;
    for (index, config) in runs.iter().enumerate() {
        check_run(index, config)?;
        // surface dataset id problems at validation time too
        load_dataset(&config.data, config.seed)
            .with_context(|| format!("run {index}"))
            .map(|_| ())?;
    }
    Ok(runs.len())
}

/// Execute every expanded run, strictly sequentially.
pub fn run_all(spec: &ExperimentSpec, log_dir: Option<&Path>) -> Result<()> {
    let runs = expand_experiment(spec)?;
    info!(num_runs = runs.len(), "expanded experiment");

    for (index, config) in runs.into_iter().enumerate() {
        info!(run = index, config = ?config, "starting run");
        run_one(index, config, log_dir).with_context(|| format!("run {index} failed"))?;
    }
    Ok(())
}

fn check_run(index: usize, config: &RunConfig) -> Result<()> {
    if config.algo != "FedAvg" {
        bail!("run {index}: unsupported algorithm {:?}", config.algo);
    }
    if !config.check() {
        bail!("run {index}: invalid hyperparameters: {config:?}");
    }
    Ok(())
}

fn run_one(index: usize, config: RunConfig, log_dir: Option<&Path>) -> Result<()> {
    check_run(index, &config)?;

    let (train, test) = load_dataset(&config.data, config.seed)?;
    let shards = train.partition_iid(config.num_clients as usize, &mut seeded_rng(config.seed));
    let clients: Vec<Box<dyn ClientTrainer>> = shards
        .into_iter()
        .enumerate()
        .map(|(id, shard)| Box::new(SimClient::new(id, &config, shard)) as Box<dyn ClientTrainer>)
        .collect();

    let checkpointer = log_dir.map(|dir| Checkpointer::new(dir.join(format!("run{index}"))));
    let mut coordinator = Coordinator::new(config, clients, test, checkpointer)?;
    coordinator.run()?;

    info!(
        run = index,
        accuracies = ?coordinator.accuracies(),
        "run complete"
    );
    Ok(())
}

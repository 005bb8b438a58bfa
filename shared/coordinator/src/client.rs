use crate::coordinator::{model_dims, CLIENT_STREAM_BASE};
use crate::{ClientTrainer, CoordinatorError, RunConfig};
use fedsim_core::fork_rng;
use fedsim_data::Dataset;
use fedsim_modeling::{prune_fixed_amount, rewind_to, Mlp, ModelSnapshot};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// A simulated client: owns one IID shard of the training data and a local
/// model. Selected clients load the global model, train locally, and
/// (optionally) prune-and-rewind lottery-ticket style.
pub struct SimClient {
    id: usize,
    train_set: Dataset,
    model: Mlp,
    latest: ModelSnapshot,
    local_epochs: u32,
    batch_size: usize,
    learning_rate: f32,
    prune_amount: usize,
    rng: ChaCha8Rng,
}

impl SimClient {
    pub fn new(id: usize, config: &RunConfig, train_set: Dataset) -> Self {
        let mut rng = fork_rng(config.seed, CLIENT_STREAM_BASE + id as u64);
        let model = Mlp::new(&model_dims(&train_set), &mut rng);
        let latest = model.snapshot();
        Self {
            id,
            train_set,
            model,
            latest,
            local_epochs: config.local_epochs,
            batch_size: config.batch_size as usize,
            learning_rate: config.learning_rate as f32,
            prune_amount: config.prune_amount as usize,
            rng,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl ClientTrainer for SimClient {
    fn num_samples(&self) -> usize {
        self.train_set.len()
    }

    fn local_model(&self) -> &ModelSnapshot {
        &self.latest
    }

    fn client_update(
        &mut self,
        global: &ModelSnapshot,
        global_init: &ModelSnapshot,
    ) -> Result<ModelSnapshot, CoordinatorError> {
        self.model.load_global(global)?;
        let loss = self.model.train_epochs(
            &self.train_set,
            self.local_epochs,
            self.batch_size,
            self.learning_rate,
            &mut self.rng,
        );
        if self.prune_amount > 0 {
            prune_fixed_amount(&mut self.model, self.prune_amount);
            rewind_to(&mut self.model, global_init)?;
        }
        debug!(
            client = self.id,
            loss,
            sparsity = self.model.sparsity(),
            samples = self.train_set.len(),
            "client update"
        );
        self.latest = self.model.snapshot();
        Ok(self.latest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedsim_core::{fork_rng, seeded_rng};
    use fedsim_data::SyntheticSpec;

    fn config() -> RunConfig {
        RunConfig {
            algo: "FedAvg".to_string(),
            data: "synth_small".to_string(),
            rounds: 1,
            client_fraction: 1.0,
            num_clients: 2,
            local_epochs: 2,
            batch_size: 16,
            learning_rate: 0.1,
            prune_amount: 0,
            seed: 5,
        }
    }

    #[test]
    fn update_starts_from_the_global_model() {
        let (train, _) = SyntheticSpec::small().generate(5);
        let shards = train.partition_iid(2, &mut seeded_rng(1));
        let cfg = config();
        let mut client = SimClient::new(0, &cfg, shards[0].clone());

        let global = Mlp::new(&model_dims(&shards[0]), &mut fork_rng(cfg.seed, 1)).snapshot();
        let updated = client.client_update(&global, &global).unwrap();

        assert_ne!(&updated, &global, "training should move the weights");
        assert_eq!(client.local_model(), &updated);
    }

    #[test]
    fn pruning_update_accumulates_sparsity() {
        let (train, _) = SyntheticSpec::small().generate(6);
        let shards = train.partition_iid(2, &mut seeded_rng(2));
        let mut cfg = config();
        cfg.prune_amount = 20;
        let mut client = SimClient::new(1, &cfg, shards[1].clone());

        let init = Mlp::new(&model_dims(&shards[1]), &mut fork_rng(cfg.seed, 1)).snapshot();
        let first = client.client_update(&init, &init).unwrap();
        let second = client.client_update(&first, &init).unwrap();

        let pruned = |snap: &ModelSnapshot| -> usize {
            snap.masks
                .values()
                .flat_map(|m| m.data())
                .filter(|&&m| m == 0.0)
                .count()
        };
        assert_eq!(pruned(&first), 20);
        assert_eq!(pruned(&second), 40);
    }
}

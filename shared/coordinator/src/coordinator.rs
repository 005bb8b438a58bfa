use crate::{Checkpointer, ClientTrainer, RunConfig};
use fedsim_core::fork_rng;
use fedsim_data::Dataset;
use fedsim_modeling::{average_weights, evaluate, Mlp, ModelError, ModelSnapshot};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const HIDDEN_UNITS: usize = 32;

// RNG stream ids derived from the run seed. Streams >= 100 belong to data
// generation, streams >= 1000 to clients.
const SELECTION_STREAM: u64 = 0;
const GLOBAL_MODEL_STREAM: u64 = 1;
pub(crate) const CLIENT_STREAM_BASE: u64 = 1000;

/// Model shape shared by the global model and every client's local model.
pub fn model_dims(data: &Dataset) -> Vec<usize> {
    vec![data.num_features(), HIDDEN_UNITS, data.num_classes()]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Uninitialized,
    RoundTrain,
    Finished,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Uninitialized => write!(f, "Uninitialized"),
            RunState::RoundTrain => write!(f, "Training"),
            RunState::Finished => write!(f, "Finished"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("config expects {expected} clients but {actual} were provided")]
    ClientCountMismatch { expected: usize, actual: usize },
    #[error("cannot run a coordinator in state {0}")]
    InvalidRunState(RunState),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Drives one run: holds the global model per round, every client's model
/// per round, and the accuracy history. Strictly sequential; any training
/// or checkpoint error aborts the run.
pub struct Coordinator {
    config: RunConfig,
    clients: Vec<Box<dyn ClientTrainer>>,
    client_sample_counts: Vec<usize>,

    /// `(rounds + 1) x num_clients`; row 0 is unused (pre-round state lives
    /// in the clients), rows 1..=rounds are filled as rounds complete.
    client_models: Vec<Vec<Option<ModelSnapshot>>>,
    /// `global_models[r]` is the model after round r; index 0 is the
    /// initial model.
    global_models: Vec<ModelSnapshot>,
    global_init_model: ModelSnapshot,

    accuracies: Vec<f64>,
    elapsed_comm_rounds: u32,
    run_state: RunState,
    selection_rng: ChaCha8Rng,
    test_set: Dataset,
    checkpointer: Option<Checkpointer>,
}

impl Coordinator {
    pub fn new(
        config: RunConfig,
        clients: Vec<Box<dyn ClientTrainer>>,
        test_set: Dataset,
        checkpointer: Option<Checkpointer>,
    ) -> Result<Self, CoordinatorError> {
        if clients.len() != config.num_clients as usize {
            return Err(CoordinatorError::ClientCountMismatch {
                expected: config.num_clients as usize,
                actual: clients.len(),
            });
        }

        let client_sample_counts = clients.iter().map(|c| c.num_samples()).collect();

        let init_model = Mlp::new(
            &model_dims(&test_set),
            &mut fork_rng(config.seed, GLOBAL_MODEL_STREAM),
        )
        .snapshot();

        let rounds = config.rounds as usize;
        Ok(Self {
            client_models: vec![vec![None; clients.len()]; rounds + 1],
            global_models: vec![init_model.clone()],
            global_init_model: init_model,
            accuracies: Vec::with_capacity(rounds),
            elapsed_comm_rounds: 0,
            run_state: RunState::Uninitialized,
            selection_rng: fork_rng(config.seed, SELECTION_STREAM),
            config,
            clients,
            client_sample_counts,
            test_set,
            checkpointer,
        })
    }

    /// Run all communication rounds to completion.
    pub fn run(&mut self) -> anyhow::Result<()> {
        if self.run_state != RunState::Uninitialized {
            return Err(CoordinatorError::InvalidRunState(self.run_state).into());
        }
        self.run_state = RunState::RoundTrain;

        for round in 1..=self.config.rounds {
            self.tick_round(round)?;
        }

        self.run_state = RunState::Finished;
        info!(
            rounds = self.elapsed_comm_rounds,
            final_accuracy = self.accuracies.last().copied().unwrap_or_default(),
            "run finished"
        );
        Ok(())
    }

    fn tick_round(&mut self, round: u32) -> anyhow::Result<()> {
        self.elapsed_comm_rounds += 1;

        let selected = self.select_clients();
        info!(round, selected = ?selected, "communication round");

        let global_prev = self.global_models[round as usize - 1].clone();
        let global_init = self.global_init_model.clone();

        for (j, client) in self.clients.iter_mut().enumerate() {
            let snapshot = if selected.contains(&j) {
                client.client_update(&global_prev, &global_init)?
            } else {
                client.local_model().clone()
            };
            self.client_models[round as usize][j] = Some(snapshot);
        }

        let round_models: Vec<&ModelSnapshot> = selected
            .iter()
            .map(|&j| self.client_models[round as usize][j].as_ref().unwrap())
            .collect();
        let round_counts: Vec<usize> = selected
            .iter()
            .map(|&j| self.client_sample_counts[j])
            .collect();

        let global = average_weights(&round_models, &round_counts)
            .map_err(CoordinatorError::Model)?;

        let eval = evaluate(
            &Mlp::from_snapshot(&global).map_err(CoordinatorError::Model)?,
            &self.test_set,
        );
        info!(
            round,
            accuracy = eval.accuracy,
            loss = eval.loss,
            "evaluated global model"
        );
        self.accuracies.push(eval.accuracy);

        debug_assert_eq!(self.global_models.len(), round as usize);
        self.global_models.push(global);

        if let Some(checkpointer) = &self.checkpointer {
            checkpointer.save_round(round, &self.client_models, &self.global_models)?;
            debug!(round, "checkpointed round state");
        }
        Ok(())
    }

    /// `max(floor(C * K), 1)` distinct client indices, uniform without
    /// replacement from the selection stream.
    fn select_clients(&mut self) -> Vec<usize> {
        let num_clients = self.clients.len();
        let num_selected = self.num_selected_clients();
        let mut selected =
            rand::seq::index::sample(&mut self.selection_rng, num_clients, num_selected)
                .into_vec();
        selected.sort_unstable();
        selected
    }

    pub fn num_selected_clients(&self) -> usize {
        ((self.config.client_fraction * self.config.num_clients as f64).floor() as usize).max(1)
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn elapsed_rounds(&self) -> u32 {
        self.elapsed_comm_rounds
    }

    pub fn accuracies(&self) -> &[f64] {
        &self.accuracies
    }

    pub fn global_model(&self, round: u32) -> Option<&ModelSnapshot> {
        self.global_models.get(round as usize)
    }

    pub fn client_model(&self, round: u32, client: usize) -> Option<&ModelSnapshot> {
        self.client_models
            .get(round as usize)?
            .get(client)?
            .as_ref()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

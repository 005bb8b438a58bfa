mod checkpoint;
mod client;
mod config;
mod coordinator;
mod traits;

pub use checkpoint::Checkpointer;
pub use client::SimClient;
pub use config::{expand_experiment, Axis, ConfigError, ExperimentSpec, RunConfig};
pub use coordinator::{model_dims, Coordinator, CoordinatorError, RunState, HIDDEN_UNITS};
pub use traits::ClientTrainer;

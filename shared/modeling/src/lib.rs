mod average;
mod eval;
mod mlp;
mod pruning;
mod tensor;

pub use average::average_weights;
pub use eval::{evaluate, EvalResult};
pub use mlp::{Mlp, ModelSnapshot, ParamMap};
pub use pruning::{prune_fixed_amount, rewind_to};
pub use tensor::Tensor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("got {models} models but {counts} sample counts")]
    CountMismatch { models: usize, counts: usize },
    #[error("cannot average an empty set of models")]
    EmptyAverage,
    #[error("total sample count across averaged models is zero")]
    ZeroSampleCount,
    #[error("model snapshots do not align: {0}")]
    SnapshotMismatch(String),
}

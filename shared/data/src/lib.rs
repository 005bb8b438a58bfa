mod dataset;
mod synthetic;

pub use dataset::{Dataset, Example};
pub use synthetic::{load_dataset, DataError, SyntheticSpec};

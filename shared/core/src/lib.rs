mod linspace;
mod rng;
mod running_average;

pub use linspace::{linspace_f64, linspace_i64, round4};
pub use rng::{fork_rng, seeded_rng};
pub use running_average::RunningAverage;

use serde::{Deserialize, Serialize};

/// Streaming mean, used for per-batch losses during evaluation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    sum: f64,
    count: u64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn push_weighted(&mut self, value: f64, weight: u64) {
        self.sum += value * weight as f64;
        self.count += weight;
    }

    pub fn mean(&self) -> f64 {
        match self.count {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

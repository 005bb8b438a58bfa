use crate::mlp::{argmax, softmax_in_place};
use crate::Mlp;
use fedsim_core::RunningAverage;
use fedsim_data::Dataset;

#[derive(Clone, Copy, Debug, Default)]
pub struct EvalResult {
    pub accuracy: f64,
    pub loss: f64,
}

/// Accuracy and mean cross-entropy over a held-out split.
pub fn evaluate(model: &Mlp, data: &Dataset) -> EvalResult {
    let mut correct = 0usize;
    let mut loss = RunningAverage::new();
    for example in data.examples() {
        let mut probs = model.forward(&example.features);
        softmax_in_place(&mut probs);
        if argmax(&probs) == example.label {
            correct += 1;
        }
        loss.push(-(probs[example.label].max(1e-12) as f64).ln());
    }
    EvalResult {
        accuracy: match data.len() {
            0 => 0.0,
            n => correct as f64 / n as f64,
        },
        loss: loss.mean(),
    }
}

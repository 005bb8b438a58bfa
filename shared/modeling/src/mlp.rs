use crate::{ModelError, Tensor};
use fedsim_data::Dataset;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

pub type ParamMap = BTreeMap<String, Tensor>;

/// Serializable state of a model at a point in time: what the coordinator
/// stores per (round, client), averages, and writes to disk.
///
/// `masks` holds one 0/1-valued tensor per weight tensor, keyed like
/// `params`. Biases are never pruned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub dims: Vec<usize>,
    pub params: ParamMap,
    pub masks: ParamMap,
}

/// Multi-layer perceptron classifier: ReLU hidden layers, softmax output,
/// trained with mini-batch SGD and manual backprop. Each weight tensor
/// carries a pruning mask; pruned weights are pinned at zero through
/// training and through global-model loads.
#[derive(Clone, Debug)]
pub struct Mlp {
    pub(crate) dims: Vec<usize>,
    pub(crate) weights: Vec<Tensor>,
    pub(crate) biases: Vec<Tensor>,
    pub(crate) masks: Vec<Tensor>,
}

impl Mlp {
    /// Xavier-uniform init, all-ones masks. Deterministic per RNG state.
    pub fn new(dims: &[usize], rng: &mut ChaCha8Rng) -> Self {
        assert!(dims.len() >= 2, "an MLP needs at least input and output dims");

        let mut weights = Vec::with_capacity(dims.len() - 1);
        let mut biases = Vec::with_capacity(dims.len() - 1);
        let mut masks = Vec::with_capacity(dims.len() - 1);
        for layer in dims.windows(2) {
            let (fan_in, fan_out) = (layer[0], layer[1]);
            let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
            weights.push(Tensor::from_fn(fan_out, fan_in, || {
                rng.gen_range(-bound..bound)
            }));
            biases.push(Tensor::zeros(1, fan_out));
            masks.push(Tensor::ones(fan_out, fan_in));
        }

        Self {
            dims: dims.to_vec(),
            weights,
            biases,
            masks,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of prunable (weight) entries.
    pub fn num_weights(&self) -> usize {
        self.weights.iter().map(Tensor::len).sum()
    }

    /// Fraction of weights currently pruned.
    pub fn sparsity(&self) -> f64 {
        let masked: usize = self
            .masks
            .iter()
            .flat_map(|m| m.data())
            .filter(|&&m| m == 0.0)
            .count();
        match self.num_weights() {
            0 => 0.0,
            total => masked as f64 / total as f64,
        }
    }

    /// Logits for one example.
    pub fn forward(&self, features: &[f32]) -> Vec<f32> {
        let mut activation = features.to_vec();
        let last = self.weights.len() - 1;
        for (l, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let mut out = vec![0.0f32; w.rows()];
            for (i, out_i) in out.iter_mut().enumerate() {
                let mut acc = b.data()[i];
                for (j, x) in activation.iter().enumerate() {
                    acc += w.at(i, j) * x;
                }
                *out_i = if l < last { acc.max(0.0) } else { acc };
            }
            activation = out;
        }
        activation
    }

    pub fn predict(&self, features: &[f32]) -> usize {
        argmax(&self.forward(features))
    }

    /// `epochs` passes of mini-batch SGD over `data`. Masked weights are
    /// re-zeroed after every step so pruned connections never recover.
    /// Returns the mean loss of the final epoch.
    pub fn train_epochs(
        &mut self,
        data: &Dataset,
        epochs: u32,
        batch_size: usize,
        learning_rate: f32,
        rng: &mut ChaCha8Rng,
    ) -> f64 {
        assert!(batch_size > 0, "batch size must be non-zero");
        if data.is_empty() {
            return 0.0;
        }

        let mut indices: Vec<usize> = (0..data.len()).collect();
        let mut epoch_loss = 0.0;
        for epoch in 0..epochs {
            indices.shuffle(rng);
            let mut loss_sum = 0.0f64;
            for batch in indices.chunks(batch_size) {
                loss_sum += self.sgd_step(data, batch, learning_rate);
            }
            epoch_loss = loss_sum / data.len() as f64;
            trace!(epoch, loss = epoch_loss, "local epoch");
        }
        epoch_loss
    }

    /// One gradient step over the given example indices. Returns the summed
    /// cross-entropy loss of the batch (pre-update).
    fn sgd_step(&mut self, data: &Dataset, batch: &[usize], learning_rate: f32) -> f64 {
        let num_layers = self.weights.len();
        let mut grad_w: Vec<Tensor> = self
            .weights
            .iter()
            .map(|w| Tensor::zeros(w.rows(), w.cols()))
            .collect();
        let mut grad_b: Vec<Tensor> = self
            .biases
            .iter()
            .map(|b| Tensor::zeros(b.rows(), b.cols()))
            .collect();

        let mut loss_sum = 0.0f64;
        for &idx in batch {
            let example = &data.examples()[idx];

            // forward, keeping each layer's post-activation
            let mut activations: Vec<Vec<f32>> = Vec::with_capacity(num_layers + 1);
            activations.push(example.features.clone());
            for l in 0..num_layers {
                let (w, b) = (&self.weights[l], &self.biases[l]);
                let input = &activations[l];
                let mut out = vec![0.0f32; w.rows()];
                for (i, out_i) in out.iter_mut().enumerate() {
                    let mut acc = b.data()[i];
                    for (j, x) in input.iter().enumerate() {
                        acc += w.at(i, j) * x;
                    }
                    *out_i = if l < num_layers - 1 { acc.max(0.0) } else { acc };
                }
                activations.push(out);
            }

            let mut probs = activations[num_layers].clone();
            softmax_in_place(&mut probs);
            loss_sum += -(probs[example.label].max(1e-12) as f64).ln();

            // delta starts as dL/dlogits for softmax cross-entropy
            let mut delta = probs;
            delta[example.label] -= 1.0;

            for l in (0..num_layers).rev() {
                let input = &activations[l];
                for (i, &d) in delta.iter().enumerate() {
                    *grad_b[l].at_mut(0, i) += d;
                    for (j, x) in input.iter().enumerate() {
                        *grad_w[l].at_mut(i, j) += d * x;
                    }
                }
                if l > 0 {
                    let w = &self.weights[l];
                    let mut prev = vec![0.0f32; w.cols()];
                    for (j, p) in prev.iter_mut().enumerate() {
                        let mut acc = 0.0;
                        for (i, &d) in delta.iter().enumerate() {
                            acc += w.at(i, j) * d;
                        }
                        // ReLU derivative from the post-activation
                        *p = if activations[l][j] > 0.0 { acc } else { 0.0 };
                    }
                    delta = prev;
                }
            }
        }

        let scale = -learning_rate / batch.len() as f32;
        for l in 0..num_layers {
            self.weights[l].scaled_add(scale, &grad_w[l]);
            self.weights[l].hadamard(&self.masks[l]);
            self.biases[l].scaled_add(scale, &grad_b[l]);
        }
        loss_sum
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        let mut params = ParamMap::new();
        let mut masks = ParamMap::new();
        for (l, ((w, b), m)) in self.weights.iter().zip(&self.biases).zip(&self.masks).enumerate() {
            params.insert(format!("fc{l}.weight"), w.clone());
            params.insert(format!("fc{l}.bias"), b.clone());
            masks.insert(format!("fc{l}.weight"), m.clone());
        }
        ModelSnapshot {
            dims: self.dims.clone(),
            params,
            masks,
        }
    }

    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self, ModelError> {
        if snapshot.dims.len() < 2 {
            return Err(ModelError::SnapshotMismatch(format!(
                "invalid dims {:?}",
                snapshot.dims
            )));
        }
        let mut rng = fedsim_core::seeded_rng(0);
        let mut model = Mlp::new(&snapshot.dims, &mut rng);
        for l in 0..model.weights.len() {
            model.weights[l] = Self::lookup(snapshot, &format!("fc{l}.weight"))?.clone();
            model.biases[l] = Self::lookup(snapshot, &format!("fc{l}.bias"))?.clone();
            model.masks[l] = snapshot
                .masks
                .get(&format!("fc{l}.weight"))
                .ok_or_else(|| ModelError::SnapshotMismatch(format!("missing mask fc{l}.weight")))?
                .clone();
        }
        model.check_shapes()?;
        Ok(model)
    }

    /// Overwrite parameters from a (dense) global snapshot, keeping this
    /// model's own masks: weights this model has pruned stay zero no matter
    /// what the average produced.
    pub fn load_global(&mut self, global: &ModelSnapshot) -> Result<(), ModelError> {
        if global.dims != self.dims {
            return Err(ModelError::SnapshotMismatch(format!(
                "dims {:?} != {:?}",
                global.dims, self.dims
            )));
        }
        for l in 0..self.weights.len() {
            let w = Self::lookup(global, &format!("fc{l}.weight"))?;
            let b = Self::lookup(global, &format!("fc{l}.bias"))?;
            if !w.same_shape(&self.weights[l]) || !b.same_shape(&self.biases[l]) {
                return Err(ModelError::SnapshotMismatch(format!(
                    "layer {l} shape mismatch"
                )));
            }
            self.weights[l] = w.clone();
            self.weights[l].hadamard(&self.masks[l]);
            self.biases[l] = b.clone();
        }
        Ok(())
    }

    fn lookup<'a>(snapshot: &'a ModelSnapshot, key: &str) -> Result<&'a Tensor, ModelError> {
        snapshot
            .params
            .get(key)
            .ok_or_else(|| ModelError::SnapshotMismatch(format!("missing parameter {key}")))
    }

    fn check_shapes(&self) -> Result<(), ModelError> {
        for (l, layer) in self.dims.windows(2).enumerate() {
            let ok = self.weights[l].rows() == layer[1]
                && self.weights[l].cols() == layer[0]
                && self.biases[l].cols() == layer[1]
                && self.masks[l].same_shape(&self.weights[l]);
            if !ok {
                return Err(ModelError::SnapshotMismatch(format!(
                    "layer {l} does not match dims {layer:?}"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn softmax_in_place(logits: &mut [f32]) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for x in logits.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in logits.iter_mut() {
        *x /= sum;
    }
}

pub(crate) fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate() {
        if x > xs[best] {
            best = i;
        }
    }
    best
}

use crate::{ModelError, ModelSnapshot, ParamMap, Tensor};

/// Sample-count-weighted mean of aligned model snapshots.
///
/// The result is a dense model: its masks are all-ones, since the averaged
/// global model carries no pruning of its own. Clients re-apply their own
/// masks when they load it. Averaging a single model returns it unchanged
/// (accumulation is done in f64, so `(w * n) / n` is exact for f32 weights).
pub fn average_weights(
    models: &[&ModelSnapshot],
    sample_counts: &[usize],
) -> Result<ModelSnapshot, ModelError> {
    let first = *models.first().ok_or(ModelError::EmptyAverage)?;
    if models.len() != sample_counts.len() {
        return Err(ModelError::CountMismatch {
            models: models.len(),
            counts: sample_counts.len(),
        });
    }
    let total: usize = sample_counts.iter().sum();
    if total == 0 {
        return Err(ModelError::ZeroSampleCount);
    }

    for model in &models[1..] {
        if model.dims != first.dims {
            return Err(ModelError::SnapshotMismatch(format!(
                "dims {:?} != {:?}",
                model.dims, first.dims
            )));
        }
    }

    let mut params = ParamMap::new();
    for (key, tensor) in &first.params {
        let mut acc = vec![0.0f64; tensor.len()];
        for (model, &count) in models.iter().zip(sample_counts) {
            let contribution = model.params.get(key).ok_or_else(|| {
                ModelError::SnapshotMismatch(format!("missing parameter {key}"))
            })?;
            if !contribution.same_shape(tensor) {
                return Err(ModelError::SnapshotMismatch(format!(
                    "parameter {key} shape mismatch"
                )));
            }
            for (a, &w) in acc.iter_mut().zip(contribution.data()) {
                *a += w as f64 * count as f64;
            }
        }
        let mut averaged = Tensor::zeros(tensor.rows(), tensor.cols());
        for (out, a) in averaged.data_mut().iter_mut().zip(&acc) {
            *out = (a / total as f64) as f32;
        }
        params.insert(key.clone(), averaged);
    }

    let masks = first
        .masks
        .iter()
        .map(|(key, mask)| (key.clone(), Tensor::ones(mask.rows(), mask.cols())))
        .collect();

    Ok(ModelSnapshot {
        dims: first.dims.clone(),
        params,
        masks,
    })
}

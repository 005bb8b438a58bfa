use crate::{Mlp, ModelError, ModelSnapshot};
use tracing::debug;

/// Zero out the `amount` smallest-magnitude weights that are still unpruned,
/// across all weight tensors, and record them in the masks. Saturates at the
/// number of remaining unpruned weights; `amount == 0` is a no-op. Returns
/// how many weights were actually pruned.
pub fn prune_fixed_amount(model: &mut Mlp, amount: usize) -> usize {
    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for (layer, (w, m)) in model.weights.iter().zip(&model.masks).enumerate() {
        for (idx, (&weight, &mask)) in w.data().iter().zip(m.data()).enumerate() {
            if mask != 0.0 {
                candidates.push((weight.abs(), layer, idx));
            }
        }
    }

    let amount = amount.min(candidates.len());
    if amount == 0 {
        return 0;
    }
    candidates.select_nth_unstable_by(amount - 1, |a, b| a.0.total_cmp(&b.0));

    for &(_, layer, idx) in &candidates[..amount] {
        model.weights[layer].data_mut()[idx] = 0.0;
        model.masks[layer].data_mut()[idx] = 0.0;
    }

    debug!(
        pruned = amount,
        sparsity = model.sparsity(),
        "pruned smallest-magnitude weights"
    );
    amount
}

/// Lottery-ticket rewind: reset every surviving weight (and all biases) to
/// its value in the initial snapshot, keeping the current masks.
pub fn rewind_to(model: &mut Mlp, init: &ModelSnapshot) -> Result<(), ModelError> {
    let masks = model.masks.clone();
    model.load_global(init)?;
    // load_global already re-applied the masks; restore them in case the
    // caller's model and `init` disagree on mask bookkeeping
    model.masks = masks;
    Ok(())
}

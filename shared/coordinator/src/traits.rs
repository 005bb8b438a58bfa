use crate::CoordinatorError;
use fedsim_modeling::ModelSnapshot;

/// The seam between the coordinator and whatever trains a client's local
/// model. The coordinator only ever sees snapshots.
pub trait ClientTrainer {
    /// Number of local training samples; the weight of this client in the
    /// federated average.
    fn num_samples(&self) -> usize;

    /// Current local model, returned when the client is carried forward
    /// unselected.
    fn local_model(&self) -> &ModelSnapshot;

    /// Load the previous global model, train locally, and return the
    /// updated snapshot. `global_init` is the round-zero global model, used
    /// by lottery-ticket pruning to rewind surviving weights.
    fn client_update(
        &mut self,
        global: &ModelSnapshot,
        global_init: &ModelSnapshot,
    ) -> Result<ModelSnapshot, CoordinatorError>;
}

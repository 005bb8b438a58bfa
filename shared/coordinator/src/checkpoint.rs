use anyhow::{Context, Result};
use fedsim_modeling::ModelSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Persists per-round state under a run directory:
///
/// ```text
/// <root>/server/client_models/client_models.bin
/// <root>/server/server_models/average_model_round<r>.bin
/// ```
///
/// The client-model grid is overwritten every round; the averaged global
/// model gets one file per round.
pub struct Checkpointer {
    root: PathBuf,
}

impl Checkpointer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_round(
        &self,
        round: u32,
        client_models: &[Vec<Option<ModelSnapshot>>],
        global_models: &[ModelSnapshot],
    ) -> Result<()> {
        self.write(
            &self.root.join("server/client_models/client_models.bin"),
            &client_models,
        )?;
        self.write(
            &self
                .root
                .join(format!("server/server_models/average_model_round{round}.bin")),
            &global_models,
        )
    }

    pub fn load_global_models(&self, round: u32) -> Result<Vec<ModelSnapshot>> {
        let path = self
            .root
            .join(format!("server/server_models/average_model_round{round}.bin"));
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read checkpoint {path:?}"))?;
        Self::decode(&bytes).with_context(|| format!("failed to decode checkpoint {path:?}"))
    }

    fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create checkpoint dir {parent:?}"))?;
        }
        let bytes = postcard::to_stdvec(value)
            .with_context(|| format!("failed to serialize checkpoint {path:?}"))?;
        fs::write(path, bytes).with_context(|| format!("failed to write checkpoint {path:?}"))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

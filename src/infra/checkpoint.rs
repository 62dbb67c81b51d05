// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything evaluation needs to rebuild the
// trained model and encode data exactly as training did.
//
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1 (CompactRecorder)
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← number of the latest saved epoch
//     train_config.json      ← TrainConfig (shapes, batch size, policies)
//     model_config.json      ← BidafConfig (architecture)
//     vocabulary.json        ← extended vocabulary (word → index, unk)
//
// The embedding table itself lives inside the model record.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::vocabulary::Vocabulary;
use crate::ml::model::{BidafConfig, BidafModel};

const LATEST_EPOCH: &str = "latest_epoch.json";
const TRAIN_CONFIG: &str = "train_config.json";
const MODEL_CONFIG: &str = "model_config.json";
const VOCABULARY:   &str = "vocabulary.json";

/// Manages saving and loading of checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    // ─── Model weights ────────────────────────────────────────────────────────
    /// Save model weights for `epoch` and point latest_epoch.json at it.
    pub fn save_model<B: Backend>(&self, model: &BidafModel<B>, epoch: usize) -> Result<()> {
        // Recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_EPOCH), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`.
    ///
    /// `model` must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  BidafModel<B>,
        device: &B::Device,
    ) -> Result<BidafModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Epoch number stored in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(LATEST_EPOCH))
            .with_context(|| format!("Cannot find '{LATEST_EPOCH}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    // ─── Configs ──────────────────────────────────────────────────────────────
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(TRAIN_CONFIG);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(TRAIN_CONFIG);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid training config in '{}'", path.display()))
    }

    pub fn save_model_config(&self, cfg: &BidafConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<BidafConfig> {
        let path = self.dir.join(MODEL_CONFIG);
        BidafConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load model config '{}': {e:?}", path.display()))
    }

    // ─── Vocabulary ───────────────────────────────────────────────────────────
    pub fn save_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        let path = self.dir.join(VOCABULARY);
        fs::write(&path, serde_json::to_string(vocab)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
        tracing::debug!("Saved vocabulary ({} words) to '{}'", vocab.len(), path.display());
        Ok(())
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        let path = self.dir.join(VOCABULARY);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid vocabulary in '{}'", path.display()))
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Open the training corpus          (Layer 4 - data)
//   Step 2: Build the vocabulary              (Layer 4 - data)
//   Step 3: Load pretrained vectors           (Layer 6 - infra)
//   Step 4: Build the embedding matrix        (Layer 4 - data)
//   Step 5: Save configs + vocabulary         (Layer 6 - infra)
//   Step 6: Run the training loop             (Layer 5 - ml)
//   Step 7: Evaluate held-out data, if given  (Layer 2 - evaluate)

use std::str::FromStr;

use anyhow::{Context, Result};
use burn::nn::activation::ActivationConfig;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::evaluate_use_case::{EvaluateConfig, EvaluateUseCase};
use crate::data::{
    embedding_matrix::{EmbeddingMatrixBuilder, SlotPolicy},
    encoder::EncoderShape,
    loader::TsvCorpus,
    vocabulary::VocabularyBuilder,
};
use crate::domain::error::QaError;
use crate::domain::traits::{CorpusSource, PretrainedEmbeddings};
use crate::infra::{
    checkpoint::CheckpointManager,
    embedding_store::TextEmbeddings,
    metrics::MetricsLogger,
};
use crate::ml::model::{BidafConfig, LossKind};
use crate::ml::trainer::{run_training, OptimizerKind};

// ─── Compute device ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    #[default]
    Gpu,
}

impl FromStr for ComputeDevice {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ComputeDevice::Cpu),
            "gpu" | "wgpu" => Ok(ComputeDevice::Gpu),
            other => Err(QaError::InvalidConfig(format!(
                "unknown device '{other}': expected 'cpu' or 'gpu'"
            ))),
        }
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All options of a training run. Saved next to the checkpoint so
// evaluation encodes with the same shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:           String,
    pub eval_path:            Option<String>,
    pub embeddings_path:      String,
    pub checkpoint_dir:       String,
    pub max_passage_words:    usize,
    pub max_passage_sents:    usize,
    pub max_question_words:   usize,
    pub embedding_dim:        usize,
    pub batch_size:           usize,
    pub unk_handle_method:    SlotPolicy,
    pub pad_handle_method:    SlotPolicy,
    pub loss:                 LossKind,
    pub optimizer:            OptimizerKind,
    pub lr:                   f64,
    pub steps_per_epoch:      usize,
    pub n_epochs:             usize,
    pub encoder_hidden_nodes: usize,
    pub n_highway_layers:     usize,
    pub highway_activation:   ActivationConfig,
    pub embed_trainable:      bool,
    /// Seed for the `random` pad/unk policies
    pub seed:                 u64,
    pub device:               ComputeDevice,
    /// Cache the training corpus instead of re-reading it each pass
    pub in_memory:            bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:           "data/WikiQA-train.tsv".to_string(),
            eval_path:            None,
            embeddings_path:      "data/glove.6B.100d.txt".to_string(),
            checkpoint_dir:       "checkpoints".to_string(),
            max_passage_words:    60,
            max_passage_sents:    30,
            max_question_words:   25,
            embedding_dim:        100,
            batch_size:           20,
            unk_handle_method:    SlotPolicy::Zero,
            pad_handle_method:    SlotPolicy::Zero,
            loss:                 LossKind::CategoricalCrossentropy,
            optimizer:            OptimizerKind::Adagrad,
            lr:                   1e-2,
            steps_per_epoch:      46,
            n_epochs:             15,
            encoder_hidden_nodes: 200,
            n_highway_layers:     2,
            highway_activation:   ActivationConfig::Relu,
            embed_trainable:      false,
            seed:                 42,
            device:               ComputeDevice::Gpu,
            in_memory:            true,
        }
    }
}

impl TrainConfig {
    pub fn shape(&self) -> EncoderShape {
        EncoderShape::new(self.max_question_words, self.max_passage_sents, self.max_passage_words)
    }

    /// Model hyperparameters for a table of `num_embeddings` rows.
    pub fn model_config(&self, num_embeddings: usize) -> BidafConfig {
        BidafConfig::new(num_embeddings, self.embedding_dim, self.max_passage_sents, self.max_passage_words)
            .with_n_highway_layers(self.n_highway_layers)
            .with_highway_activation(self.highway_activation.clone())
            .with_encoder_hidden_nodes(self.encoder_hidden_nodes)
            .with_embed_trainable(self.embed_trainable)
    }

    /// Reject configurations that can never train.
    pub fn validate(&self) -> Result<(), QaError> {
        self.shape().validate()?;
        let positive = [
            ("embedding_dim", self.embedding_dim),
            ("batch_size", self.batch_size),
            ("steps_per_epoch", self.steps_per_epoch),
            ("n_epochs", self.n_epochs),
            ("encoder_hidden_nodes", self.encoder_hidden_nodes),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(QaError::InvalidConfig(format!("{name} must be at least 1")));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(QaError::InvalidConfig(format!("lr must be positive, got {}", self.lr)));
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Training corpus ───────────────────────────────────────────
        tracing::info!("Reading training data from '{}'", cfg.train_path);
        let tsv = TsvCorpus::new(&cfg.train_path);
        let corpus: Box<dyn CorpusSource> = if cfg.in_memory {
            let cached = tsv.load_all().with_context(|| format!("Cannot load '{}'", cfg.train_path))?;
            if cached.is_empty() {
                return Err(QaError::EmptyCorpus.into());
            }
            Box::new(cached)
        } else {
            Box::new(tsv)
        };

        // ── Step 2: Vocabulary ────────────────────────────────────────────────
        let (vocab, stats) = VocabularyBuilder::from_corpus(corpus.as_ref())?;
        stats.log_summary();
        tracing::info!("Vocabulary: {} words", vocab.vocab_size());

        // ── Step 3: Pretrained vectors ────────────────────────────────────────
        let pretrained = TextEmbeddings::load(&cfg.embeddings_path)?;
        if pretrained.vector_size() != cfg.embedding_dim {
            return Err(QaError::EmbeddingDimMismatch {
                configured: cfg.embedding_dim,
                actual:     pretrained.vector_size(),
            }
            .into());
        }

        // ── Step 4: Embedding matrix (extends the vocabulary) ─────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let builder = EmbeddingMatrixBuilder::new(cfg.pad_handle_method, cfg.unk_handle_method);
        let (vocab, matrix, coverage) = builder.build(vocab, &pretrained, &mut rng);
        tracing::info!(
            "Embedding rows: {} pretrained, {} seeded, {} appended",
            coverage.pretrained, coverage.seeded, coverage.appended
        );

        // ── Step 5: Persist what evaluation needs ─────────────────────────────
        let model_cfg = cfg.model_config(matrix.num_rows());
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(cfg)?;
        ckpt.save_model_config(&model_cfg)?;
        ckpt.save_vocabulary(&vocab)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Training loop (Layer 5) ───────────────────────────────────
        let history = run_training(cfg, &model_cfg, corpus.as_ref(), &vocab, &matrix, &ckpt, &metrics)?;
        if let Some(last) = history.last() {
            tracing::info!("Final epoch loss: {:.4}", last.train_loss);
        }

        // ── Step 7: Held-out evaluation ───────────────────────────────────────
        if let Some(eval_path) = &cfg.eval_path {
            let eval_cfg = EvaluateConfig {
                eval_path:      eval_path.clone(),
                checkpoint_dir: cfg.checkpoint_dir.clone(),
                device:         cfg.device,
                ..EvaluateConfig::default()
            };
            let report = EvaluateUseCase::new(eval_cfg).execute()?;
            println!(
                "Evaluation: accuracy={:.4} MAP={:.4} MRR={:.4}",
                report.accuracy, report.map, report.mrr
            );
        }

        Ok(())
    }
}

// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Pulls n_epochs × steps_per_epoch batches from the cyclic
// training stream. An epoch is a fixed number of optimiser
// steps, independent of how many samples the corpus holds.
//
// Per epoch: mean loss → stdout + metrics.csv, checkpoint saved.
//
// Key Burn 0.20 points:
//   - Training runs on Autodiff<Wgpu> (gpu) or Autodiff<NdArray> (cpu)
//   - The optimiser is picked at runtime; each choice
//     monomorphises its own copy of the loop
//   - A frozen embedding table has no gradient, so the
//     optimiser simply skips it

use std::str::FromStr;

use anyhow::{anyhow, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::batcher::Batcher,
    optim::{AdaGradConfig, AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{ComputeDevice, TrainConfig};
use crate::data::{
    batcher::{BidafBatch, BidafBatcher},
    embedding_matrix::EmbeddingMatrix,
    encoder::BatchEncoder,
    stream::TrainBatches,
    vocabulary::Vocabulary,
};
use crate::domain::error::QaError;
use crate::domain::traits::CorpusSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{BidafConfig, BidafModel};

type GpuBackend = Autodiff<Wgpu>;
type CpuBackend = Autodiff<NdArray>;

// ─── Optimizer choice ─────────────────────────────────────────────────────────
/// Burn has no Adadelta; Adagrad is the default per-parameter
/// adaptive rule in its place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    #[default]
    Adagrad,
    Rmsprop,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam"    => Ok(OptimizerKind::Adam),
            "adagrad" => Ok(OptimizerKind::Adagrad),
            "rmsprop" => Ok(OptimizerKind::Rmsprop),
            "sgd"     => Ok(OptimizerKind::Sgd),
            other => Err(QaError::InvalidConfig(format!(
                "unknown optimizer '{other}': expected adam, adagrad, rmsprop or sgd"
            ))),
        }
    }
}

// ─── Entry point ──────────────────────────────────────────────────────────────
/// Train on the configured device. Returns the per-epoch metrics.
pub fn run_training<C: CorpusSource + ?Sized>(
    cfg:       &TrainConfig,
    model_cfg: &BidafConfig,
    corpus:    &C,
    vocab:     &Vocabulary,
    matrix:    &EmbeddingMatrix,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    match cfg.device {
        ComputeDevice::Gpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_on::<GpuBackend, C>(cfg, model_cfg, corpus, vocab, matrix, &device, ckpt, metrics)
        }
        ComputeDevice::Cpu => {
            tracing::info!("Using NdArray CPU device");
            train_on::<CpuBackend, C>(cfg, model_cfg, corpus, vocab, matrix, &NdArrayDevice::default(), ckpt, metrics)
        }
    }
}

/// One backend's copy of the whole run. Kept out of line so the two
/// backends' frames never share the caller's stack frame.
#[inline(never)]
#[allow(clippy::too_many_arguments)]
fn train_on<B: AutodiffBackend, C: CorpusSource + ?Sized>(
    cfg:       &TrainConfig,
    model_cfg: &BidafConfig,
    corpus:    &C,
    vocab:     &Vocabulary,
    matrix:    &EmbeddingMatrix,
    device:    &B::Device,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    let model = model_cfg.init_with_embeddings::<B>(matrix, device)?;
    let (_, history) = train(cfg, model, corpus, vocab, device, Some(ckpt), Some(metrics))?;
    Ok(history)
}

/// Train `model` with the configured optimiser.
pub fn train<B: AutodiffBackend, C: CorpusSource + ?Sized>(
    cfg:     &TrainConfig,
    model:   BidafModel<B>,
    corpus:  &C,
    vocab:   &Vocabulary,
    device:  &B::Device,
    ckpt:    Option<&CheckpointManager>,
    metrics: Option<&MetricsLogger>,
) -> Result<(BidafModel<B>, Vec<EpochMetrics>)> {
    let encoder = BatchEncoder::new(vocab, cfg.shape());
    let batches = TrainBatches::new(corpus, encoder, cfg.batch_size)?;
    let ctx = LoopContext {
        cfg,
        batcher: BidafBatcher::new(cfg.shape()),
        device,
        ckpt,
        metrics,
    };

    tracing::info!("Optimizer: {:?}, loss: {:?}, lr: {}", cfg.optimizer, cfg.loss, cfg.lr);
    match cfg.optimizer {
        OptimizerKind::Adam    => ctx.run(model, AdamConfig::new().init::<B, BidafModel<B>>(), batches),
        OptimizerKind::Adagrad => ctx.run(model, AdaGradConfig::new().init::<B, BidafModel<B>>(), batches),
        OptimizerKind::Rmsprop => ctx.run(model, RmsPropConfig::new().init::<B, BidafModel<B>>(), batches),
        OptimizerKind::Sgd     => ctx.run(model, SgdConfig::new().init::<B, BidafModel<B>>(), batches),
    }
}

// ─── Loop ─────────────────────────────────────────────────────────────────────
struct LoopContext<'a, B: AutodiffBackend> {
    cfg:     &'a TrainConfig,
    batcher: BidafBatcher,
    device:  &'a B::Device,
    ckpt:    Option<&'a CheckpointManager>,
    metrics: Option<&'a MetricsLogger>,
}

impl<'a, B: AutodiffBackend> LoopContext<'a, B> {
    fn run<O, C>(
        &self,
        mut model:   BidafModel<B>,
        mut optim:   O,
        mut batches: TrainBatches<'_, C>,
    ) -> Result<(BidafModel<B>, Vec<EpochMetrics>)>
    where
        O: Optimizer<BidafModel<B>, B>,
        C: CorpusSource + ?Sized,
    {
        let cfg = self.cfg;
        let mut history = Vec::with_capacity(cfg.n_epochs);

        for epoch in 1..=cfg.n_epochs {
            let mut loss_sum = 0.0f64;
            let mut samples  = 0usize;

            for _ in 0..cfg.steps_per_epoch {
                let items = batches
                    .next()
                    .ok_or_else(|| anyhow!("training stream ended unexpectedly"))??;
                samples += items.len();

                let batch: BidafBatch<B> = self.batcher.batch(items, self.device);
                let (loss, _) = model.forward_loss(
                    batch.question_input,
                    batch.passage_input,
                    batch.labels,
                    cfg.loss,
                );
                loss_sum += loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(cfg.lr, model, grads);
            }

            let m = EpochMetrics::new(epoch, cfg.steps_per_epoch, samples, loss_sum / cfg.steps_per_epoch as f64);
            println!(
                "Epoch {:>3}/{} | steps={} | samples={} | loss={:.4}",
                epoch, cfg.n_epochs, m.steps, m.samples, m.train_loss,
            );
            if let Some(metrics) = self.metrics {
                metrics.log(&m)?;
            }
            if let Some(ckpt) = self.ckpt {
                ckpt.save_model(&model, epoch)?;
                tracing::info!("Checkpoint saved for epoch {}", epoch);
            }
            history.push(m);
        }

        tracing::info!("Training complete after {} passes over the corpus", batches.passes_done());
        if let Some(metrics) = self.metrics {
            tracing::info!("Epoch metrics written to '{}'", metrics.csv_path().display());
        }
        Ok((model, history))
    }
}

// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Rebuilds the trained model from a checkpoint directory and
// scores a held-out corpus:
//
//   train_config.json ──► encoder shape, batch size
//   model_config.json ──► BidafConfig → model
//   vocabulary.json   ──► same word indices as training
//   model_epoch_N     ──► weights
//
// Then one pass of EvalBatches → Evaluator → EvaluationReport.

use std::fs;

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    tensor::backend::Backend,
};

use crate::application::train_use_case::ComputeDevice;
use crate::data::{
    encoder::{BatchEncoder, EncoderShape},
    loader::TsvCorpus,
    stream::EvalBatches,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{EvaluationReport, Evaluator, QueryPrediction};
use crate::ml::model::BidafConfig;

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub eval_path:      String,
    pub checkpoint_dir: String,
    /// Overrides the training batch size
    pub batch_size:     Option<usize>,
    /// Drop a final partial batch instead of evaluating it
    pub drop_last:      bool,
    pub device:         ComputeDevice,
    /// Write predictions + report as JSON here
    pub report_path:    Option<String>,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            eval_path:      "data/WikiQA-dev.tsv".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            batch_size:     None,
            drop_last:      false,
            device:         ComputeDevice::Gpu,
            report_path:    None,
        }
    }
}

#[derive(serde::Serialize)]
struct ReportFile<'a> {
    report:      &'a EvaluationReport,
    predictions: &'a [QueryPrediction],
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let cfg  = &self.config;
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;

        let train_cfg = ckpt.load_config()?;
        train_cfg.validate()?;
        let model_cfg = ckpt.load_model_config()?;
        let vocab     = ckpt.load_vocabulary()?;
        let shape     = train_cfg.shape();
        let batch_size = cfg.batch_size.unwrap_or(train_cfg.batch_size);

        tracing::info!("Evaluating '{}' with batch size {}", cfg.eval_path, batch_size);
        let corpus  = TsvCorpus::new(&cfg.eval_path);
        let batches = EvalBatches::new(&corpus, BatchEncoder::new(&vocab, shape), batch_size, cfg.drop_last)?;

        let predictions = match cfg.device {
            ComputeDevice::Gpu => evaluate_on::<Wgpu>(&ckpt, &model_cfg, shape, WgpuDevice::default(), batches)?,
            ComputeDevice::Cpu => evaluate_on::<NdArray>(&ckpt, &model_cfg, shape, NdArrayDevice::default(), batches)?,
        };

        let report = EvaluationReport::from_predictions(&predictions);
        tracing::info!(
            "{} queries, {} sentences: accuracy={:.4} MAP={:.4} MRR={:.4}",
            report.queries, report.sentences, report.accuracy, report.map, report.mrr
        );

        if let Some(path) = &cfg.report_path {
            let json = serde_json::to_string_pretty(&ReportFile { report: &report, predictions: &predictions })?;
            fs::write(path, json).with_context(|| format!("Cannot write report to '{path}'"))?;
            tracing::info!("Report written to '{}'", path);
        }

        Ok(report)
    }
}

/// Load the checkpoint on one backend and predict every batch.
#[inline(never)]
fn evaluate_on<B: Backend>(
    ckpt:      &CheckpointManager,
    model_cfg: &BidafConfig,
    shape:     EncoderShape,
    device:    B::Device,
    batches:   EvalBatches<'_>,
) -> Result<Vec<QueryPrediction>> {
    Evaluator::<B>::from_checkpoint(ckpt, model_cfg, shape, device)?.evaluate(batches)
}

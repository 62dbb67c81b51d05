// ============================================================
// Layer 5 — Evaluation Driver
// ============================================================
// Runs the trained model over one pass of held-out data:
//
//   EvalBatch ──► BidafBatcher ──► model.predict ──► [b, S, 2]
//                                                       │
//            cut each sample back to its real doc count ┘
//                                                       │
//                                       QueryPrediction per sample
//
// Synthetic pad documents never reach the output.
//
// The report aggregates:
//   accuracy  argmax(p) == label over every real sentence
//   MAP       mean average precision over queries with ≥ 1 relevant doc
//   MRR       mean reciprocal rank of the first relevant doc (same queries)

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{BidafBatch, BidafBatcher},
    encoder::EncoderShape,
    stream::{EvalBatch, EvalBatches},
};
use crate::domain::document::Relevance;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{BidafConfig, BidafModel};

// ─── Predictions ──────────────────────────────────────────────────────────────
/// Model output for one query, real documents only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPrediction {
    pub query_id:      Option<String>,
    /// [P(not relevant), P(relevant)] per document
    pub probabilities: Vec<[f32; 2]>,
    pub labels:        Vec<Relevance>,
}

impl QueryPrediction {
    /// P(relevant) per document
    pub fn scores(&self) -> Vec<f32> {
        self.probabilities.iter().map(|p| p[1]).collect()
    }

    /// Document positions ordered by descending relevance score
    pub fn ranking(&self) -> Vec<usize> {
        let scores = self.scores();
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order
    }
}

/// Split a flat [batch, sents, 2] buffer into per-sample pairs,
/// keeping only the first `doc_counts[i]` sentences of sample i.
pub fn truncate_predictions(flat: &[f32], max_sents: usize, doc_counts: &[usize]) -> Vec<Vec<[f32; 2]>> {
    flat.chunks(max_sents * 2)
        .zip(doc_counts)
        .map(|(sample, &n)| {
            sample
                .chunks_exact(2)
                .take(n)
                .map(|p| [p[0], p[1]])
                .collect()
        })
        .collect()
}

// ─── Evaluator ────────────────────────────────────────────────────────────────
pub struct Evaluator<B: Backend> {
    model:   BidafModel<B>,
    batcher: BidafBatcher,
    shape:   EncoderShape,
    device:  B::Device,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(model: BidafModel<B>, shape: EncoderShape, device: B::Device) -> Self {
        Self { model, batcher: BidafBatcher::new(shape), shape, device }
    }

    /// Rebuild the model from `model_cfg` and load the latest checkpoint.
    pub fn from_checkpoint(
        ckpt:      &CheckpointManager,
        model_cfg: &BidafConfig,
        shape:     EncoderShape,
        device:    B::Device,
    ) -> Result<Self> {
        let model: BidafModel<B> = model_cfg.init(&device);
        let model = ckpt.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, shape, device))
    }

    /// Predict one batch, truncated to each sample's real documents.
    pub fn predict_batch(&self, batch: EvalBatch) -> Result<Vec<QueryPrediction>> {
        let meta: Vec<(Option<String>, Vec<Relevance>)> = batch
            .samples
            .iter()
            .map(|s| (s.query_id.clone(), s.real_labels()))
            .collect();

        let tensors: BidafBatch<B> = self.batcher.batch(batch.samples, &self.device);
        let probs = self.model.predict(tensors.question_input, tensors.passage_input);
        let flat: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read predictions: {e:?}"))?;

        let per_sample = truncate_predictions(&flat, self.shape.max_passage_sents, &batch.doc_counts);
        Ok(per_sample
            .into_iter()
            .zip(meta)
            .map(|(probabilities, (query_id, labels))| QueryPrediction { query_id, probabilities, labels })
            .collect())
    }

    /// Predict every batch of one evaluation pass.
    pub fn evaluate(&self, batches: EvalBatches<'_>) -> Result<Vec<QueryPrediction>> {
        let mut out = Vec::new();
        for batch in batches {
            out.extend(self.predict_batch(batch?)?);
        }
        tracing::info!("Predicted {} queries", out.len());
        Ok(out)
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub queries:        usize,
    pub sentences:      usize,
    /// Queries with at least one relevant document (used for MAP/MRR)
    pub ranked_queries: usize,
    pub accuracy:       f64,
    pub map:            f64,
    pub mrr:            f64,
}

impl EvaluationReport {
    pub fn from_predictions(predictions: &[QueryPrediction]) -> Self {
        let mut report = Self { queries: predictions.len(), ..Self::default() };
        let mut correct = 0usize;
        let mut ap_sum  = 0.0f64;
        let mut rr_sum  = 0.0f64;

        for pred in predictions {
            for (p, label) in pred.probabilities.iter().zip(&pred.labels) {
                report.sentences += 1;
                let predicted = usize::from(p[1] > p[0]);
                if predicted == label.class_index() {
                    correct += 1;
                }
            }

            if !pred.labels.iter().any(|l| l.is_relevant()) {
                continue;
            }
            report.ranked_queries += 1;

            let mut hits = 0usize;
            let mut precision_sum = 0.0f64;
            let mut first_hit = None;
            for (rank, &doc) in pred.ranking().iter().enumerate() {
                if pred.labels[doc].is_relevant() {
                    hits += 1;
                    precision_sum += hits as f64 / (rank + 1) as f64;
                    first_hit.get_or_insert(rank + 1);
                }
            }
            ap_sum += precision_sum / hits as f64;
            rr_sum += first_hit.map(|r| 1.0 / r as f64).unwrap_or(0.0);
        }

        if report.sentences > 0 {
            report.accuracy = correct as f64 / report.sentences as f64;
        }
        if report.ranked_queries > 0 {
            report.map = ap_sum / report.ranked_queries as f64;
            report.mrr = rr_sum / report.ranked_queries as f64;
        }
        report
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::data::encoder::BatchEncoder;
    use crate::data::loader::InMemoryCorpus;
    use crate::data::vocabulary::Vocabulary;
    use crate::domain::sample::Sample;

    type TestBackend = NdArray;

    fn pred(probs: &[f32], labels: &[i64]) -> QueryPrediction {
        QueryPrediction {
            query_id:      None,
            probabilities: probs.iter().map(|&p| [1.0 - p, p]).collect(),
            labels:        labels.iter().map(|&l| Relevance::try_from(l).unwrap()).collect(),
        }
    }

    #[test]
    fn test_truncate_drops_pad_documents() {
        // 2 samples × 3 sentence slots
        let flat = [
            0.9, 0.1,  0.2, 0.8,  0.5, 0.5,
            0.3, 0.7,  0.6, 0.4,  0.1, 0.9,
        ];
        let out = truncate_predictions(&flat, 3, &[2, 1]);
        assert_eq!(out, vec![
            vec![[0.9, 0.1], [0.2, 0.8]],
            vec![[0.3, 0.7]],
        ]);
    }

    #[test]
    fn test_ranking_orders_by_relevance() {
        let p = pred(&[0.2, 0.9, 0.5], &[0, 1, 0]);
        assert_eq!(p.ranking(), vec![1, 2, 0]);
    }

    #[test]
    fn test_report_metrics() {
        let predictions = vec![
            // relevant doc ranked first: AP = 1, RR = 1
            pred(&[0.8, 0.1], &[1, 0]),
            // relevant doc ranked second: AP = 1/2, RR = 1/2
            pred(&[0.7, 0.4, 0.1], &[0, 1, 0]),
            // no relevant doc: excluded from MAP/MRR
            pred(&[0.3], &[0]),
        ];
        let r = EvaluationReport::from_predictions(&predictions);

        assert_eq!(r.queries, 3);
        assert_eq!(r.sentences, 6);
        assert_eq!(r.ranked_queries, 2);
        assert!((r.map - 0.75).abs() < 1e-9);
        assert!((r.mrr - 0.75).abs() < 1e-9);
        // correct: 0.8→1 ✓, 0.1→0 ✓, 0.7→0 ✗, 0.4→1 ✗, 0.1→0 ✓, 0.3→0 ✓
        assert!((r.accuracy - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_precision_with_two_relevant() {
        // ranking: d0 (rel), d1, d2 (rel) → AP = (1/1 + 2/3) / 2
        let r = EvaluationReport::from_predictions(&[pred(&[0.9, 0.6, 0.3], &[1, 0, 1])]);
        assert!((r.map - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-9);
        assert!((r.mrr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluator_outputs_real_documents_only() {
        let toks = |s: &str| s.split_whitespace().map(String::from).collect::<Vec<_>>();
        let vocab  = Vocabulary::from_words(["who", "sat", "cat", "dog"]);
        let shape  = EncoderShape::new(2, 3, 2);
        let corpus = InMemoryCorpus::new(vec![
            Sample::from_parallel(toks("who sat"), vec![toks("cat sat")], vec![1]).unwrap().with_id("Q1"),
            Sample::from_parallel(toks("who"), vec![toks("dog"), toks("cat")], vec![0, 1]).unwrap().with_id("Q2"),
            Sample::from_parallel(toks("sat"), vec![toks("dog"), toks("dog"), toks("cat")], vec![0, 0, 1]).unwrap().with_id("Q3"),
        ]);

        let device = Default::default();
        let cfg = BidafConfig::new(vocab.num_rows(), 4, shape.max_passage_sents, shape.max_passage_words)
            .with_encoder_hidden_nodes(2);
        let evaluator = Evaluator::<TestBackend>::new(cfg.init(&device), shape, device);

        let batches = EvalBatches::new(&corpus, BatchEncoder::new(&vocab, shape), 2, false).unwrap();
        let preds = evaluator.evaluate(batches).unwrap();

        let counts: Vec<usize> = preds.iter().map(|p| p.probabilities.len()).collect();
        assert_eq!(counts, vec![1, 2, 3]);
        assert_eq!(preds[1].query_id.as_deref(), Some("Q2"));
        assert_eq!(preds[1].labels, vec![Relevance::NotRelevant, Relevance::Relevant]);
        for p in preds.iter().flat_map(|p| &p.probabilities) {
            assert!((p[0] + p[1] - 1.0).abs() < 1e-5);
        }
    }
}

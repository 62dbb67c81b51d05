// ============================================================
// Layer 4 — Batch Streams
// ============================================================
// Batch level of the encoder: groups encoded samples into
// batch_size chunks.
//
//   TrainBatches → infinite, cyclic
//       pass 1: s1 s2 s3 s4 s5 │ pass 2: s1 s2 s3 ...
//       batches [s1 s2] [s3 s4] [s5 s1] [s2 s3] ...
//     A new pass is opened whenever the previous one is exhausted,
//     so the trainer can pull steps_per_epoch batches regardless of
//     the corpus size. A partial batch at a pass boundary is topped
//     up from the next pass.
//
//   EvalBatches → one pass, finite
//     Each batch keeps the real document count of every sample so
//     predictions can be cut back to the real documents. The final
//     partial batch is kept unless drop_last is set.
//
// Both streams stop after the first error they yield.

use crate::data::encoder::{BatchEncoder, EncodedSample};
use crate::domain::error::QaError;
use crate::domain::traits::{CorpusSource, SampleIter};

fn check_batch_size(batch_size: usize) -> Result<(), QaError> {
    if batch_size == 0 {
        return Err(QaError::InvalidConfig("batch_size must be > 0".to_string()));
    }
    Ok(())
}

// ─── TrainBatches ─────────────────────────────────────────────────────────────
pub struct TrainBatches<'a, C: CorpusSource + ?Sized> {
    corpus:     &'a C,
    encoder:    BatchEncoder<'a>,
    batch_size: usize,
    samples:    Option<SampleIter<'a>>,
    pending:    Vec<EncodedSample>,
    /// Samples and truncated sentences seen in the current pass
    pass_samples:   usize,
    pass_truncated: usize,
    passes_done:    usize,
    failed:     bool,
}

impl<'a, C: CorpusSource + ?Sized> TrainBatches<'a, C> {
    pub fn new(corpus: &'a C, encoder: BatchEncoder<'a>, batch_size: usize) -> Result<Self, QaError> {
        check_batch_size(batch_size)?;
        Ok(Self {
            corpus,
            encoder,
            batch_size,
            samples:        None,
            pending:        Vec::with_capacity(batch_size),
            pass_samples:   0,
            pass_truncated: 0,
            passes_done:    0,
            failed:         false,
        })
    }

    /// Number of complete passes over the corpus so far
    pub fn passes_done(&self) -> usize {
        self.passes_done
    }

    fn fail(&mut self, e: QaError) -> Option<Result<Vec<EncodedSample>, QaError>> {
        self.failed = true;
        self.samples = None;
        Some(Err(e))
    }

    fn end_pass(&mut self) -> Result<(), QaError> {
        self.samples = None;
        if self.pass_samples == 0 {
            return Err(QaError::EmptyCorpus);
        }
        self.passes_done += 1;
        tracing::info!(
            "One epoch worth of samples are exhausted ({} samples, {} sentences truncated)",
            self.pass_samples, self.pass_truncated
        );
        self.pass_samples   = 0;
        self.pass_truncated = 0;
        Ok(())
    }
}

impl<'a, C: CorpusSource + ?Sized> Iterator for TrainBatches<'a, C> {
    type Item = Result<Vec<EncodedSample>, QaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while self.pending.len() < self.batch_size {
            if self.samples.is_none() {
                let corpus: &'a C = self.corpus;
                match corpus.pass() {
                    Ok(iter) => self.samples = Some(iter),
                    Err(e)   => return self.fail(e),
                }
            }

            let next = self.samples.as_mut().and_then(|it| it.next());
            match next {
                Some(Ok(sample)) => match self.encoder.encode_sample(&sample) {
                    Ok(encoded) => {
                        self.pass_samples   += 1;
                        self.pass_truncated += encoded.truncated;
                        self.pending.push(encoded);
                    }
                    Err(e) => return self.fail(e),
                },
                Some(Err(e)) => return self.fail(e),
                None => {
                    if let Err(e) = self.end_pass() {
                        return self.fail(e);
                    }
                }
            }
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        Some(Ok(batch))
    }
}

// ─── EvalBatches ──────────────────────────────────────────────────────────────
/// One evaluation batch plus the real document count of each sample.
#[derive(Debug, Clone)]
pub struct EvalBatch {
    pub samples:    Vec<EncodedSample>,
    pub doc_counts: Vec<usize>,
}

impl EvalBatch {
    fn from_samples(samples: Vec<EncodedSample>) -> Self {
        let doc_counts = samples.iter().map(|s| s.real_docs).collect();
        Self { samples, doc_counts }
    }
}

pub struct EvalBatches<'a> {
    samples:    SampleIter<'a>,
    encoder:    BatchEncoder<'a>,
    batch_size: usize,
    drop_last:  bool,
    seen:       usize,
    truncated:  usize,
    done:       bool,
}

impl<'a> EvalBatches<'a> {
    pub fn new<C: CorpusSource + ?Sized>(
        corpus:     &'a C,
        encoder:    BatchEncoder<'a>,
        batch_size: usize,
        drop_last:  bool,
    ) -> Result<Self, QaError> {
        check_batch_size(batch_size)?;
        Ok(Self {
            samples: corpus.pass()?,
            encoder,
            batch_size,
            drop_last,
            seen:      0,
            truncated: 0,
            done:      false,
        })
    }
}

impl<'a> Iterator for EvalBatches<'a> {
    type Item = Result<EvalBatch, QaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.samples.next() {
                Some(Ok(sample)) => match self.encoder.encode_sample(&sample) {
                    Ok(encoded) => {
                        self.seen      += 1;
                        self.truncated += encoded.truncated;
                        batch.push(encoded);
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if self.done {
            tracing::info!(
                "Evaluation pass finished: {} samples, {} sentences truncated",
                self.seen, self.truncated
            );
            if batch.is_empty() {
                return None;
            }
            if batch.len() < self.batch_size && self.drop_last {
                tracing::warn!("Dropping final partial batch of {} samples", batch.len());
                return None;
            }
        }

        Some(Ok(EvalBatch::from_samples(batch)))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoder::EncoderShape;
    use crate::data::loader::InMemoryCorpus;
    use crate::data::vocabulary::Vocabulary;
    use crate::domain::sample::Sample;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn corpus(n: usize) -> InMemoryCorpus {
        let samples = (0..n)
            .map(|i| {
                let docs: Vec<Vec<String>> = (0..=(i % 3)).map(|_| toks("cat sat")).collect();
                let labels = vec![0; docs.len()];
                Sample::from_parallel(toks("who sat"), docs, labels)
                    .unwrap()
                    .with_id(format!("Q{i}"))
            })
            .collect();
        InMemoryCorpus::new(samples)
    }

    fn ids(batch: &[EncodedSample]) -> Vec<String> {
        batch.iter().map(|s| s.query_id.clone().unwrap()).collect()
    }

    #[test]
    fn test_train_stream_cycles_over_corpus() {
        let vocab   = Vocabulary::from_words(["cat", "sat", "who"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 3, 3));
        let data    = corpus(5);

        let mut stream = TrainBatches::new(&data, encoder, 2).unwrap();
        let batches: Vec<_> = (&mut stream).take(6).map(|b| b.unwrap()).collect();

        assert!(batches.iter().all(|b| b.len() == 2));
        assert_eq!(ids(&batches[0]), vec!["Q0", "Q1"]);
        assert_eq!(ids(&batches[2]), vec!["Q4", "Q0"]);
        assert_eq!(ids(&batches[5]), vec!["Q0", "Q1"]);
        assert_eq!(stream.passes_done(), 2);
    }

    #[test]
    fn test_train_stream_empty_corpus_fails() {
        let vocab   = Vocabulary::from_words(["cat"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 3, 3));
        let data    = InMemoryCorpus::default();

        let mut stream = TrainBatches::new(&data, encoder, 2).unwrap();
        assert!(matches!(stream.next(), Some(Err(QaError::EmptyCorpus))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_train_stream_surfaces_sizing_error() {
        let vocab   = Vocabulary::from_words(["cat", "sat", "who"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 2, 3));
        let data    = corpus(3); // third sample has 3 documents

        let mut stream = TrainBatches::new(&data, encoder, 4).unwrap();
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, QaError::TooManyDocuments { limit: 2, actual: 3 }));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_zero_batch_size_is_config_error() {
        let vocab   = Vocabulary::from_words(["cat"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 3, 3));
        let data    = corpus(1);
        assert!(TrainBatches::new(&data, encoder, 0).is_err());
        assert!(EvalBatches::new(&data, encoder, 0, false).is_err());
    }

    #[test]
    fn test_eval_stream_keeps_partial_batch_and_doc_counts() {
        let vocab   = Vocabulary::from_words(["cat", "sat", "who"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 3, 3));
        let data    = corpus(5);

        let batches: Vec<EvalBatch> = EvalBatches::new(&data, encoder, 2, false)
            .unwrap()
            .map(|b| b.unwrap())
            .collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].doc_counts, vec![1, 2]);
        assert_eq!(batches[1].doc_counts, vec![3, 1]);
        assert_eq!(batches[2].doc_counts, vec![2]);
        assert_eq!(batches[2].samples.len(), 1);
    }

    #[test]
    fn test_eval_stream_drop_last() {
        let vocab   = Vocabulary::from_words(["cat", "sat", "who"]);
        let encoder = BatchEncoder::new(&vocab, EncoderShape::new(3, 3, 3));
        let data    = corpus(5);

        let n = EvalBatches::new(&data, encoder, 2, true).unwrap().count();
        assert_eq!(n, 2);

        let n = EvalBatches::new(&corpus(4), encoder, 2, true).unwrap().count();
        assert_eq!(n, 2);
    }
}

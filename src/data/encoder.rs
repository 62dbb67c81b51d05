// ============================================================
// Layer 4 — Batch Encoder (sentence + passage levels)
// ============================================================
// Turns one Sample into fixed-shape index/label arrays.
//
// Sentence level   encode(tokens, max_len)
//   ["cat", "sat"], 4                           → [1, 2, 0, 0]
//   ["cat", "sat", "on", "mat", "today"], 4     → [1, 2, on, mat]  (truncated, logged)
//   unseen tokens map to the unknown index
//
// Passage level    encode_sample(sample)
//   every document is encoded to max_passage_words; the passage is
//   padded with all-pad documents labelled [1, 0] until it holds
//   exactly max_passage_sents documents. More documents than that is
//   a sizing error: documents are never dropped.
//
//   question  [max_question_words]
//   passage   [max_passage_sents * max_passage_words]   (flattened)
//   labels    [max_passage_sents] × [2]                 (one-hot)
//
// The batch level (grouping batch_size samples) lives in
// data::stream and data::batcher.

use serde::{Deserialize, Serialize};

use crate::data::vocabulary::Vocabulary;
use crate::domain::document::Relevance;
use crate::domain::error::QaError;
use crate::domain::sample::Sample;

/// Fixed tensor geometry shared by the encoder, batcher and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderShape {
    pub max_question_words: usize,
    pub max_passage_sents:  usize,
    pub max_passage_words:  usize,
}

impl EncoderShape {
    pub fn new(max_question_words: usize, max_passage_sents: usize, max_passage_words: usize) -> Self {
        Self { max_question_words, max_passage_sents, max_passage_words }
    }

    pub fn total_passage_words(&self) -> usize {
        self.max_passage_sents * self.max_passage_words
    }

    pub fn validate(&self) -> Result<(), QaError> {
        if self.max_question_words == 0 || self.max_passage_sents == 0 || self.max_passage_words == 0 {
            return Err(QaError::InvalidConfig(format!(
                "tensor sizes must be > 0 (max_question_words={}, max_passage_sents={}, max_passage_words={})",
                self.max_question_words, self.max_passage_sents, self.max_passage_words
            )));
        }
        Ok(())
    }
}

/// One sample after padding/truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    pub query_id:  Option<String>,
    pub question:  Vec<u32>,
    pub passage:   Vec<u32>,
    pub labels:    Vec<[f32; 2]>,
    /// Documents present before synthetic padding
    pub real_docs: usize,
    /// Sentences (query included) cut to their maximum length
    pub truncated: usize,
}

impl EncodedSample {
    /// Labels of the real documents only, as relevance classes
    pub fn real_labels(&self) -> Vec<Relevance> {
        self.labels[..self.real_docs]
            .iter()
            .map(|l| if l[1] > l[0] { Relevance::Relevant } else { Relevance::NotRelevant })
            .collect()
    }
}

// ─── BatchEncoder ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct BatchEncoder<'v> {
    vocab: &'v Vocabulary,
    shape: EncoderShape,
}

impl<'v> BatchEncoder<'v> {
    pub fn new(vocab: &'v Vocabulary, shape: EncoderShape) -> Self {
        Self { vocab, shape }
    }

    /// Map tokens to indices and pad/truncate to exactly `max_len`.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S], max_len: usize) -> Vec<u32> {
        if tokens.len() > max_len {
            tracing::debug!(
                "Max length of {} wasn't long enough for a sentence of length {}; truncating",
                max_len, tokens.len()
            );
        }

        let mut ids: Vec<u32> = tokens
            .iter()
            .take(max_len)
            .map(|t| self.vocab.index(t.as_ref()))
            .collect();
        ids.resize(max_len, self.vocab.pad_index());
        ids
    }

    /// Encode a sample into question, flattened passage and one-hot labels.
    pub fn encode_sample(&self, sample: &Sample) -> Result<EncodedSample, QaError> {
        let shape = self.shape;
        let real_docs = sample.num_documents();
        if real_docs > shape.max_passage_sents {
            return Err(QaError::TooManyDocuments {
                limit:  shape.max_passage_sents,
                actual: real_docs,
            });
        }

        let question = self.encode(&sample.query, shape.max_question_words);
        let mut truncated = usize::from(sample.query.len() > shape.max_question_words);

        let mut passage = Vec::with_capacity(shape.total_passage_words());
        let mut labels  = Vec::with_capacity(shape.max_passage_sents);

        for doc in sample.documents() {
            passage.extend(self.encode(&doc.tokens, shape.max_passage_words));
            truncated += usize::from(doc.tokens.len() > shape.max_passage_words);
            labels.push(doc.relevance.one_hot());
        }

        // Synthetic all-pad documents, labelled not relevant
        passage.resize(shape.total_passage_words(), self.vocab.pad_index());
        labels.resize(shape.max_passage_sents, Relevance::NotRelevant.one_hot());

        Ok(EncodedSample {
            query_id: sample.query_id.clone(),
            question,
            passage,
            labels,
            real_docs,
            truncated,
        })
    }
}

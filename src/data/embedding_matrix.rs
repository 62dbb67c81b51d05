// ============================================================
// Layer 4 — Embedding Matrix Builder
// ============================================================
// Merges the training vocabulary with a pretrained embedding
// space into one dense lookup table, row i ↔ vocabulary index i.
//
// Row contents:
//   0                   pad row, per pad policy (zero | random)
//   1 ..= vocab_size    pretrained vector if the word is in the
//                       space, otherwise a seeded vector
//   vocab_size + 1      unk row, per unk policy (zero | random)
//   vocab_size + 2 ..   pretrained-only words, appended in the
//                       space's enumeration order; the vocabulary
//                       is extended with the same indices
//
// Total rows = 1 + |pretrained| + 1 + |training words not in the space|
//
// Seeded vectors
//   seed   = first 8 hex chars of md5(word) as a u32
//   source = MT19937 initialised with `seed`
//   draw   = 53-bit uniform doubles in [0, 1), two 32-bit outputs each
//   vector = (draw - 0.5) / d
// A given word therefore gets the same vector on every run and machine.

use std::str::FromStr;

use rand::Rng;
use rand_mt::Mt;
use serde::{Deserialize, Serialize};

use crate::data::vocabulary::Vocabulary;
use crate::domain::error::QaError;
use crate::domain::traits::PretrainedEmbeddings;

// ─── Reserved-row policy ──────────────────────────────────────────────────────
/// How the pad and unk rows are initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPolicy {
    Zero,
    Random,
}

impl SlotPolicy {
    /// Parse a policy value for the named option, failing fast on anything else.
    pub fn parse(option: &'static str, value: &str) -> Result<Self, QaError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zero"   => Ok(SlotPolicy::Zero),
            "random" => Ok(SlotPolicy::Random),
            _ => Err(QaError::InvalidPolicy { option, value: value.to_string() }),
        }
    }

    fn fill<R: Rng>(self, row: &mut [f32], rng: &mut R) {
        match self {
            SlotPolicy::Zero   => row.fill(0.0),
            SlotPolicy::Random => row.iter_mut().for_each(|x| *x = rng.gen::<f32>()),
        }
    }
}

impl FromStr for SlotPolicy {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotPolicy::parse("slot policy", s)
    }
}

// ─── EmbeddingMatrix ──────────────────────────────────────────────────────────
/// Dense row-major [num_rows, dim] table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data:     Vec<f32>,
    num_rows: usize,
    dim:      usize,
}

impl EmbeddingMatrix {
    pub fn zeros(num_rows: usize, dim: usize) -> Self {
        Self { data: vec![0.0; num_rows * dim], num_rows, dim }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[cfg(test)]
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    fn row_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// How the training vocabulary was covered by the pretrained space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingCoverage {
    /// Training words copied from the pretrained space
    pub pretrained: usize,
    /// Training words given a seeded vector
    pub seeded:     usize,
    /// Pretrained-only words appended to the vocabulary
    pub appended:   usize,
}

// ─── EmbeddingMatrixBuilder ───────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingMatrixBuilder {
    pub pad_policy: SlotPolicy,
    pub unk_policy: SlotPolicy,
}

impl EmbeddingMatrixBuilder {
    pub fn new(pad_policy: SlotPolicy, unk_policy: SlotPolicy) -> Self {
        Self { pad_policy, unk_policy }
    }

    /// Build the matrix and return it with the extended vocabulary.
    ///
    /// `rng` is only used by the `random` policy for the pad/unk rows.
    pub fn build<E, R>(
        &self,
        mut vocab:  Vocabulary,
        pretrained: &E,
        rng:        &mut R,
    ) -> (Vocabulary, EmbeddingMatrix, EmbeddingCoverage)
    where
        E: PretrainedEmbeddings + ?Sized,
        R: Rng,
    {
        let dim = pretrained.vector_size();
        let mut coverage = EmbeddingCoverage::default();

        let training_words: Vec<(String, u32)> =
            vocab.iter().map(|(w, i)| (w.to_string(), i)).collect();
        let seeded_count = training_words.iter().filter(|(w, _)| !pretrained.contains(w)).count();
        tracing::info!(
            "There are {} words in the embedding matrix and {} which aren't there",
            training_words.len() - seeded_count,
            seeded_count
        );

        // Extension indices come after the reserved unk slot, so extend
        // first and size the table from the final vocabulary.
        let appended: Vec<(&str, u32)> = pretrained
            .words()
            .filter(|w| !vocab.contains(w))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|w| (w, vocab.extend(w)))
            .collect();

        let mut matrix = EmbeddingMatrix::zeros(vocab.num_rows(), dim);
        self.pad_policy.fill(matrix.row_mut(vocab.pad_index() as usize), rng);
        self.unk_policy.fill(matrix.row_mut(vocab.unk_index() as usize), rng);

        for (word, index) in &training_words {
            let row = matrix.row_mut(*index as usize);
            match pretrained.vector(word) {
                Some(v) => {
                    row.copy_from_slice(v);
                    coverage.pretrained += 1;
                }
                None => {
                    row.copy_from_slice(&seeded_vector(word, dim));
                    coverage.seeded += 1;
                }
            }
        }

        for (word, index) in appended {
            if let Some(v) = pretrained.vector(word) {
                matrix.row_mut(index as usize).copy_from_slice(v);
                coverage.appended += 1;
            }
        }

        tracing::info!(
            "Embedding matrix: {} rows x {} dims ({} pretrained-only words appended)",
            matrix.num_rows(), dim, coverage.appended
        );
        (vocab, matrix, coverage)
    }
}

// ─── Seeded vectors ───────────────────────────────────────────────────────────
/// 32-bit seed from the first 8 hex characters of the MD5 digest.
pub fn string_seed(text: &str) -> u32 {
    let digest = md5::compute(text.as_bytes());
    u32::from_be_bytes([digest.0[0], digest.0[1], digest.0[2], digest.0[3]])
}

/// Uniform double in [0, 1) with 53 bits of precision.
fn random_double(mt: &mut Mt) -> f64 {
    let a = (mt.next_u32() >> 5) as f64;
    let b = (mt.next_u32() >> 6) as f64;
    (a * 67_108_864.0 + b) / 9_007_199_254_740_992.0
}

/// A pseudo-random vector that depends only on `seed_string`.
pub fn seeded_vector(seed_string: &str, vector_size: usize) -> Vec<f32> {
    let mut mt = Mt::new(string_seed(seed_string));
    let scale = vector_size as f64;
    (0..vector_size)
        .map(|_| ((random_double(&mut mt) - 0.5) / scale) as f32)
        .collect()
}

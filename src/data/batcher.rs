// ============================================================
// Layer 4 — BiDAF Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<EncodedSample>
// into tensors for the attention model.
//
//   Input:  N EncodedSamples, every one already padded
//   Output: BidafBatch
//             question_input  [N, max_question_words]             Int
//             passage_input   [N, max_passage_sents * max_passage_words]  Int
//             labels          [N, max_passage_sents, 2]           Float (one-hot)
//
// Each field is flattened sample by sample into one Vec and then
// reshaped, so row i of every tensor belongs to sample i.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::encoder::{EncodedSample, EncoderShape};

// ─── BidafBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct BidafBatch<B: Backend> {
    /// Question word indices — shape: [batch, max_question_words]
    pub question_input: Tensor<B, 2, Int>,

    /// Flattened passage word indices — shape: [batch, sents * words]
    pub passage_input: Tensor<B, 2, Int>,

    /// One-hot relevance per document — shape: [batch, sents, 2]
    pub labels: Tensor<B, 3>,
}

// ─── BidafBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct BidafBatcher {
    shape: EncoderShape,
}

impl BidafBatcher {
    pub fn new(shape: EncoderShape) -> Self {
        Self { shape }
    }
}

impl<B: Backend> Batcher<B, EncodedSample, BidafBatch<B>> for BidafBatcher {
    fn batch(&self, items: Vec<EncodedSample>, device: &B::Device) -> BidafBatch<B> {
        let batch_size = items.len();
        let q_len      = self.shape.max_question_words;
        let p_len      = self.shape.total_passage_words();
        let n_sents    = self.shape.max_passage_sents;

        // ── Flatten ───────────────────────────────────────────────────────────
        let question_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.question.iter().map(|&x| x as i32))
            .collect();

        let passage_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.passage.iter().map(|&x| x as i32))
            .collect();

        let labels_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.labels.iter().flat_map(|l| l.iter().copied()))
            .collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let question_input = Tensor::<B, 1, Int>::from_ints(
            question_flat.as_slice(), device
        ).reshape([batch_size, q_len]);

        let passage_input = Tensor::<B, 1, Int>::from_ints(
            passage_flat.as_slice(), device
        ).reshape([batch_size, p_len]);

        let labels = Tensor::<B, 1>::from_floats(
            labels_flat.as_slice(), device
        ).reshape([batch_size, n_sents, 2]);

        BidafBatch {
            question_input,
            passage_input,
            labels,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn encoded(q: Vec<u32>, p: Vec<u32>, labels: Vec<[f32; 2]>, real_docs: usize) -> EncodedSample {
        EncodedSample { query_id: None, question: q, passage: p, labels, real_docs, truncated: 0 }
    }

    #[test]
    fn test_batch_shapes() {
        let shape   = EncoderShape::new(2, 2, 3);
        let batcher = BidafBatcher::new(shape);
        let device  = Default::default();

        let items = vec![
            encoded(vec![1, 2], vec![1, 2, 3, 4, 0, 0], vec![[0.0, 1.0], [1.0, 0.0]], 2),
            encoded(vec![3, 0], vec![5, 0, 0, 0, 0, 0], vec![[1.0, 0.0], [1.0, 0.0]], 1),
            encoded(vec![4, 4], vec![6, 6, 6, 0, 0, 0], vec![[0.0, 1.0], [1.0, 0.0]], 1),
        ];
        let batch: BidafBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.question_input.dims(), [3, 2]);
        assert_eq!(batch.passage_input.dims(),  [3, 6]);
        assert_eq!(batch.labels.dims(),         [3, 2, 2]);
    }

    #[test]
    fn test_rows_follow_sample_order() {
        let batcher = BidafBatcher::new(EncoderShape::new(2, 1, 2));
        let device  = Default::default();

        let items = vec![
            encoded(vec![1, 2], vec![7, 8], vec![[0.0, 1.0]], 1),
            encoded(vec![3, 4], vec![9, 0], vec![[1.0, 0.0]], 1),
        ];
        let batch: BidafBatch<TestBackend> = batcher.batch(items, &device);

        let q: Vec<i64> = batch.question_input.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(q, vec![1, 2, 3, 4]);

        let p: Vec<i64> = batch.passage_input.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(p, vec![7, 8, 9, 0]);

        let l: Vec<f32> = batch.labels.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(l, vec![0.0, 1.0, 1.0, 0.0]);
    }
}

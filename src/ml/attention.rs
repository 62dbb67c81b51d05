// ============================================================
// Layer 5 — Bidirectional Attention Flow
// ============================================================
// H: passage context  [batch, T, d]     (d = 2 × hidden)
// U: question context [batch, J, d]
//
// Similarity   S[t, j] = w · [H_t ; U_j ; H_t ∘ U_j]
//   computed without materialising the [batch, T, J, 3d] tensor:
//     S = (H · w_h) ⊕ (U · w_u)ᵀ + (H ∘ w_hu) @ Uᵀ
//
// Context-to-query
//   a   = softmax_j(S)                 [batch, T, J]
//   c2q = a @ U                        [batch, T, d]
//
// Query-to-context
//   b   = softmax_t(max_j a)           [batch, T, 1]
//   q2c = bᵀ @ H, repeated over T      [batch, T, d]
//
// Fusion
//   G = [H ; c2q ; H ∘ c2q ; H ∘ q2c]  [batch, T, 4d]

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

#[derive(Config, Debug)]
pub struct BiAttentionConfig {
    /// Width of one contextual vector (2 × encoder hidden size)
    pub d_context: usize,
}

impl BiAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiAttention<B> {
        let passage_weight  = LinearConfig::new(self.d_context, 1).init(device);
        let question_weight = LinearConfig::new(self.d_context, 1).with_bias(false).init(device);
        let product_weight  = LinearConfig::new(self.d_context, 1).with_bias(false).init(device);
        BiAttention { passage_weight, question_weight, product_weight }
    }
}

/// Trilinear similarity followed by c2q / q2c attention.
/// The three projections together form the single learned linear
/// function over the concatenated [H ; U ; H ∘ U] features.
#[derive(Module, Debug)]
pub struct BiAttention<B: Backend> {
    pub passage_weight:  Linear<B>,
    pub question_weight: Linear<B>,
    pub product_weight:  Linear<B>,
}

impl<B: Backend> BiAttention<B> {
    /// h: [batch, T, d], u: [batch, J, d] → S: [batch, T, J]
    pub fn similarity(&self, h: Tensor<B, 3>, u: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, t_len, d] = h.dims();
        let [_, j_len, _]     = u.dims();

        let s_passage = self.passage_weight
            .forward(h.clone())                       // [batch, T, 1]
            .expand([batch, t_len, j_len]);
        let s_question = self.question_weight
            .forward(u.clone())                       // [batch, J, 1]
            .swap_dims(1, 2)                          // [batch, 1, J]
            .expand([batch, t_len, j_len]);

        let w_product = self.product_weight.weight.val()  // [d, 1]
            .reshape([1, 1, d])
            .expand([batch, t_len, d]);
        let s_product = (h * w_product).matmul(u.swap_dims(1, 2));

        s_passage + s_question + s_product
    }

    /// Fused query-aware passage representation G: [batch, T, 4d].
    pub fn forward(&self, h: Tensor<B, 3>, u: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, t_len, d] = h.dims();
        let s = self.similarity(h.clone(), u.clone());

        // ── Context-to-query ──────────────────────────────────────────────────
        let a   = softmax(s, 2);                      // [batch, T, J]
        let c2q = a.clone().matmul(u);

        // ── Query-to-context ──────────────────────────────────────────────────
        // max over the normalised rows of a, not the raw scores
        let b   = softmax(a.max_dim(2), 1);           // [batch, T, 1]
        let q2c = b
            .swap_dims(1, 2)                          // [batch, 1, T]
            .matmul(h.clone())                        // [batch, 1, d]
            .expand([batch, t_len, d]);

        // ── Fusion ────────────────────────────────────────────────────────────
        let h_c2q = h.clone() * c2q.clone();
        let h_q2c = h.clone() * q2c;
        Tensor::cat(vec![h, c2q, h_c2q, h_q2c], 2)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_similarity_shape() {
        let device = Default::default();
        let att: BiAttention<TestBackend> = BiAttentionConfig::new(6).init(&device);

        let h = Tensor::<TestBackend, 3>::random([2, 5, 6], Distribution::Default, &device);
        let u = Tensor::<TestBackend, 3>::random([2, 3, 6], Distribution::Default, &device);

        assert_eq!(att.similarity(h, u).dims(), [2, 5, 3]);
    }

    #[test]
    fn test_similarity_matches_concatenated_form() {
        let device = Default::default();
        let att: BiAttention<TestBackend> = BiAttentionConfig::new(2).init(&device);

        let h = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0]]], &device);
        let u = Tensor::<TestBackend, 3>::from_floats([[[3.0, -1.0]]], &device);
        let s: Vec<f32> = att.similarity(h, u).into_data().convert::<f32>().to_vec().unwrap();

        let w_h: Vec<f32>  = att.passage_weight.weight.val().into_data().convert::<f32>().to_vec().unwrap();
        let w_u: Vec<f32>  = att.question_weight.weight.val().into_data().convert::<f32>().to_vec().unwrap();
        let w_hu: Vec<f32> = att.product_weight.weight.val().into_data().convert::<f32>().to_vec().unwrap();
        let bias: Vec<f32> = att.passage_weight.bias.as_ref().unwrap().val()
            .into_data().convert::<f32>().to_vec().unwrap();

        let expected = w_h[0] * 1.0 + w_h[1] * 2.0
            + w_u[0] * 3.0 + w_u[1] * -1.0
            + w_hu[0] * 3.0 + w_hu[1] * -2.0
            + bias[0];
        assert!((s[0] - expected).abs() < 1e-5, "{} vs {}", s[0], expected);
    }

    #[test]
    fn test_fused_width_is_four_times_context() {
        let device = Default::default();
        let att: BiAttention<TestBackend> = BiAttentionConfig::new(4).init(&device);

        let h = Tensor::<TestBackend, 3>::random([3, 7, 4], Distribution::Default, &device);
        let u = Tensor::<TestBackend, 3>::random([3, 2, 4], Distribution::Default, &device);
        let g = att.forward(h.clone(), u);

        assert_eq!(g.dims(), [3, 7, 16]);
        // first block of G is the passage itself
        let head = g.slice([0..3, 0..7, 0..4]);
        let diff: f32 = (head - h).abs().max().into_scalar().elem::<f32>();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_q2c_is_shared_across_passage_positions() {
        let device = Default::default();
        let att: BiAttention<TestBackend> = BiAttentionConfig::new(2).init(&device);

        let h = Tensor::<TestBackend, 3>::random([1, 4, 2], Distribution::Uniform(0.5, 1.5), &device);
        let u = Tensor::<TestBackend, 3>::random([1, 3, 2], Distribution::Default, &device);
        let g = att.forward(h.clone(), u);

        // H ∘ q2c / H recovers q2c, identical for every position
        let q2c = g.slice([0..1, 0..4, 6..8]) / h;
        let q2c: Vec<f32> = q2c.into_data().convert::<f32>().to_vec().unwrap();
        for t in 1..4 {
            assert!((q2c[t * 2] - q2c[0]).abs() < 1e-4);
            assert!((q2c[t * 2 + 1] - q2c[1]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_q2c_weights_come_from_normalised_similarity() {
        let device = Default::default();
        let att: BiAttention<TestBackend> = BiAttentionConfig::new(2).init(&device);

        let h = Tensor::<TestBackend, 3>::random([2, 4, 2], Distribution::Default, &device);
        let u = Tensor::<TestBackend, 3>::random([2, 3, 2], Distribution::Default, &device);
        let g = att.forward(h.clone(), u.clone());

        let a = softmax(att.similarity(h.clone(), u), 2);
        let b = softmax(a.max_dim(2), 1);
        let q2c = b.swap_dims(1, 2).matmul(h.clone()).expand([2, 4, 2]);
        let expected = h * q2c;

        let diff: f32 = (g.slice([0..2, 0..4, 6..8]) - expected).abs().max().into_scalar().elem::<f32>();
        assert!(diff < 1e-5, "max difference {diff}");
    }
}

// ============================================================
// Layer 5 — BiDAF Answer-Sentence Model
// ============================================================
//   question [b, J]                 passage [b, S·W]
//        │                                │
//        ├──────── Embedding (shared) ────┤
//        ├──────── Highway × n (shared) ──┤
//        ├──────── BiLSTM (shared) ───────┤
//        U [b, J, 2h]                     H [b, S·W, 2h]
//        └────────────► BiAttention ◄─────┘
//                       G [b, S·W, 8h]
//                          │
//                BiLSTM → BiLSTM         M [b, S·W, 2h]
//                          │
//            reshape [b, S, W, 2h], sum over W
//                          │
//                 Linear(2h → 2) per sentence
//                          │
//              logits [b, S, 2] → softmax

use std::str::FromStr;

use burn::{
    module::Param,
    nn::{
        activation::{Activation, ActivationConfig},
        BiLstm, BiLstmConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, sigmoid, softmax},
};
use serde::{Deserialize, Serialize};

use crate::data::embedding_matrix::EmbeddingMatrix;
use crate::domain::error::QaError;
use crate::ml::attention::{BiAttention, BiAttentionConfig};

// ─── Loss ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossKind {
    /// −Σ y·log p over the two classes, averaged over sentences
    #[default]
    CategoricalCrossentropy,
    /// Mean squared error between softmax output and one-hot labels
    Mse,
}

impl FromStr for LossKind {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "categorical-crossentropy" => Ok(LossKind::CategoricalCrossentropy),
            "mse" | "mean-squared-error" => Ok(LossKind::Mse),
            other => Err(QaError::InvalidConfig(format!(
                "unknown loss '{other}': expected 'categorical-crossentropy' or 'mse'"
            ))),
        }
    }
}

/// Parse a highway nonlinearity name.
pub fn parse_activation(name: &str) -> Result<ActivationConfig, QaError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "relu"    => Ok(ActivationConfig::Relu),
        "tanh"    => Ok(ActivationConfig::Tanh),
        "sigmoid" => Ok(ActivationConfig::Sigmoid),
        "gelu"    => Ok(ActivationConfig::Gelu),
        other => Err(QaError::InvalidConfig(format!(
            "unknown highway activation '{other}': expected relu, tanh, sigmoid or gelu"
        ))),
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct BidafConfig {
    /// Rows of the embedding table (extended vocabulary + reserved slots)
    pub num_embeddings:    usize,
    pub embedding_dim:     usize,
    pub max_passage_sents: usize,
    pub max_passage_words: usize,
    #[config(default = 2)]
    pub n_highway_layers: usize,
    #[config(default = "ActivationConfig::Relu")]
    pub highway_activation: ActivationConfig,
    /// Initial bias of the highway gates; negative values favour the carry path
    #[config(default = "-2.0")]
    pub highway_gate_bias: f64,
    #[config(default = 200)]
    pub encoder_hidden_nodes: usize,
    #[config(default = false)]
    pub embed_trainable: bool,
}

impl BidafConfig {
    /// Model with a randomly initialised embedding table.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BidafModel<B> {
        let mut embedding = EmbeddingConfig::new(self.num_embeddings, self.embedding_dim).init(device);
        embedding.weight  = embedding.weight.set_require_grad(self.embed_trainable);

        let highways: Vec<Highway<B>> = (0..self.n_highway_layers)
            .map(|_| self.build_highway(device))
            .collect();

        let h = self.encoder_hidden_nodes;
        let context_encoder = BiLstmConfig::new(self.embedding_dim, h, true).init(device);
        let attention       = BiAttentionConfig::new(2 * h).init(device);
        let modeling_first  = BiLstmConfig::new(8 * h, h, true).init(device);
        let modeling_second = BiLstmConfig::new(2 * h, h, true).init(device);
        let classifier      = LinearConfig::new(2 * h, 2).init(device);

        BidafModel {
            embedding, highways, context_encoder, attention,
            modeling_first, modeling_second, classifier,
            max_passage_sents: self.max_passage_sents,
            max_passage_words: self.max_passage_words,
        }
    }

    /// Model whose embedding table is loaded from `matrix`.
    pub fn init_with_embeddings<B: Backend>(
        &self,
        matrix: &EmbeddingMatrix,
        device: &B::Device,
    ) -> Result<BidafModel<B>, QaError> {
        if matrix.dim() != self.embedding_dim {
            return Err(QaError::EmbeddingDimMismatch {
                configured: self.embedding_dim,
                actual:     matrix.dim(),
            });
        }
        if matrix.num_rows() != self.num_embeddings {
            return Err(QaError::InvalidConfig(format!(
                "embedding matrix has {} rows, model expects {}",
                matrix.num_rows(), self.num_embeddings
            )));
        }

        let mut model = self.init(device);
        let weights = Tensor::<B, 1>::from_floats(matrix.as_slice(), device)
            .reshape([matrix.num_rows(), matrix.dim()]);
        model.embedding.weight = Param::from_tensor(weights).set_require_grad(self.embed_trainable);
        Ok(model)
    }

    fn build_highway<B: Backend>(&self, device: &B::Device) -> Highway<B> {
        let d = self.embedding_dim;
        let transform = LinearConfig::new(d, d).init(device);
        let mut gate  = LinearConfig::new(d, d).init(device);
        gate.bias = Some(Param::from_tensor(Tensor::full([d], self.highway_gate_bias, device)));
        let activation = self.highway_activation.init(device);
        Highway { transform, gate, activation }
    }
}

// ─── Highway ──────────────────────────────────────────────────────────────────
/// y = t ∘ act(W_h x) + (1 − t) ∘ x,   t = σ(W_t x)
#[derive(Module, Debug)]
pub struct Highway<B: Backend> {
    pub transform:  Linear<B>,
    pub gate:       Linear<B>,
    pub activation: Activation<B>,
}

impl<B: Backend> Highway<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let t = sigmoid(self.gate.forward(x.clone()));
        let h = self.activation.forward(self.transform.forward(x.clone()));
        let carry = t.clone().neg().add_scalar(1.0);
        t * h + carry * x
    }
}

// ─── BidafModel ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BidafModel<B: Backend> {
    pub embedding:         Embedding<B>,
    pub highways:          Vec<Highway<B>>,
    pub context_encoder:   BiLstm<B>,
    pub attention:         BiAttention<B>,
    pub modeling_first:    BiLstm<B>,
    pub modeling_second:   BiLstm<B>,
    pub classifier:        Linear<B>,
    pub max_passage_sents: usize,
    pub max_passage_words: usize,
}

impl<B: Backend> BidafModel<B> {
    /// question: [b, J], passage: [b, S·W] → logits [b, S, 2]
    pub fn forward(&self, question: Tensor<B, 2, Int>, passage: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch, _] = passage.dims();

        // ── Embedding + highway (shared by both inputs) ───────────────────────
        let mut q = self.embedding.forward(question);
        let mut p = self.embedding.forward(passage);
        for highway in &self.highways {
            q = highway.forward(q);
            p = highway.forward(p);
        }

        // ── Contextual encoding ───────────────────────────────────────────────
        let (u, _) = self.context_encoder.forward(q, None);
        let (h, _) = self.context_encoder.forward(p, None);

        // ── Attention + modeling ──────────────────────────────────────────────
        let g = self.attention.forward(h, u);
        let (m, _) = self.modeling_first.forward(g, None);
        let (m, _) = self.modeling_second.forward(m, None);

        // ── Per-sentence sum ──────────────────────────────────────────────────
        let [_, _, d] = m.dims();
        let sentences = m
            .reshape([batch, self.max_passage_sents, self.max_passage_words, d])
            .sum_dim(2)
            .reshape([batch, self.max_passage_sents, d]);

        self.classifier.forward(sentences)
    }

    /// Relevance probabilities [b, S, 2]; column 1 is "relevant".
    pub fn predict(&self, question: Tensor<B, 2, Int>, passage: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        softmax(self.forward(question, passage), 2)
    }

    /// Scalar loss against one-hot `labels` [b, S, 2], plus the logits.
    pub fn forward_loss(
        &self,
        question: Tensor<B, 2, Int>,
        passage:  Tensor<B, 2, Int>,
        labels:   Tensor<B, 3>,
        loss:     LossKind,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(question, passage);
        let value = match loss {
            LossKind::CategoricalCrossentropy => (labels * log_softmax(logits.clone(), 2))
                .sum_dim(2)
                .neg()
                .mean(),
            LossKind::Mse => (softmax(logits.clone(), 2) - labels)
                .powf_scalar(2.0)
                .mean(),
        };
        (value, logits)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::{AdamConfig, GradientsParams, Optimizer};

    type TestBackend  = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    fn tiny_config() -> BidafConfig {
        BidafConfig::new(12, 4, 3, 2).with_encoder_hidden_nodes(3)
    }

    fn inputs<B: Backend>(device: &B::Device) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        let question = Tensor::<B, 1, Int>::from_ints([1, 2, 0, 3, 4, 0].as_slice(), device)
            .reshape([2, 3]);
        let passage  = Tensor::<B, 1, Int>::from_ints(
            [1, 5, 6, 7, 0, 0, 8, 9, 10, 11, 0, 0].as_slice(), device
        ).reshape([2, 6]);
        (question, passage)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: BidafModel<TestBackend> = tiny_config().init(&device);
        let (q, p) = inputs::<TestBackend>(&device);
        assert_eq!(model.forward(q, p).dims(), [2, 3, 2]);
    }

    #[test]
    fn test_predictions_are_distributions() {
        let device = Default::default();
        let model: BidafModel<TestBackend> = tiny_config().init(&device);
        let (q, p) = inputs::<TestBackend>(&device);

        let probs: Vec<f32> = model.predict(q, p).into_data().convert::<f32>().to_vec().unwrap();
        for pair in probs.chunks(2) {
            assert!(pair.iter().all(|&x| (0.0..=1.0).contains(&x)));
            assert!((pair[0] + pair[1] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_highway_preserves_shape() {
        let device = Default::default();
        let cfg = tiny_config();
        let highway: Highway<TestBackend> = cfg.build_highway(&device);
        let x = Tensor::<TestBackend, 3>::ones([2, 5, 4], &device);
        assert_eq!(highway.forward(x).dims(), [2, 5, 4]);
    }

    #[test]
    fn test_embeddings_are_loaded_from_matrix() {
        let device = Default::default();
        let matrix = EmbeddingMatrix::zeros(12, 4);
        let model: BidafModel<TestBackend> = tiny_config()
            .init_with_embeddings(&matrix, &device)
            .unwrap();
        let total: f32 = model.embedding.weight.val().abs().sum().into_scalar().elem::<f32>();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_embedding_dim_mismatch() {
        let device = Default::default();
        let matrix = EmbeddingMatrix::zeros(12, 5);
        let err = tiny_config().init_with_embeddings::<TestBackend>(&matrix, &device).unwrap_err();
        assert!(matches!(err, QaError::EmbeddingDimMismatch { configured: 4, actual: 5 }));
    }

    #[test]
    fn test_cross_entropy_loss_is_positive() {
        let device = Default::default();
        let model: BidafModel<TestBackend> = tiny_config().init(&device);
        let (q, p) = inputs::<TestBackend>(&device);
        let labels = Tensor::<TestBackend, 1>::from_floats(
            [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0].as_slice(), &device
        ).reshape([2, 3, 2]);

        let (loss, logits) = model.forward_loss(q, p, labels, LossKind::CategoricalCrossentropy);
        assert_eq!(logits.dims(), [2, 3, 2]);
        let value: f64 = loss.into_scalar().elem::<f64>();
        assert!(value.is_finite() && value > 0.0);
    }

    #[test]
    fn test_training_step_reduces_loss() {
        let device = Default::default();
        let mut model: BidafModel<TestAutodiff> = tiny_config().with_embed_trainable(true).init(&device);
        let mut optim = AdamConfig::new().init();

        let labels = || Tensor::<TestAutodiff, 1>::from_floats(
            [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0].as_slice(), &device
        ).reshape([2, 3, 2]);

        let mut first = None;
        let mut last  = 0.0;
        for _ in 0..30 {
            let (q, p) = inputs::<TestAutodiff>(&device);
            let (loss, _) = model.forward_loss(q, p, labels(), LossKind::CategoricalCrossentropy);
            last = loss.clone().into_scalar().elem::<f64>();
            first.get_or_insert(last);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(1e-2, model, grads);
        }
        assert!(last < first.unwrap());
    }

    #[test]
    fn test_loss_and_activation_names() {
        assert_eq!("categorical_crossentropy".parse::<LossKind>().unwrap(), LossKind::CategoricalCrossentropy);
        assert_eq!("mse".parse::<LossKind>().unwrap(), LossKind::Mse);
        assert!("hinge".parse::<LossKind>().is_err());
        assert!(parse_activation("tanh").is_ok());
        assert!(parse_activation("swish").is_err());
    }
}

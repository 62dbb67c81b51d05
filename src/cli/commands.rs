// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their flags. Defaults reproduce the reference WikiQA run.
//
// clap's derive macros generate help text, missing-argument
// errors and string → number conversion. Policy, loss,
// optimizer and activation names are parsed here so a typo
// fails before any data is read.

use clap::{Args, Subcommand};

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    train_use_case::{ComputeDevice, TrainConfig},
};
use crate::data::embedding_matrix::SlotPolicy;
use crate::domain::error::QaError;
use crate::ml::model::{parse_activation, LossKind};
use crate::ml::trainer::OptimizerKind;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the answer-sentence model on a TSV corpus
    Train(TrainArgs),

    /// Score a held-out TSV corpus with a trained checkpoint
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training corpus (QuestionID, Question, DocumentID, DocumentTitle, SentenceID, Sentence, Label)
    #[arg(long, default_value = "data/WikiQA-train.tsv")]
    pub train_path: String,

    /// Held-out corpus evaluated after training
    #[arg(long)]
    pub eval_path: Option<String>,

    /// Pretrained vectors in GloVe or word2vec text format
    #[arg(long, default_value = "data/glove.6B.100d.txt")]
    pub embeddings_path: String,

    /// Directory for checkpoints, configs, vocabulary and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Words kept per document sentence
    #[arg(long, default_value_t = 60)]
    pub max_passage_words: usize,

    /// Documents per query; more is a fatal sizing error
    #[arg(long, default_value_t = 30)]
    pub max_passage_sents: usize,

    /// Words kept per query
    #[arg(long, default_value_t = 25)]
    pub max_question_words: usize,

    /// Must match the pretrained vector size
    #[arg(long, default_value_t = 100)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,

    /// Unknown-word row: zero | random
    #[arg(long, default_value = "zero")]
    pub unk_handle_method: String,

    /// Padding row: zero | random
    #[arg(long, default_value = "zero")]
    pub pad_handle_method: String,

    /// categorical-crossentropy | mse
    #[arg(long, default_value = "categorical-crossentropy")]
    pub loss: String,

    /// adam | adagrad | rmsprop | sgd
    #[arg(long, default_value = "adagrad")]
    pub optimizer: String,

    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    /// Batches per epoch, independent of corpus size
    #[arg(long, default_value_t = 46)]
    pub steps_per_epoch: usize,

    #[arg(long, default_value_t = 15)]
    pub n_epochs: usize,

    /// Hidden units per direction of every BiLSTM
    #[arg(long, default_value_t = 200)]
    pub encoder_hidden_nodes: usize,

    #[arg(long, default_value_t = 2)]
    pub n_highway_layers: usize,

    /// relu | tanh | sigmoid | gelu
    #[arg(long, default_value = "relu")]
    pub highway_activation: String,

    /// Fine-tune the embedding table
    #[arg(long)]
    pub embed_trainable: bool,

    /// Seed for the `random` pad/unk rows
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// cpu | gpu
    #[arg(long, default_value = "gpu")]
    pub device: String,

    /// Re-read the training file on every pass instead of caching it
    #[arg(long)]
    pub streaming: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = QaError;

    fn try_from(a: TrainArgs) -> Result<Self, Self::Error> {
        Ok(TrainConfig {
            unk_handle_method:    SlotPolicy::parse("unk_handle_method", &a.unk_handle_method)?,
            pad_handle_method:    SlotPolicy::parse("pad_handle_method", &a.pad_handle_method)?,
            loss:                 a.loss.parse::<LossKind>()?,
            optimizer:            a.optimizer.parse::<OptimizerKind>()?,
            highway_activation:   parse_activation(&a.highway_activation)?,
            device:               a.device.parse::<ComputeDevice>()?,
            train_path:           a.train_path,
            eval_path:            a.eval_path,
            embeddings_path:      a.embeddings_path,
            checkpoint_dir:       a.checkpoint_dir,
            max_passage_words:    a.max_passage_words,
            max_passage_sents:    a.max_passage_sents,
            max_question_words:   a.max_question_words,
            embedding_dim:        a.embedding_dim,
            batch_size:           a.batch_size,
            lr:                   a.lr,
            steps_per_epoch:      a.steps_per_epoch,
            n_epochs:             a.n_epochs,
            encoder_hidden_nodes: a.encoder_hidden_nodes,
            n_highway_layers:     a.n_highway_layers,
            embed_trainable:      a.embed_trainable,
            seed:                 a.seed,
            in_memory:            !a.streaming,
        })
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Held-out corpus in the training TSV format
    #[arg(long)]
    pub eval_path: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Defaults to the training batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip the final partial batch
    #[arg(long)]
    pub drop_last: bool,

    /// cpu | gpu
    #[arg(long, default_value = "gpu")]
    pub device: String,

    /// Write per-query predictions and the report as JSON
    #[arg(long)]
    pub report_path: Option<String>,
}

impl TryFrom<EvaluateArgs> for EvaluateConfig {
    type Error = QaError;

    fn try_from(a: EvaluateArgs) -> Result<Self, Self::Error> {
        Ok(EvaluateConfig {
            device:         a.device.parse::<ComputeDevice>()?,
            eval_path:      a.eval_path,
            checkpoint_dir: a.checkpoint_dir,
            batch_size:     a.batch_size,
            drop_last:      a.drop_last,
            report_path:    a.report_path,
        })
    }
}

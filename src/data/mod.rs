// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a raw TSV corpus to tensor batches.
//
//   WikiQA-style .tsv
//       │
//       ▼
//   TsvCorpus / InMemoryCorpus   → Samples (query, documents, labels)
//       │
//       ▼
//   VocabularyBuilder            → word → index, pad = 0, unk = vocab_size + 1
//       │
//       ▼
//   EmbeddingMatrixBuilder       → lookup table, vocabulary extended
//       │
//       ▼
//   BatchEncoder                 → fixed-shape indices + one-hot labels
//       │
//       ▼
//   TrainBatches / EvalBatches   → batch_size groups (cyclic / one pass)
//       │
//       ▼
//   BidafBatcher                 → Burn tensors
//
// Each module is responsible for exactly one step.

/// Reads WikiQA-style TSV corpora
pub mod loader;

/// Cleans and tokenises raw text
pub mod preprocessor;

/// Builds the word → index mapping from a training corpus
pub mod vocabulary;

/// Merges the vocabulary with a pretrained embedding space
pub mod embedding_matrix;

/// Sentence and passage level padding/truncation
pub mod encoder;

/// Cyclic training and one-pass evaluation batch streams
pub mod stream;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

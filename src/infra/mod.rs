// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-backed concerns shared by the other layers:
//
//   checkpoint.rs      — model weights (CompactRecorder), the
//                        training/model configs and the extended
//                        vocabulary, all in one directory
//
//   embedding_store.rs — GloVe / word2vec text vectors behind
//                        the PretrainedEmbeddings trait
//
//   metrics.rs         — per-epoch loss rows in metrics.csv

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained word vectors in text format
pub mod embedding_store;

/// Training metrics CSV logger
pub mod metrics;

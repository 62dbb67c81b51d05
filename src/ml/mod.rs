// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs the network.
//
//   attention.rs  — context↔query attention (similarity matrix,
//                   c2q and q2c summaries)
//   model.rs      — highway layers + BiDAF sentence classifier
//   trainer.rs    — fixed-step epochs over the cyclic batch stream
//   inferencer.rs — evaluation driver and ranking report

/// Bidirectional context/query attention
pub mod attention;

/// BiDAF answer-sentence model
pub mod model;

/// Training loop with per-epoch checkpointing
pub mod trainer;

/// Evaluation driver: predictions cut to real documents
pub mod inferencer;

// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// system works with. No Burn types, no file I/O.

/// Candidate sentence + relevance label
pub mod document;

/// Query with its labelled passage
pub mod sample;

/// Typed error taxonomy shared by the lower layers
pub mod error;

/// Collaborator traits (corpus source, pretrained embeddings)
pub mod traits;

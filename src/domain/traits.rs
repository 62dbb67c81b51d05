// ============================================================
// Layer 3 — Core Traits (Collaborator Seams)
// ============================================================
// The two external collaborators of the pipeline are reached
// only through these traits:
//
//   CorpusSource          → yields Samples, any number of passes
//   PretrainedEmbeddings  → word → vector store with its own vocab
//
// Implementations:
//   - TsvCorpus / InMemoryCorpus   (data::loader)
//   - TextEmbeddings               (infra::embedding_store)
//   - HashMap-backed stores in tests

use crate::domain::error::QaError;
use crate::domain::sample::Sample;

/// Lazy sequence of samples for one pass over a corpus.
pub type SampleIter<'a> = Box<dyn Iterator<Item = Result<Sample, QaError>> + 'a>;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// A restartable source of samples.
///
/// Every call to `pass` starts again from the first sample. The
/// training stream relies on this to cycle over the corpus for as
/// many epochs as the trainer asks for.
pub trait CorpusSource {
    fn pass(&self) -> Result<SampleIter<'_>, QaError>;
}

// ─── PretrainedEmbeddings ─────────────────────────────────────────────────────
/// A read-only pretrained embedding space.
///
/// `words` must enumerate in a stable order: the embedding matrix
/// builder assigns indices to embedding-only words in that order.
pub trait PretrainedEmbeddings {
    /// Dimension of every vector in the space
    fn vector_size(&self) -> usize;

    /// Number of words in the space
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, word: &str) -> bool {
        self.vector(word).is_some()
    }

    fn vector(&self, word: &str) -> Option<&[f32]>;

    fn words(&self) -> Box<dyn Iterator<Item = &str> + '_>;
}

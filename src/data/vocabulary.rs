// ============================================================
// Layer 4 — Vocabulary Builder
// ============================================================
// One full pass over the training corpus assigns every distinct
// query/document token a dense integer index.
//
// Index layout after `VocabularyBuilder::build`:
//
//   0                  pad   (reserved)
//   1 ..= vocab_size   training words, in first-seen order
//   vocab_size + 1     unk   (reserved, words never seen in training)
//
// The embedding matrix builder later appends embedding-only words
// after the unk slot (see `Vocabulary::extend`). Once that is done
// the vocabulary is only ever borrowed immutably.
//
// Example: corpus {"cat sat", "dog ran"}
//   cat → 1, sat → 2, dog → 3, ran → 4, pad = 0, unk = 5

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::QaError;
use crate::domain::sample::Sample;
use crate::domain::traits::CorpusSource;

pub const PAD_INDEX: u32 = 0;

// ─── Vocabulary ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    word2index: HashMap<String, u32>,
    vocab_size: usize,
    unk_index:  u32,
    next_index: u32,
}

impl Vocabulary {
    /// Build from words in index order (index = position + 1).
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut word2index = HashMap::new();
        for word in words {
            let next = word2index.len() as u32 + 1;
            word2index.entry(word.into()).or_insert(next);
        }
        let vocab_size = word2index.len();
        let unk_index  = vocab_size as u32 + 1;
        Self { word2index, vocab_size, unk_index, next_index: unk_index + 1 }
    }

    /// Number of distinct words seen in training (excludes extensions)
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of words with an index, including extensions
    pub fn len(&self) -> usize {
        self.word2index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word2index.is_empty()
    }

    pub fn pad_index(&self) -> u32 {
        PAD_INDEX
    }

    pub fn unk_index(&self) -> u32 {
        self.unk_index
    }

    /// Rows an embedding table needs to cover every index
    pub fn num_rows(&self) -> usize {
        self.next_index as usize
    }

    pub fn get(&self, word: &str) -> Option<u32> {
        self.word2index.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word2index.contains_key(word)
    }

    /// Index of `word`, or the unknown-word index if it was never seen.
    pub fn index(&self, word: &str) -> u32 {
        self.get(word).unwrap_or(self.unk_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.word2index.iter().map(|(w, &i)| (w.as_str(), i))
    }

    /// Assign `word` the next free index after the reserved slots.
    /// Returns the existing index if the word is already known.
    pub(crate) fn extend(&mut self, word: &str) -> u32 {
        if let Some(i) = self.get(word) {
            return i;
        }
        let index = self.next_index;
        self.word2index.insert(word.to_string(), index);
        self.next_index += 1;
        index
    }
}

// ─── Corpus statistics ────────────────────────────────────────────────────────
/// Aggregate corpus statistics. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStats {
    pub n_queries:          usize,
    pub n_docs:             usize,
    /// Queries whose passage holds no relevant document
    pub n_without_relevant: usize,
    pub query_lens:         Vec<usize>,
    pub doc_lens:           Vec<usize>,
    pub docs_per_query:     Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthSummary {
    pub min:  usize,
    pub max:  usize,
    pub mean: f64,
}

impl LengthSummary {
    fn of(values: &[usize]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let mean = values.iter().sum::<usize>() as f64 / values.len() as f64;
        Some(Self { min, max, mean })
    }
}

impl CorpusStats {
    pub fn query_len_summary(&self) -> Option<LengthSummary> {
        LengthSummary::of(&self.query_lens)
    }

    pub fn doc_len_summary(&self) -> Option<LengthSummary> {
        LengthSummary::of(&self.doc_lens)
    }

    pub fn docs_per_query_summary(&self) -> Option<LengthSummary> {
        LengthSummary::of(&self.docs_per_query)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "There are {} queries and {} docs in the training data",
            self.n_queries, self.n_docs
        );
        tracing::info!("{} queries have no relevant document", self.n_without_relevant);
        let rows = [
            ("query length",    self.query_len_summary()),
            ("document length", self.doc_len_summary()),
            ("docs per query",  self.docs_per_query_summary()),
        ];
        for (name, summary) in rows {
            if let Some(s) = summary {
                tracing::info!("{name}: min={} mean={:.1} max={}", s.min, s.mean, s.max);
            }
        }
    }
}

// ─── VocabularyBuilder ────────────────────────────────────────────────────────
/// Counts tokens in first-seen order.
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
    words:  Vec<String>,
    counts: Vec<usize>,
    lookup: HashMap<String, usize>,
    stats:  CorpusStats,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one full pass over `corpus` and build the vocabulary.
    pub fn from_corpus<C: CorpusSource + ?Sized>(corpus: &C) -> Result<(Vocabulary, CorpusStats), QaError> {
        let mut builder = Self::new();
        for sample in corpus.pass()? {
            builder.add_sample(&sample?);
        }
        Ok(builder.build())
    }

    pub fn add_sample(&mut self, sample: &Sample) {
        self.stats.n_queries += 1;
        self.stats.query_lens.push(sample.query.len());
        self.stats.docs_per_query.push(sample.num_documents());
        if !sample.has_relevant_document() {
            self.stats.n_without_relevant += 1;
        }
        self.observe_all(&sample.query);

        for doc in sample.documents() {
            self.stats.n_docs += 1;
            self.stats.doc_lens.push(doc.tokens.len());
            self.observe_all(&doc.tokens);
        }
    }

    fn observe_all(&mut self, tokens: &[String]) {
        for token in tokens {
            match self.lookup.get(token) {
                Some(&pos) => self.counts[pos] += 1,
                None => {
                    self.lookup.insert(token.clone(), self.words.len());
                    self.words.push(token.clone());
                    self.counts.push(1);
                }
            }
        }
    }

    /// The `n` most frequent words, ties in first-seen order
    pub fn most_frequent(&self, n: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .words
            .iter()
            .zip(&self.counts)
            .map(|(w, &c)| (w.as_str(), c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    pub fn build(self) -> (Vocabulary, CorpusStats) {
        tracing::debug!("Most frequent words: {:?}", self.most_frequent(10));
        let vocab = Vocabulary::from_words(self.words);
        tracing::info!("There are {} vocab words in the training data", vocab.vocab_size());
        tracing::info!(
            "The pad word is set to the index {} and unknown words to the index {}",
            vocab.pad_index(), vocab.unk_index()
        );
        (vocab, self.stats)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::InMemoryCorpus;
    use crate::domain::document::{LabeledDocument, Relevance};

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn sample(q: &str, docs: &[&str]) -> Sample {
        Sample::new(
            toks(q),
            docs.iter().map(|d| LabeledDocument::new(toks(d), Relevance::NotRelevant)).collect(),
        )
    }

    #[test]
    fn test_first_seen_order() {
        let corpus = InMemoryCorpus::new(vec![sample("cat sat", &[]), sample("dog ran", &[])]);
        let (vocab, _) = VocabularyBuilder::from_corpus(&corpus).unwrap();

        assert_eq!(vocab.vocab_size(), 4);
        assert_eq!(vocab.get("cat"), Some(1));
        assert_eq!(vocab.get("sat"), Some(2));
        assert_eq!(vocab.get("dog"), Some(3));
        assert_eq!(vocab.get("ran"), Some(4));
        assert_eq!(vocab.pad_index(), 0);
        assert_eq!(vocab.unk_index(), 5);
    }

    #[test]
    fn test_indices_are_dense_and_distinct() {
        let corpus = InMemoryCorpus::new(vec![
            sample("a b a c", &["b d e", "e f a"]),
            sample("g", &["h a"]),
        ]);
        let (vocab, _) = VocabularyBuilder::from_corpus(&corpus).unwrap();

        let mut indices: Vec<u32> = vocab.iter().map(|(_, i)| i).collect();
        indices.sort_unstable();
        let expected: Vec<u32> = (1..=vocab.vocab_size() as u32).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_query_words_before_document_words() {
        let corpus = InMemoryCorpus::new(vec![sample("q1", &["d1", "d2"])]);
        let (vocab, _) = VocabularyBuilder::from_corpus(&corpus).unwrap();
        assert_eq!(vocab.get("q1"), Some(1));
        assert_eq!(vocab.get("d1"), Some(2));
        assert_eq!(vocab.get("d2"), Some(3));
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let vocab = Vocabulary::from_words(["cat", "sat"]);
        assert_eq!(vocab.index("cat"), 1);
        assert_eq!(vocab.index("mat"), vocab.unk_index());
        assert_eq!(vocab.unk_index(), 3);
    }

    #[test]
    fn test_empty_corpus_gives_empty_vocab() {
        let (vocab, stats) = VocabularyBuilder::from_corpus(&InMemoryCorpus::default()).unwrap();
        assert!(vocab.is_empty());
        assert_eq!(vocab.unk_index(), 1);
        assert_eq!(stats.n_queries, 0);
        assert!(stats.query_len_summary().is_none());
    }

    #[test]
    fn test_stats_are_recorded() {
        let samples = vec![
            sample("a b", &["c", "d e f"]),
            sample("g h i j", &["k"]),
        ];
        let mut builder = VocabularyBuilder::new();
        for s in &samples {
            builder.add_sample(s);
        }
        builder.add_sample(&sample("a", &["a c"]));
        assert_eq!(builder.most_frequent(2), vec![("a", 3), ("c", 2)]);
        let (_, stats) = builder.build();

        assert_eq!(stats.n_queries, 3);
        assert_eq!(stats.n_docs, 4);
        assert_eq!(stats.n_without_relevant, 3);
        assert_eq!(stats.query_lens, vec![2, 4, 1]);
        assert_eq!(stats.doc_lens, vec![1, 3, 1, 2]);
        assert_eq!(stats.docs_per_query, vec![2, 1, 1]);
        let q = stats.query_len_summary().unwrap();
        assert_eq!((q.min, q.max), (1, 4));
        assert!((q.mean - 7.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_extend_appends_after_unk() {
        let mut vocab = Vocabulary::from_words(["cat", "sat"]);
        assert_eq!(vocab.extend("the"), 4);
        assert_eq!(vocab.extend("on"), 5);
        assert_eq!(vocab.extend("cat"), 1);
        assert_eq!(vocab.unk_index(), 3);
        assert_eq!(vocab.vocab_size(), 2);
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.num_rows(), 6);
    }
}

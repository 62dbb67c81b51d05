// ============================================================
// Layer 6 — Pretrained Embedding Store
// ============================================================
// Loads GloVe / word2vec text-format vectors:
//
//   400000 100               ← optional word2vec header (count, dim)
//   the 0.418 0.24968 ...
//   , 0.013441 0.23682 ...
//
// Words keep their file order, which decides the indices the
// embedding matrix builder gives to pretrained-only words.
// Duplicate words keep their first vector.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{bail, Context, Result};

use crate::domain::traits::PretrainedEmbeddings;

#[derive(Debug, Clone, Default)]
pub struct TextEmbeddings {
    words:   Vec<String>,
    index:   HashMap<String, usize>,
    vectors: Vec<f32>,
    dim:     usize,
}

impl TextEmbeddings {
    /// Load a text-format embedding file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open embedding file '{}'", path.display()))?;

        let store = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Cannot parse embedding file '{}'", path.display()))?;

        tracing::info!(
            "Loaded {} pretrained vectors of dimension {} from '{}'",
            store.len(), store.dim, path.display()
        );
        Ok(store)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut store = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let mut parts = line.split_whitespace();

            let Some(word) = parts.next() else { continue };
            let values: Vec<&str> = parts.collect();

            if line_no == 1 && is_word2vec_header(word, &values) {
                tracing::debug!("Skipping word2vec header '{}'", line.trim());
                continue;
            }

            let vector = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Line {line_no}: non-numeric vector component"))?;

            if vector.is_empty() {
                bail!("Line {line_no}: word '{word}' has no vector");
            }
            if store.dim == 0 {
                store.dim = vector.len();
            } else if vector.len() != store.dim {
                bail!(
                    "Line {line_no}: word '{word}' has {} components, expected {}",
                    vector.len(), store.dim
                );
            }

            store.insert(word, &vector);
        }

        Ok(store)
    }

    fn insert(&mut self, word: &str, vector: &[f32]) {
        if self.index.contains_key(word) {
            tracing::warn!("Duplicate embedding for '{}' ignored", word);
            return;
        }
        self.index.insert(word.to_string(), self.words.len());
        self.words.push(word.to_string());
        self.vectors.extend_from_slice(vector);
    }
}

fn is_word2vec_header(first: &str, rest: &[&str]) -> bool {
    rest.len() == 1 && first.parse::<usize>().is_ok() && rest[0].parse::<usize>().is_ok()
}

impl PretrainedEmbeddings for TextEmbeddings {
    fn vector_size(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.words.len()
    }

    fn vector(&self, word: &str) -> Option<&[f32]> {
        self.index
            .get(word)
            .map(|&i| &self.vectors[i * self.dim..(i + 1) * self.dim])
    }

    fn words(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.words.iter().map(String::as_str))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_glove_format() {
        let text = "the 0.1 0.2 0.3\ncat 1 2 3\n";
        let store = TextEmbeddings::from_reader(Cursor::new(text)).unwrap();

        assert_eq!(store.vector_size(), 3);
        assert_eq!(store.len(), 2);
        assert_eq!(store.vector("cat"), Some(&[1.0, 2.0, 3.0][..]));
        assert!(store.contains("the"));
        assert!(!store.contains("dog"));
        assert_eq!(store.words().collect::<Vec<_>>(), vec!["the", "cat"]);
    }

    #[test]
    fn test_word2vec_header_is_skipped() {
        let text = "2 2\nb 0.5 0.5\na -1 1\n";
        let store = TextEmbeddings::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.words().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_inconsistent_dimension_fails() {
        let text = "a 1 2\nb 1 2 3\n";
        assert!(TextEmbeddings::from_reader(Cursor::new(text)).is_err());
    }

    #[test]
    fn test_duplicates_keep_first_vector() {
        let text = "a 1 1\na 2 2\n";
        let store = TextEmbeddings::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.vector("a"), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x 0.25 0.75").unwrap();
        let store = TextEmbeddings::load(f.path()).unwrap();
        assert_eq!(store.vector("x"), Some(&[0.25, 0.75][..]));
        assert!(TextEmbeddings::load("/no/such/vectors.txt").is_err());
    }
}

// ============================================================
// Layer 3 — Labeled Document Domain Type
// ============================================================
// One candidate answer sentence inside a passage, already
// tokenised, paired with its binary relevance label.
//
// Pairing the tokens and the label in one struct means a
// document can never drift away from its label the way two
// parallel lists can.

use serde::{Deserialize, Serialize};

use crate::domain::error::QaError;

/// Binary relevance of a document to its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relevance {
    NotRelevant,
    Relevant,
}

impl Relevance {
    /// Class index used by the two-way classifier (0 or 1)
    pub fn class_index(self) -> usize {
        match self {
            Relevance::NotRelevant => 0,
            Relevance::Relevant    => 1,
        }
    }

    /// One-hot target pair: 0 → [1, 0], 1 → [0, 1]
    pub fn one_hot(self) -> [f32; 2] {
        match self {
            Relevance::NotRelevant => [1.0, 0.0],
            Relevance::Relevant    => [0.0, 1.0],
        }
    }

    pub fn is_relevant(self) -> bool {
        self == Relevance::Relevant
    }
}

impl TryFrom<i64> for Relevance {
    type Error = QaError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Relevance::NotRelevant),
            1 => Ok(Relevance::Relevant),
            other => Err(QaError::InvalidLabel(other)),
        }
    }
}

/// A tokenised candidate sentence with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledDocument {
    /// Source identifier (e.g. WikiQA SentenceID), kept for reporting
    pub id: Option<String>,

    /// Word tokens of the sentence
    pub tokens: Vec<String>,

    pub relevance: Relevance,
}

impl LabeledDocument {
    pub fn new(tokens: Vec<String>, relevance: Relevance) -> Self {
        Self { id: None, tokens, relevance }
    }
}

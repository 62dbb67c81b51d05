// ============================================================
// Layer 3 — Sample Domain Type
// ============================================================
// One training/evaluation unit: a tokenised query and the
// ordered set of candidate sentences (documents) that make up
// its passage, each carrying a relevance label.
//
// Example (WikiQA):
//   query:     ["how", "are", "glacier", "caves", "formed"]
//   documents: [ (["a", "partly", "submerged", ...], 0),
//                (["a", "glacier", "cave", "is", ...], 1) ]

use serde::{Deserialize, Serialize};

use crate::domain::document::{LabeledDocument, Relevance};
use crate::domain::error::QaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Source identifier (e.g. WikiQA QuestionID)
    pub query_id: Option<String>,

    /// Word tokens of the query
    pub query: Vec<String>,

    documents: Vec<LabeledDocument>,
}

impl Sample {
    pub fn new(query: Vec<String>, documents: Vec<LabeledDocument>) -> Self {
        Self { query_id: None, query, documents }
    }

    /// Build a sample from parallel document and label lists.
    ///
    /// Fails with `MisalignedLabels` when the lists differ in length
    /// and with `InvalidLabel` for any label outside {0, 1}.
    pub fn from_parallel(
        query:     Vec<String>,
        documents: Vec<Vec<String>>,
        labels:    Vec<i64>,
    ) -> Result<Self, QaError> {
        if documents.len() != labels.len() {
            return Err(QaError::MisalignedLabels {
                documents: documents.len(),
                labels:    labels.len(),
            });
        }

        let documents = documents
            .into_iter()
            .zip(labels)
            .map(|(tokens, label)| Ok(LabeledDocument::new(tokens, Relevance::try_from(label)?)))
            .collect::<Result<Vec<_>, QaError>>()?;

        Ok(Self::new(query, documents))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    pub fn documents(&self) -> &[LabeledDocument] {
        &self.documents
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    /// Attach source ids to the documents, in order.
    pub fn with_document_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (doc, id) in self.documents.iter_mut().zip(ids) {
            doc.id = Some(id.into());
        }
        self
    }

    pub fn has_relevant_document(&self) -> bool {
        self.documents.iter().any(|d| d.relevance.is_relevant())
    }
}

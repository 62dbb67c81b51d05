// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the pipeline can raise below the application
// layer. All of them are deterministic given the same input and
// configuration, so nothing here is retried.
//
//   configuration  InvalidPolicy, EmbeddingDimMismatch, InvalidConfig
//   sizing         TooManyDocuments
//   data           MisalignedLabels, InvalidLabel, MalformedRecord,
//                  EmptyCorpus, Io
//
// Sentence truncation and unknown tokens are NOT errors; they are
// handled inside the encoder.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("invalid value '{value}' for {option}: expected 'zero' or 'random'")]
    InvalidPolicy { option: &'static str, value: String },

    #[error("embedding_dim is {configured} but the pretrained vectors have {actual} dimensions")]
    EmbeddingDimMismatch { configured: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{limit} max_passage_sents isn't long enough for num docs {actual}")]
    TooManyDocuments { limit: usize, actual: usize },

    #[error("sample has {documents} documents but {labels} labels")]
    MisalignedLabels { documents: usize, labels: usize },

    #[error("relevance label must be 0 or 1, got {0}")]
    InvalidLabel(i64),

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("corpus pass produced no samples")]
    EmptyCorpus,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// True for the failures that must be fixed in the configuration
    /// rather than in the data.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            QaError::InvalidPolicy { .. }
                | QaError::EmbeddingDimMismatch { .. }
                | QaError::InvalidConfig(_)
                | QaError::TooManyDocuments { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_message_names_limit_and_count() {
        let e = QaError::TooManyDocuments { limit: 30, actual: 31 };
        let msg = e.to_string();
        assert!(msg.contains("30"));
        assert!(msg.contains("31"));
        assert!(e.is_config_error());
    }

    #[test]
    fn test_policy_message_names_option() {
        let e = QaError::InvalidPolicy { option: "unk_handle_method", value: "mean".into() };
        assert!(e.to_string().contains("unk_handle_method"));
        assert!(e.to_string().contains("mean"));
    }

    #[test]
    fn test_label_error_is_not_config() {
        assert!(!QaError::InvalidLabel(3).is_config_error());
    }
}

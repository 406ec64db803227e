use thiserror::Error;

use crate::vectorizer::concept_vec::ConceptId;

/// Errors raised by the indexing pipeline and the query-time loaders.
///
/// Zero-norm documents and queries are not errors; the APIs that can
/// produce them return `None` instead.
#[derive(Debug, Error)]
pub enum ConceptError {
    /// Malformed or unreadable global term weights file.
    #[error("term weights file malformed at line {line}: {reason}")]
    Vocabulary { line: usize, reason: String },

    /// A collaborator document with inconsistent term frequency data.
    #[error("document {doc_id} rejected: {reason}")]
    CorpusInput { doc_id: ConceptId, reason: String },

    /// Truncated or malformed record in the postings file.
    #[error("postings record for term {term:?} is corrupt: {reason}")]
    PostingsCorruption { term: String, reason: String },

    /// The inverter was fed a term stream that is not ascending.
    #[error("term stream is not sorted: {current:?} follows {previous:?}")]
    UnsortedInput { previous: String, current: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spill encoding error: {0}")]
    Spill(#[from] serde_cbor::Error),
}

pub type Result<T> = std::result::Result<T, ConceptError>;

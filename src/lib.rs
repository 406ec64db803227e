/// This crate is a concept-space indexing and relatedness scoring engine.
/// Texts are represented as weighted distributions over a fixed universe of
/// concepts (e.g. encyclopedia articles) and compared by cosine similarity.
pub mod config;
pub mod error;
pub mod index;
pub mod utils;
pub mod vectorizer;

/// Concept Space
/// The query-time entry point of this crate.
/// It loads a built index (global term weights + pruned postings) and maps
/// any text to a `SparseConceptVector`.
///
/// Provides:
/// - concept vectors of texts
/// - relatedness (cosine similarity) between two texts
/// - top-K concept search
///
/// A text without any retained term has no concept vector; relatedness and
/// search return `None` for it rather than an error.
pub use vectorizer::ConceptSpace;

/// Sparse Concept Vector
/// concept id -> weight mapping where absent ids weigh 0.
/// Supports point updates, additive merge, exponential blend, two norms,
/// and iteration in storage order or by descending weight.
pub use vectorizer::concept_vec::{ConceptId, SparseConceptVector};

/// Index Builder
/// Runs the batch pipeline over a corpus collaborator and writes
/// `term_weights.txt` and `postings.bin` under one directory.
///
/// - `IndexPaths`: file layout of one index
/// - `BuildReport`: documents and terms processed, skipped and pruned
pub use index::{BuildReport, IndexBuilder, IndexPaths};

/// Postings
/// - `PostingsWriter`: writes the sentinel terminated postings file
/// - `PostingsIndex`: loads it, tolerating corrupt records
/// - `PostingsInverter`: groups, ranks and prunes a term-sorted stream
/// - `ExternalSorter`: sorts the vectorizer output by term with bounded memory
pub use index::{
    external_sort::{ExternalSorter, TermTriple},
    inverter::{PostingsInverter, PruneWindow},
    postings::{PostingsIndex, PostingsWriter, TermPosting},
};

/// Global Term Weighter
/// Corpus-wide idf of every retained term, persisted as a text file.
pub use vectorizer::weighter::GlobalTermWeighter;

/// TF-IDF Calculation Engine
/// `DocumentVectorizer` projects one document into the normalized weighted
/// term space, with a title boost. The weighting itself is pluggable through
/// `TFIDFEngine`; `DefaultTFIDFEngine` uses `1 + ln(tf)` and `ln(N/df)`.
pub use vectorizer::tfidf::{DefaultTFIDFEngine, DocumentVectorizer, TFIDFEngine, TermVector};

/// Corpus collaborator contract and an in-memory implementation
pub use vectorizer::corpus::{CorpusIndex, DocumentRecord, MemoryCorpus};

/// Term frequencies and tokenization
pub use vectorizer::token::{SimpleTokenizer, TermFrequency, Tokenizer};

/// Top-K results of a concept vector
pub use vectorizer::evaluate::scoring::ConceptHits;

pub use config::EngineConfig;
pub use error::{ConceptError, Result};

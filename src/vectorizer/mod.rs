pub mod concept_vec;
pub mod corpus;
pub mod evaluate;
pub mod tfidf;
pub mod token;
pub mod weighter;

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::EngineConfig,
    error::Result,
    index::{postings::{PostingsIndex, TermPosting}, IndexPaths},
    vectorizer::{
        concept_vec::SparseConceptVector,
        evaluate::scoring::ConceptHits,
        tfidf::{DefaultTFIDFEngine, DocumentVectorizer, TFIDFEngine},
        token::{SimpleTokenizer, TermFrequency, Tokenizer},
        weighter::GlobalTermWeighter,
    },
};

/// ConceptSpace
/// Query-time view of a built index.
///
/// A text is weighted like a document (without title), then every term's
/// pruned postings list is added into one concept vector, scaled by the
/// term's weight in the text.
pub struct ConceptSpace<E = DefaultTFIDFEngine>
where
    E: TFIDFEngine,
{
    vectorizer: DocumentVectorizer<E>,
    postings: PostingsIndex,
    tokenizer: Box<dyn Tokenizer>,
    concept_num: usize,
}

impl<E> ConceptSpace<E>
where
    E: TFIDFEngine + Send + Sync,
{
    /// Assemble from loaded parts; config overrides are installed on the weighter
    pub fn new(
        weighter: GlobalTermWeighter,
        postings: PostingsIndex,
        config: &EngineConfig,
        tokenizer: Box<dyn Tokenizer>,
    ) -> Self {
        let weighter = Arc::new(weighter.with_overrides(&config.term_weight_overrides));
        Self {
            vectorizer: DocumentVectorizer::new(weighter, config),
            concept_num: postings.concept_num(),
            postings,
            tokenizer,
        }
    }

    /// Load the weights and postings files of `paths`
    pub fn open(paths: &IndexPaths, config: &EngineConfig) -> Result<Self> {
        Self::open_with_tokenizer(paths, config, Box::new(SimpleTokenizer::default()))
    }

    pub fn open_with_tokenizer(
        paths: &IndexPaths,
        config: &EngineConfig,
        tokenizer: Box<dyn Tokenizer>,
    ) -> Result<Self> {
        config.validate()?;
        let weighter = GlobalTermWeighter::load(paths.weights())?;
        let postings = PostingsIndex::open(paths.postings())?;
        debug!(
            terms = weighter.len(),
            postings_terms = postings.len(),
            corrupt = postings.corrupt_terms(),
            "concept space loaded"
        );
        Ok(Self::new(weighter, postings, config, tokenizer))
    }

    /// number of distinct concepts reachable through the postings
    #[inline]
    pub fn concept_num(&self) -> usize {
        self.concept_num
    }

    pub fn weighter(&self) -> &GlobalTermWeighter {
        self.vectorizer.weighter()
    }

    /// pruned postings of one term
    #[inline]
    pub fn postings(&self, term: &str) -> &[TermPosting] {
        self.postings.get(term)
    }

    /// Concept vector of already tokenized text.
    /// `None` when no term carries signal.
    pub fn concept_vector(&self, terms: &TermFrequency) -> Option<SparseConceptVector> {
        let text_vector = self.vectorizer.vectorize(terms, None)?;
        let mut concepts = SparseConceptVector::new(self.concept_num);
        for (term, term_weight) in text_vector.iter() {
            for posting in self.postings.get(term) {
                concepts.add(posting.concept, posting.weight as f64 * term_weight);
            }
        }
        if concepts.is_empty() {
            debug!(terms = terms.len(), "text maps to no concept");
            return None;
        }
        Some(concepts)
    }

    pub fn concept_vector_text(&self, text: &str) -> Option<SparseConceptVector> {
        self.concept_vector(&self.tokenizer.term_frequency(text))
    }

    /// Cosine relatedness of two texts in concept space.
    /// `None` when either text has no signal.
    pub fn relatedness(&self, a: &str, b: &str) -> Option<f64> {
        let a = self.concept_vector_text(a)?;
        let b = self.concept_vector_text(b)?;
        Some(a.cosine_similarity(&b))
    }

    /// The `k` concepts `text` is closest to
    pub fn search(&self, text: &str, k: usize) -> Option<ConceptHits> {
        self.concept_vector_text(text).map(|vector| ConceptHits::top_k(&vector, k))
    }
}

use std::{marker::PhantomData, sync::Arc};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    config::EngineConfig,
    error::Result,
    vectorizer::{corpus::DocumentRecord, token::TermFrequency, weighter::GlobalTermWeighter},
};

/// term -> weight of one document or query
pub type TermVector = IndexMap<Box<str>, f64>;

/// Weighting scheme used by the weighter and the vectorizer
pub trait TFIDFEngine {
    /// weight of a raw in-document frequency
    fn tf(raw_count: u32) -> f64;
    /// corpus-wide rarity of a term
    fn idf(doc_num: u64, doc_freq: u64) -> f64;
}

/// Log-dampened TF and plain log IDF
/// - tf  = 1 + ln(raw)
/// - idf = ln(N / df)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTFIDFEngine;

impl TFIDFEngine for DefaultTFIDFEngine {
    #[inline]
    fn tf(raw_count: u32) -> f64 {
        if raw_count == 0 {
            return 0.0;
        }
        1.0 + (raw_count as f64).ln()
    }

    #[inline]
    fn idf(doc_num: u64, doc_freq: u64) -> f64 {
        if doc_freq == 0 {
            return 0.0;
        }
        (doc_num as f64 / doc_freq as f64).ln()
    }
}

/// DocumentVectorizer
/// Projects one document (or query) into the L2-normalized weighted term space.
#[derive(Debug, Clone)]
pub struct DocumentVectorizer<E = DefaultTFIDFEngine>
where
    E: TFIDFEngine,
{
    weighter: Arc<GlobalTermWeighter>,
    title_boost: f64,
    _marker: PhantomData<E>,
}

impl<E> DocumentVectorizer<E>
where
    E: TFIDFEngine + Send + Sync,
{
    pub fn new(weighter: Arc<GlobalTermWeighter>, config: &EngineConfig) -> Self {
        Self {
            weighter,
            title_boost: if config.title_boost_enabled() { config.title_boost } else { 1.0 },
            _marker: PhantomData,
        }
    }

    pub fn weighter(&self) -> &GlobalTermWeighter {
        &self.weighter
    }

    /// Weighted, normalized term vector of a body and an optional title.
    ///
    /// # Arguments
    /// * `body` - raw frequencies of the body field
    /// * `title` - raw frequencies of the title field, boosted when enabled
    ///
    /// # Returns
    /// * `None` when no term of the document is known to the weighter
    pub fn vectorize(&self, body: &TermFrequency, title: Option<&TermFrequency>) -> Option<TermVector> {
        let mut weights = TermVector::with_capacity(body.len());
        for (term, count) in body.iter() {
            if let Some(idf) = self.weighter.idf(term) {
                weights.insert(Box::from(term), E::tf(count) * idf);
            }
        }

        if let Some(title) = title.filter(|_| self.title_boost > 1.0) {
            // title-only terms contribute too
            for (term, count) in title.iter() {
                let Some(idf) = self.weighter.idf(term) else { continue };
                match weights.get_mut(term) {
                    Some(weight) => *weight *= self.title_boost,
                    None => {
                        weights.insert(Box::from(term), E::tf(count) * idf * self.title_boost);
                    }
                }
            }
        }

        weights.retain(|_, weight| *weight != 0.0);
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            debug!(terms = body.len(), "degenerate term vector, no signal");
            return None;
        }
        for weight in weights.values_mut() {
            *weight /= norm;
        }
        Some(weights)
    }

    /// Validate and vectorize a corpus document
    pub fn vectorize_document(&self, doc: &DocumentRecord) -> Result<Option<TermVector>> {
        doc.validate()?;
        Ok(self.vectorize(&doc.body, Some(&doc.title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighter(pairs: &[(&str, f64)]) -> Arc<GlobalTermWeighter> {
        Arc::new(GlobalTermWeighter::from_pairs(pairs.iter().map(|&(t, idf)| (t, idf))))
    }

    fn freq(pairs: &[(&str, u32)]) -> TermFrequency {
        let mut f = TermFrequency::new();
        for &(term, count) in pairs {
            f.set_term_count(term, count);
        }
        f
    }

    #[test]
    fn default_engine_formulas() {
        assert_eq!(DefaultTFIDFEngine::tf(1), 1.0);
        assert!((DefaultTFIDFEngine::tf(3) - (1.0 + 3f64.ln())).abs() < 1e-12);
        assert_eq!(DefaultTFIDFEngine::tf(0), 0.0);
        assert!((DefaultTFIDFEngine::idf(100, 10) - 10f64.ln()).abs() < 1e-12);
        assert_eq!(DefaultTFIDFEngine::idf(100, 0), 0.0);
    }

    #[test]
    fn single_term_document_has_unit_weight() {
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(weighter(&[("rust", 2.302585)]), &EngineConfig::default());
        let vec = vectorizer.vectorize(&freq(&[("rust", 1)]), None).unwrap();
        assert_eq!(vec.len(), 1);
        assert_eq!(vec["rust"], 1.0);
    }

    #[test]
    fn output_is_l2_normalized_and_skips_unknown_terms() {
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(
            weighter(&[("a", 1.0), ("b", 2.0)]),
            &EngineConfig::default(),
        );
        let vec = vectorizer.vectorize(&freq(&[("a", 3), ("b", 1), ("zzz", 9)]), None).unwrap();
        assert!(!vec.contains_key("zzz"));
        let norm: f64 = vec.values().map(|w| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        let a = 1.0 + 3f64.ln();
        let b = 2.0;
        assert!((vec["a"] / vec["b"] - a / b).abs() < 1e-12);
    }

    #[test]
    fn title_terms_are_boosted_and_title_only_terms_kept() {
        let config = EngineConfig::default().with_title_boost(2.0);
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(weighter(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]), &config);
        let vec = vectorizer
            .vectorize(&freq(&[("a", 1), ("b", 1)]), Some(&freq(&[("a", 1), ("c", 1)])))
            .unwrap();
        assert_eq!(vec.len(), 3);
        // a and c are boosted, b is not
        assert!((vec["a"] / vec["b"] - 2.0).abs() < 1e-12);
        assert!((vec["c"] / vec["b"] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn disabled_boost_ignores_title() {
        let config = EngineConfig::default().with_title_boost(1.0);
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(weighter(&[("a", 1.0), ("c", 1.0)]), &config);
        let vec = vectorizer.vectorize(&freq(&[("a", 1)]), Some(&freq(&[("c", 1)]))).unwrap();
        assert_eq!(vec.len(), 1);
        assert_eq!(vec["a"], 1.0);
    }

    #[test]
    fn document_without_known_terms_is_degenerate() {
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(weighter(&[("a", 1.0), ("zero", 0.0)]), &EngineConfig::default());
        assert!(vectorizer.vectorize(&freq(&[("x", 2)]), None).is_none());
        assert!(vectorizer.vectorize(&freq(&[("zero", 2)]), None).is_none());
        assert!(vectorizer.vectorize(&TermFrequency::new(), None).is_none());
    }

    #[test]
    fn invalid_document_is_reported() {
        let vectorizer: DocumentVectorizer = DocumentVectorizer::new(weighter(&[("a", 1.0)]), &EngineConfig::default());
        let doc = DocumentRecord::new(0, TermFrequency::new(), freq(&[("a", 1)]));
        assert!(vectorizer.vectorize_document(&doc).is_err());
        let doc = DocumentRecord::new(7, TermFrequency::new(), freq(&[("a", 1)]));
        assert!(vectorizer.vectorize_document(&doc).unwrap().is_some());
    }
}

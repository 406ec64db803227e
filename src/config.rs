use std::io::{Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConceptError, Result};

/// Tunables of the indexing pipeline and the query-time vectorizer.
///
/// Passed explicitly to every component at construction time.
/// Missing fields fall back to their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Multiplier for terms found in a document title.
    /// Values `<= 1.0` disable boosting.
    pub title_boost: f64,
    /// Number of postings always kept per term, and the width of the
    /// sliding window used to decide on the rest.
    pub prune_window: usize,
    /// Relative spread (to the highest weight of the term) below which
    /// a postings list is truncated.
    pub prune_threshold: f64,
    /// Terms with a document frequency at or below this must occur in
    /// at least one title to be kept.
    pub rare_term_doc_freq: u64,
    /// Triples held in memory by the external sorter before a run is spilled.
    pub sort_chunk_size: usize,
    /// Documents vectorized per parallel batch.
    pub doc_batch_size: usize,
    /// User supplied idf values, consulted before the computed table.
    pub term_weight_overrides: IndexMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title_boost: 1.5,
            prune_window: 100,
            prune_threshold: 0.005,
            rare_term_doc_freq: 5,
            sort_chunk_size: 1_000_000,
            doc_batch_size: 4096,
            term_weight_overrides: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title_boost(mut self, boost: f64) -> Self {
        self.title_boost = boost;
        self
    }

    pub fn with_prune_window(mut self, window: usize) -> Self {
        self.prune_window = window;
        self
    }

    pub fn with_prune_threshold(mut self, threshold: f64) -> Self {
        self.prune_threshold = threshold;
        self
    }

    pub fn with_rare_term_doc_freq(mut self, doc_freq: u64) -> Self {
        self.rare_term_doc_freq = doc_freq;
        self
    }

    pub fn with_sort_chunk_size(mut self, size: usize) -> Self {
        self.sort_chunk_size = size;
        self
    }

    pub fn with_doc_batch_size(mut self, size: usize) -> Self {
        self.doc_batch_size = size;
        self
    }

    pub fn with_term_weight_override(mut self, term: &str, idf: f64) -> Self {
        self.term_weight_overrides.insert(term.to_string(), idf);
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.title_boost.is_finite() || self.title_boost <= 0.0 {
            return Err(ConceptError::Config(format!(
                "title_boost must be a positive finite number, got {}",
                self.title_boost
            )));
        }
        if self.prune_window == 0 {
            return Err(ConceptError::Config("prune_window must be at least 1".into()));
        }
        if !self.prune_threshold.is_finite() || self.prune_threshold < 0.0 {
            return Err(ConceptError::Config(format!(
                "prune_threshold must be finite and non-negative, got {}",
                self.prune_threshold
            )));
        }
        if self.sort_chunk_size == 0 {
            return Err(ConceptError::Config("sort_chunk_size must be at least 1".into()));
        }
        if self.doc_batch_size == 0 {
            return Err(ConceptError::Config("doc_batch_size must be at least 1".into()));
        }
        if let Some((term, idf)) = self
            .term_weight_overrides
            .iter()
            .find(|(_, idf)| !idf.is_finite())
        {
            return Err(ConceptError::Config(format!(
                "override for {term:?} is not finite: {idf}"
            )));
        }
        Ok(())
    }

    /// Read a CBOR encoded config and validate it
    pub fn from_cbor_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_cbor::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_cbor_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_cbor::to_writer(writer, self)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn title_boost_enabled(&self) -> bool {
        self.title_boost > 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.prune_window, 100);
        assert_eq!(config.prune_threshold, 0.005);
        assert_eq!(config.title_boost, 1.5);
        assert_eq!(config.rare_term_doc_freq, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(EngineConfig::new().with_prune_window(0).validate().is_err());
        assert!(EngineConfig::new().with_prune_threshold(-0.1).validate().is_err());
        assert!(EngineConfig::new().with_title_boost(f64::NAN).validate().is_err());
        assert!(EngineConfig::new().with_sort_chunk_size(0).validate().is_err());
        assert!(EngineConfig::new()
            .with_term_weight_override("rust", f64::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn cbor_round_trip_keeps_overrides() {
        let config = EngineConfig::new()
            .with_prune_window(20)
            .with_term_weight_override("rust", 3.25);
        let mut buf = Vec::new();
        config.to_cbor_writer(&mut buf).unwrap();
        let loaded = EngineConfig::from_cbor_reader(buf.as_slice()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn boost_of_one_disables_title_boost() {
        assert!(!EngineConfig::new().with_title_boost(1.0).title_boost_enabled());
        assert!(EngineConfig::new().title_boost_enabled());
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};

use crate::error::{ConceptError, Result};
use crate::vectorizer::{concept_vec::ConceptId, token::TermFrequency};

/// One document as handed over by the full-text index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// stable concept id of the document, must be positive
    pub id: ConceptId,
    pub title: TermFrequency,
    pub body: TermFrequency,
}

impl DocumentRecord {
    pub fn new(id: ConceptId, title: TermFrequency, body: TermFrequency) -> Self {
        Self { id, title, body }
    }

    /// Reject records the vectorizer can not trust
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(ConceptError::CorpusInput {
                doc_id: self.id,
                reason: "document id must be positive".into(),
            });
        }
        for (field, freq) in [("title", &self.title), ("body", &self.body)] {
            for (term, count) in freq.iter() {
                if term.is_empty() {
                    return Err(ConceptError::CorpusInput {
                        doc_id: self.id,
                        reason: format!("empty term in {field}"),
                    });
                }
                if count == 0 {
                    return Err(ConceptError::CorpusInput {
                        doc_id: self.id,
                        reason: format!("term {term:?} in {field} has frequency 0"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Contract required from the full-text index
pub trait CorpusIndex: Sync {
    /// number of documents in the corpus
    fn doc_num(&self) -> u64;
    /// number of documents containing `term` in any field
    fn doc_freq(&self, term: &str) -> u64;
    /// whether `term` occurs in at least one title
    fn title_contains(&self, term: &str) -> bool;
    /// every distinct term of the corpus
    fn vocabulary(&self) -> Vec<Box<str>>;
    /// every document, in any order
    fn documents(&self) -> Box<dyn Iterator<Item = Result<DocumentRecord>> + '_>;
}

/// per-term statistics of `MemoryCorpus`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStat {
    pub doc_freq: u64,
    pub title_freq: u64,
}

/// In-memory corpus keeping document count and term statistics
/// in a thread-safe way.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    doc_num: AtomicU64,
    term_stats: DashMap<Box<str>, TermStat, RandomState>,
    documents: DashMap<ConceptId, DocumentRecord, RandomState>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self {
            doc_num: AtomicU64::new(0),
            term_stats: DashMap::with_hasher(RandomState::new()),
            documents: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Add a document, replacing any document with the same id.
    ///
    /// The id slot stays locked while the statistics change, so concurrent
    /// writers of one id are applied one after another.
    pub fn add_document(&self, doc: DocumentRecord) {
        match self.documents.entry(doc.id) {
            Entry::Occupied(mut slot) => {
                self.add_stats(&doc);
                let old = slot.insert(doc);
                self.remove_stats(&old);
            }
            Entry::Vacant(slot) => {
                self.add_stats(&doc);
                slot.insert(doc);
                self.doc_num.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Tokenize `title` and `body` and add them as one document
    pub fn add_text<T: crate::vectorizer::token::Tokenizer + ?Sized>(
        &self,
        id: ConceptId,
        title: &str,
        body: &str,
        tokenizer: &T,
    ) {
        self.add_document(DocumentRecord::new(
            id,
            tokenizer.term_frequency(title),
            tokenizer.term_frequency(body),
        ));
    }

    pub fn remove_document(&self, id: ConceptId) -> Option<DocumentRecord> {
        let (_, doc) = self.documents.remove(&id)?;
        self.remove_stats(&doc);
        self.doc_num.fetch_sub(1, Ordering::Relaxed);
        Some(doc)
    }

    pub fn term_stat(&self, term: &str) -> Option<TermStat> {
        self.term_stats.get(term).map(|stat| *stat)
    }

    fn add_stats(&self, doc: &DocumentRecord) {
        for term in Self::distinct_terms(doc) {
            let in_title = doc.title.contains_term(term) as u64;
            self.term_stats
                .entry(term.into())
                .and_modify(|stat| {
                    stat.doc_freq += 1;
                    stat.title_freq += in_title;
                })
                .or_insert(TermStat {
                    doc_freq: 1,
                    title_freq: in_title,
                });
        }
    }

    fn remove_stats(&self, doc: &DocumentRecord) {
        for term in Self::distinct_terms(doc) {
            let in_title = doc.title.contains_term(term) as u64;
            let emptied = self.term_stats.get_mut(term).map(|mut stat| {
                stat.doc_freq = stat.doc_freq.saturating_sub(1);
                stat.title_freq = stat.title_freq.saturating_sub(in_title);
                stat.doc_freq == 0
            });
            // another writer may have bumped the count since the guard was released
            if emptied == Some(true) {
                self.term_stats.remove_if(term, |_, stat| stat.doc_freq == 0);
            }
        }
    }

    /// union of title and body terms
    fn distinct_terms(doc: &DocumentRecord) -> impl Iterator<Item = &str> {
        doc.title
            .iter()
            .map(|(term, _)| term)
            .chain(doc.body.iter().map(|(term, _)| term).filter(move |term| !doc.title.contains_term(term)))
    }
}

impl CorpusIndex for MemoryCorpus {
    fn doc_num(&self) -> u64 {
        self.doc_num.load(Ordering::Relaxed)
    }

    fn doc_freq(&self, term: &str) -> u64 {
        self.term_stats.get(term).map_or(0, |stat| stat.doc_freq)
    }

    fn title_contains(&self, term: &str) -> bool {
        self.term_stats.get(term).is_some_and(|stat| stat.title_freq > 0)
    }

    fn vocabulary(&self) -> Vec<Box<str>> {
        self.term_stats.iter().map(|entry| entry.key().clone()).collect()
    }

    fn documents(&self) -> Box<dyn Iterator<Item = Result<DocumentRecord>> + '_> {
        Box::new(self.documents.iter().map(|entry| Ok(entry.value().clone())))
    }
}

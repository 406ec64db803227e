pub mod external_sort;
pub mod inverter;
pub mod postings;

use std::{
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::{ConceptError, Result},
    index::{
        external_sort::{ExternalSorter, TermTriple},
        inverter::PostingsInverter,
        postings::PostingsWriter,
    },
    vectorizer::{
        concept_vec::ConceptId,
        corpus::{CorpusIndex, DocumentRecord},
        tfidf::{DefaultTFIDFEngine, DocumentVectorizer, TFIDFEngine, TermVector},
        weighter::GlobalTermWeighter,
    },
};

/// File layout of one built index
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// `term<TAB>idf` text file
    pub fn weights(&self) -> PathBuf {
        self.root.join("term_weights.txt")
    }

    /// pruned postings binary file
    pub fn postings(&self) -> PathBuf {
        self.root.join("postings.bin")
    }
}

/// Counters of one build run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// retained terms in the global weights table
    pub vocabulary: usize,
    pub documents: u64,
    pub documents_vectorized: u64,
    /// rejected as inconsistent by the corpus checks
    pub documents_skipped: u64,
    /// no retained term, no signal
    pub documents_degenerate: u64,
    pub triples: u64,
    pub terms_written: usize,
    pub terms_skipped: usize,
    pub postings_kept: usize,
    pub postings_pruned: usize,
}

/// IndexBuilder
/// Runs the batch pipeline end to end:
/// global term weights -> per-document vectors -> external sort by term
/// -> pruned postings file.
///
/// Inconsistent documents are skipped and counted, any other failure
/// aborts the build.
#[derive(Debug, Clone)]
pub struct IndexBuilder<E = DefaultTFIDFEngine>
where
    E: TFIDFEngine,
{
    config: EngineConfig,
    _marker: PhantomData<E>,
}

impl<E> IndexBuilder<E>
where
    E: TFIDFEngine + Send + Sync,
{
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build<C>(&self, corpus: &C, paths: &IndexPaths) -> Result<BuildReport>
    where
        C: CorpusIndex + ?Sized,
    {
        fs::create_dir_all(&paths.root)?;

        let weighter = Arc::new(GlobalTermWeighter::build::<E, C>(corpus, &self.config));
        weighter.save(paths.weights())?;
        let mut report = BuildReport {
            vocabulary: weighter.len(),
            ..BuildReport::default()
        };

        let vectorizer = DocumentVectorizer::<E>::new(Arc::clone(&weighter), &self.config);
        let mut sorter = ExternalSorter::in_dir(self.config.sort_chunk_size, &paths.root);
        self.vectorize_corpus(corpus, &vectorizer, &mut sorter, &mut report)?;
        info!(
            documents = report.documents,
            vectorized = report.documents_vectorized,
            skipped = report.documents_skipped,
            degenerate = report.documents_degenerate,
            triples = report.triples,
            "corpus vectorized"
        );

        let sorted = sorter.finish()?;
        let mut writer = PostingsWriter::create(paths.postings())?;
        let stats = PostingsInverter::new(&self.config).invert(sorted, &mut writer)?;
        writer.finish()?;

        report.terms_written = stats.terms_written;
        report.terms_skipped = stats.terms_skipped;
        report.postings_kept = stats.postings_kept;
        report.postings_pruned = stats.postings_pruned;
        info!(root = %paths.root.display(), ?report, "index built");
        Ok(report)
    }

    /// Vectorize documents batch by batch, feeding rows to the sorter
    fn vectorize_corpus<C>(
        &self,
        corpus: &C,
        vectorizer: &DocumentVectorizer<E>,
        sorter: &mut ExternalSorter,
        report: &mut BuildReport,
    ) -> Result<()>
    where
        C: CorpusIndex + ?Sized,
    {
        let mut documents = corpus.documents();
        loop {
            let batch: Vec<Result<DocumentRecord>> = documents.by_ref().take(self.config.doc_batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let vectors: Vec<Result<(ConceptId, Option<TermVector>)>> = batch
                .into_par_iter()
                .map(|doc| {
                    let doc = doc?;
                    Ok((doc.id, vectorizer.vectorize_document(&doc)?))
                })
                .collect();

            for outcome in vectors {
                report.documents += 1;
                match outcome {
                    Ok((id, Some(vector))) => {
                        report.documents_vectorized += 1;
                        for (term, weight) in vector {
                            sorter.push(TermTriple { term, concept: id, weight })?;
                            report.triples += 1;
                        }
                    }
                    Ok((id, None)) => {
                        report.documents_degenerate += 1;
                        debug!(doc_id = id, "document has no retained term");
                    }
                    Err(ConceptError::CorpusInput { doc_id, reason }) => {
                        report.documents_skipped += 1;
                        warn!(doc_id, %reason, "skipping document");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}

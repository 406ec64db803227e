use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;

use crate::{error::Result, vectorizer::concept_vec::ConceptId};

/// One (term, concept, weight) row emitted by the vectorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermTriple {
    pub term: Box<str>,
    pub concept: ConceptId,
    pub weight: f64,
}

impl TermTriple {
    pub fn new(term: &str, concept: ConceptId, weight: f64) -> Self {
        Self {
            term: Box::from(term),
            concept,
            weight,
        }
    }
}

/// upper bound on runs read at once during a merge
pub const MAX_FAN_IN: usize = 256;

/// ExternalSorter
/// Sorts an unbounded stream of `TermTriple` ascending by term.
///
/// At most `chunk_size` triples are held in memory; full chunks are sorted
/// and spilled as CBOR runs into a private temp directory, which is removed
/// when the sorter (or the returned `SortedTriples`) is dropped.
/// No more than `max_fan_in` runs are open at a time; larger run sets are
/// merged down in passes first.
/// Equal terms keep the order in which they were pushed.
pub struct ExternalSorter {
    chunk_size: usize,
    max_fan_in: usize,
    buffer: Vec<TermTriple>,
    parent: Option<PathBuf>,
    spill_dir: Option<TempDir>,
    runs: Vec<PathBuf>,
    run_seq: usize,
}

impl ExternalSorter {
    /// Spill into the system temp directory
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_fan_in: MAX_FAN_IN,
            buffer: Vec::new(),
            parent: None,
            spill_dir: None,
            runs: Vec::new(),
            run_seq: 0,
        }
    }

    /// Spill into a fresh directory under `dir`
    pub fn in_dir<P: AsRef<Path>>(chunk_size: usize, dir: P) -> Self {
        Self {
            parent: Some(dir.as_ref().to_path_buf()),
            ..Self::new(chunk_size)
        }
    }

    /// Limit the number of runs merged at once (at least 2)
    pub fn with_max_fan_in(mut self, fan_in: usize) -> Self {
        self.max_fan_in = fan_in.max(2);
        self
    }

    pub fn push(&mut self, triple: TermTriple) -> Result<()> {
        self.buffer.push(triple);
        if self.buffer.len() >= self.chunk_size {
            self.spill()?;
        }
        Ok(())
    }

    pub fn extend<I>(&mut self, triples: I) -> Result<()>
    where
        I: IntoIterator<Item = TermTriple>,
    {
        for triple in triples {
            self.push(triple)?;
        }
        Ok(())
    }

    /// number of runs on disk
    #[inline]
    pub fn runs(&self) -> usize {
        self.runs.len()
    }

    fn sort_buffer(&mut self) {
        self.buffer.par_sort_by(|a, b| a.term.cmp(&b.term));
    }

    fn next_run_path(&mut self) -> Result<PathBuf> {
        let dir = match self.spill_dir.take() {
            Some(dir) => dir,
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("concept-sort-");
                match &self.parent {
                    Some(parent) => builder.tempdir_in(parent)?,
                    None => builder.tempdir()?,
                }
            }
        };
        let path = dir.path().join(format!("run-{:05}.cbor", self.run_seq));
        self.spill_dir = Some(dir);
        self.run_seq += 1;
        Ok(path)
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sort_buffer();
        let path = self.next_run_path()?;

        let mut writer = BufWriter::new(File::create(&path)?);
        for triple in self.buffer.drain(..) {
            serde_cbor::to_writer(&mut writer, &triple)?;
        }
        writer.flush()?;
        debug!(run = self.runs.len(), path = %path.display(), "spilled sorted run");
        self.runs.push(path);
        Ok(())
    }

    /// Merge neighbouring runs until at most `max_fan_in` remain
    fn reduce_runs(&mut self) -> Result<()> {
        let fan_in = self.max_fan_in;
        while self.runs.len() > fan_in {
            let runs = std::mem::take(&mut self.runs);
            for group in runs.chunks(fan_in) {
                if let [single] = group {
                    self.runs.push(single.clone());
                    continue;
                }
                let path = self.next_run_path()?;
                let mut writer = BufWriter::new(File::create(&path)?);
                for triple in RunMerger::open(group)? {
                    serde_cbor::to_writer(&mut writer, &triple?)?;
                }
                writer.flush()?;
                for merged in group {
                    std::fs::remove_file(merged)?;
                }
                self.runs.push(path);
            }
            debug!(runs = self.runs.len(), fan_in, "merge pass done");
        }
        Ok(())
    }

    /// Sort what is left and hand out the merged stream
    pub fn finish(mut self) -> Result<SortedTriples> {
        if self.runs.is_empty() {
            self.sort_buffer();
            let buffer = std::mem::take(&mut self.buffer);
            return Ok(SortedTriples {
                inner: SortedInner::Memory(buffer.into_iter()),
                _spill_dir: None,
            });
        }
        self.spill()?;
        self.reduce_runs()?;

        let merger = RunMerger::open(&self.runs)?;
        Ok(SortedTriples {
            inner: SortedInner::Merge(merger),
            _spill_dir: self.spill_dir.take(),
        })
    }
}

type RunReader = Box<dyn Iterator<Item = std::result::Result<TermTriple, serde_cbor::Error>>>;

/// heap key: term first, run index breaks ties
struct HeapEntry {
    triple: TermTriple,
    run: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple
            .term
            .cmp(&other.triple.term)
            .then_with(|| self.run.cmp(&other.run))
    }
}

/// k-way merge over the spilled runs
struct RunMerger {
    runs: Vec<RunReader>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    pending: Option<serde_cbor::Error>,
}

impl RunMerger {
    /// Open `paths` in order; earlier runs win ties
    fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut merger = Self {
            runs: Vec::with_capacity(paths.len()),
            heap: BinaryHeap::with_capacity(paths.len()),
            pending: None,
        };
        for (idx, path) in paths.iter().enumerate() {
            let reader = BufReader::new(File::open(path)?);
            let mut run: RunReader = Box::new(serde_cbor::Deserializer::from_reader(reader).into_iter::<TermTriple>());
            if let Some(first) = run.next() {
                merger.heap.push(Reverse(HeapEntry { triple: first?, run: idx }));
            }
            merger.runs.push(run);
        }
        Ok(merger)
    }
}

impl Iterator for RunMerger {
    type Item = Result<TermTriple>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.heap.clear();
            return Some(Err(err.into()));
        }
        let Reverse(entry) = self.heap.pop()?;
        match self.runs[entry.run].next() {
            Some(Ok(triple)) => self.heap.push(Reverse(HeapEntry { triple, run: entry.run })),
            Some(Err(err)) => self.pending = Some(err),
            None => {}
        }
        Some(Ok(entry.triple))
    }
}

enum SortedInner {
    Memory(std::vec::IntoIter<TermTriple>),
    Merge(RunMerger),
}

/// Triples ascending by term.
/// Owns the spill directory until dropped.
pub struct SortedTriples {
    inner: SortedInner,
    _spill_dir: Option<TempDir>,
}

impl Iterator for SortedTriples {
    type Item = Result<TermTriple>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            SortedInner::Memory(iter) => iter.next().map(Ok),
            SortedInner::Merge(merger) => merger.next(),
        }
    }
}

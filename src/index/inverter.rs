use std::{collections::VecDeque, io::Write};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    config::EngineConfig,
    error::{ConceptError, Result},
    index::{
        external_sort::TermTriple,
        postings::{PostingsWriter, TermPosting},
    },
    utils::sort::rank_sort,
    vectorizer::concept_vec::ConceptId,
};

/// term groups pruned in parallel before being written in order
const GROUP_BATCH: usize = 1024;

/// PruneWindow
/// Sliding-window truncation state of one term's postings.
///
/// Weights are offered in descending order. The first `size` are always
/// admitted. After that a weight is admitted while the spread across the
/// window (oldest minus newest admitted weight) is larger than
/// `highest * threshold`; the first refusal ends the list.
#[derive(Debug, Clone)]
pub struct PruneWindow {
    window: VecDeque<f64>,
    size: usize,
    threshold: f64,
    highest: f64,
    emitted: usize,
}

impl PruneWindow {
    pub fn new(size: usize, threshold: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(size),
            size,
            threshold,
            highest: 0.0,
            emitted: 0,
        }
    }

    /// `true` if `weight` is kept, `false` means truncate here
    #[inline]
    pub fn admit(&mut self, weight: f64) -> bool {
        if self.emitted == 0 {
            self.highest = weight;
        }
        if self.emitted >= self.size {
            let (Some(&first), Some(&last)) = (self.window.front(), self.window.back()) else {
                return false;
            };
            if !(self.highest * self.threshold < first - last) {
                return false;
            }
            self.window.pop_front();
        }
        self.window.push_back(weight);
        self.emitted += 1;
        true
    }

    #[inline]
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// Postings of one term after pruning, descending by weight
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedPostings {
    pub term: Box<str>,
    pub postings: Vec<TermPosting>,
    /// postings cut by the window
    pub dropped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvertStats {
    pub terms_written: usize,
    pub terms_skipped: usize,
    pub postings_kept: usize,
    pub postings_pruned: usize,
}

/// PostingsInverter
/// Groups a term-sorted triple stream per term, ranks and prunes each group
/// and writes the result.
#[derive(Debug, Clone)]
pub struct PostingsInverter {
    window: usize,
    threshold: f64,
}

impl PostingsInverter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.prune_window,
            threshold: config.prune_threshold,
        }
    }

    /// Rank and prune one term's (concept -> weight) pairs.
    /// `None` for a term without postings.
    pub fn prune(&self, term: &str, pairs: &IndexMap<ConceptId, f64>) -> Option<PrunedPostings> {
        if pairs.is_empty() {
            warn!(term, "term group without postings, skipped");
            return None;
        }
        let mut ids: Vec<ConceptId> = pairs.keys().copied().collect();
        let mut weights: Vec<f64> = pairs.values().copied().collect();
        rank_sort(&mut weights, &mut ids);

        let mut window = PruneWindow::new(self.window, self.threshold);
        let mut postings = Vec::with_capacity(self.window.min(ids.len()));
        for (&concept, &weight) in ids.iter().zip(weights.iter()).rev() {
            if !window.admit(weight) {
                break;
            }
            postings.push(TermPosting::new(concept, weight as f32));
        }
        Some(PrunedPostings {
            term: Box::from(term),
            dropped: ids.len() - postings.len(),
            postings,
        })
    }

    /// Consume a stream sorted ascending by term and write one record per term.
    ///
    /// A later concept row for the same term replaces an earlier one.
    /// A stream that goes back to a smaller term fails with `UnsortedInput`.
    pub fn invert<I, W>(&self, triples: I, writer: &mut PostingsWriter<W>) -> Result<InvertStats>
    where
        I: IntoIterator<Item = Result<TermTriple>>,
        W: Write,
    {
        let mut stats = InvertStats::default();
        let mut batch: Vec<(Box<str>, IndexMap<ConceptId, f64>)> = Vec::with_capacity(GROUP_BATCH);
        let mut current: Option<(Box<str>, IndexMap<ConceptId, f64>)> = None;

        for triple in triples {
            let triple = triple?;
            if let Some((_, pairs)) = current.as_mut().filter(|(term, _)| *term == triple.term) {
                pairs.insert(triple.concept, triple.weight);
                continue;
            }
            if let Some((term, pairs)) = current.take() {
                if triple.term < term {
                    return Err(ConceptError::UnsortedInput {
                        previous: term.into(),
                        current: triple.term.into(),
                    });
                }
                batch.push((term, pairs));
                if batch.len() >= GROUP_BATCH {
                    self.flush(&mut batch, writer, &mut stats)?;
                }
            }
            let mut pairs = IndexMap::new();
            pairs.insert(triple.concept, triple.weight);
            current = Some((triple.term, pairs));
        }
        if let Some(group) = current.take() {
            batch.push(group);
        }
        self.flush(&mut batch, writer, &mut stats)?;

        info!(
            terms = stats.terms_written,
            skipped = stats.terms_skipped,
            kept = stats.postings_kept,
            pruned = stats.postings_pruned,
            "postings inverted"
        );
        Ok(stats)
    }

    fn flush<W: Write>(
        &self,
        batch: &mut Vec<(Box<str>, IndexMap<ConceptId, f64>)>,
        writer: &mut PostingsWriter<W>,
        stats: &mut InvertStats,
    ) -> Result<()> {
        let pruned: Vec<Option<PrunedPostings>> = batch
            .par_iter()
            .map(|(term, pairs)| self.prune(term, pairs))
            .collect();
        batch.clear();
        for group in pruned {
            let Some(group) = group else {
                stats.terms_skipped += 1;
                continue;
            };
            writer.write_term(&group.term, &group.postings)?;
            stats.terms_written += 1;
            stats.postings_kept += group.postings.len();
            stats.postings_pruned += group.dropped;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::postings::PostingsIndex;

    fn inverter() -> PostingsInverter {
        PostingsInverter::new(&EngineConfig::default())
    }

    fn pairs(weights: impl IntoIterator<Item = f64>) -> IndexMap<ConceptId, f64> {
        weights
            .into_iter()
            .enumerate()
            .map(|(i, w)| (i as ConceptId + 1, w))
            .collect()
    }

    #[test]
    fn window_admits_first_size_unconditionally() {
        let mut window = PruneWindow::new(3, 0.5);
        assert!(window.admit(1.0));
        assert!(window.admit(1.0));
        assert!(window.admit(1.0));
        // flat window, spread 0
        assert!(!window.admit(1.0));
        assert_eq!(window.emitted(), 3);
    }

    #[test]
    fn window_follows_the_spread() {
        let mut window = PruneWindow::new(2, 0.1);
        assert!(window.admit(1.0));
        assert!(window.admit(0.5));
        // spread 0.5 > 0.1
        assert!(window.admit(0.45));
        // window is now [0.5, 0.45], spread 0.05 <= 0.1
        assert!(!window.admit(0.44));
    }

    #[test]
    fn steady_decline_keeps_everything() {
        let group = pairs((0..150).map(|i| 1.0 - i as f64 * 0.001));
        let pruned = inverter().prune("t", &group).unwrap();
        assert_eq!(pruned.postings.len(), 150);
        assert_eq!(pruned.dropped, 0);
        for pair in pruned.postings.windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
        assert_eq!(pruned.postings[0].concept, 1);
    }

    #[test]
    fn collapsed_spread_truncates_after_window() {
        let group = pairs((0..150).map(|i| 0.5 - i as f64 * 1e-7));
        let pruned = inverter().prune("t", &group).unwrap();
        assert_eq!(pruned.postings.len(), 100);
        assert_eq!(pruned.dropped, 50);
        assert_eq!(pruned.postings[99].concept, 100);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut weights: Vec<f64> = (0..30).map(|i| i as f64 / 30.0).collect();
        weights.reverse();
        weights.swap(0, 17);
        let pruned = inverter().prune("t", &pairs(weights)).unwrap();
        assert_eq!(pruned.postings.len(), 30);
        for pair in pruned.postings.windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn empty_group_is_skipped() {
        assert!(inverter().prune("t", &IndexMap::new()).is_none());
    }

    #[test]
    fn invert_groups_and_writes_every_term() {
        let triples = vec![
            TermTriple::new("alpha", 1, 0.2),
            TermTriple::new("alpha", 2, 0.9),
            TermTriple::new("beta", 3, 0.4),
            TermTriple::new("gamma", 1, 0.1),
            TermTriple::new("gamma", 1, 0.3),
        ];
        let mut writer = PostingsWriter::new(Vec::new());
        let stats = inverter().invert(triples.into_iter().map(Ok), &mut writer).unwrap();
        assert_eq!(stats.terms_written, 3);
        assert_eq!(stats.postings_kept, 4);

        let bytes = writer.finish().unwrap();
        let index = PostingsIndex::read_from(bytes.as_slice()).unwrap();
        assert_eq!(index.get("alpha"), &[TermPosting::new(2, 0.9), TermPosting::new(1, 0.2)]);
        assert_eq!(index.get("beta"), &[TermPosting::new(3, 0.4)]);
        // later row for the same concept wins
        assert_eq!(index.get("gamma"), &[TermPosting::new(1, 0.3)]);
        let order: Vec<&str> = index.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn invert_rejects_unsorted_stream() {
        let triples = vec![
            TermTriple::new("beta", 1, 0.2),
            TermTriple::new("alpha", 2, 0.9),
        ];
        let mut writer = PostingsWriter::new(Vec::new());
        let err = inverter().invert(triples.into_iter().map(Ok), &mut writer).unwrap_err();
        assert!(matches!(err, ConceptError::UnsortedInput { .. }));
    }

    #[test]
    fn invert_handles_more_groups_than_one_batch() {
        let triples: Vec<TermTriple> = (0..GROUP_BATCH * 2 + 5)
            .map(|i| TermTriple::new(&format!("t{i:06}"), 1, 0.5))
            .collect();
        let mut writer = PostingsWriter::new(Vec::new());
        let stats = inverter().invert(triples.into_iter().map(Ok), &mut writer).unwrap();
        assert_eq!(stats.terms_written, GROUP_BATCH * 2 + 5);
        let index = PostingsIndex::read_from(writer.finish().unwrap().as_slice()).unwrap();
        assert_eq!(index.len(), GROUP_BATCH * 2 + 5);
        let terms: Vec<&str> = index.iter().map(|(t, _)| t).collect();
        let mut sorted = terms.clone();
        sorted.sort_unstable();
        assert_eq!(terms, sorted);
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// TermFrequency
/// Raw term counts of one text field (a title, a body, or a query).
///
/// # Examples
/// ```
/// use concept_space_vectorizer::TermFrequency;
/// let mut freq = TermFrequency::new();
/// freq.add_terms(&["rust", "ownership", "rust"]);
/// assert_eq!(freq.term_count("rust"), 2);
/// assert_eq!(freq.term_sum(), 3);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TermFrequency {
    #[serde(with = "indexmap::map::serde_seq")]
    term_count: IndexMap<Box<str>, u32>,
    total_term_count: u64,
}

impl TermFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `term`
    #[inline]
    pub fn add_term(&mut self, term: &str) -> &mut Self {
        let count = self.term_count.entry(Box::from(term)).or_insert(0);
        *count += 1;
        self.total_term_count += 1;
        self
    }

    #[inline]
    pub fn add_terms<T>(&mut self, terms: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for term in terms {
            self.add_term(term.as_ref());
        }
        self
    }

    /// Set the count of `term`.
    /// A count of 0 is kept as an entry; such records are rejected by
    /// `DocumentRecord::validate`.
    pub fn set_term_count(&mut self, term: &str, count: u32) -> &mut Self {
        if let Some(existing) = self.term_count.get_mut(term) {
            self.total_term_count = self.total_term_count - *existing as u64 + count as u64;
            *existing = count;
        } else {
            self.term_count.insert(Box::from(term), count);
            self.total_term_count += count as u64;
        }
        self
    }

    #[inline]
    pub fn term_count(&self, term: &str) -> u32 {
        self.term_count.get(term).copied().unwrap_or(0)
    }

    #[inline]
    pub fn contains_term(&self, term: &str) -> bool {
        self.term_count.contains_key(term)
    }

    /// (term, count) pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.term_count.iter().map(|(term, &count)| (term.as_ref(), count))
    }

    /// number of distinct terms
    #[inline]
    pub fn len(&self) -> usize {
        self.term_count.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.term_count.is_empty()
    }

    /// total number of occurrences
    #[inline]
    pub fn term_sum(&self) -> u64 {
        self.total_term_count
    }
}

/// Splits text into terms.
///
/// The segmentation algorithm is owned by the caller; the engine only
/// needs terms that match the ones used when the corpus was indexed.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn term_frequency(&self, text: &str) -> TermFrequency {
        let mut freq = TermFrequency::new();
        freq.add_terms(&self.tokenize(text));
        freq
    }
}

/// Lowercasing tokenizer splitting on anything that is not alphanumeric
#[derive(Debug, Clone)]
pub struct SimpleTokenizer {
    pub lowercase: bool,
    /// terms shorter than this (in chars) are dropped
    pub min_len: usize,
}

impl Default for SimpleTokenizer {
    fn default() -> Self {
        Self {
            lowercase: true,
            min_len: 1,
        }
    }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|term| term.chars().count() >= self.min_len.max(1))
            .map(|term| {
                if self.lowercase {
                    term.to_lowercase()
                } else {
                    term.to_string()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_sum() {
        let mut freq = TermFrequency::new();
        freq.add_terms(&["a", "b", "a"]).add_term("c");
        assert_eq!(freq.term_count("a"), 2);
        assert_eq!(freq.term_count("z"), 0);
        assert_eq!(freq.len(), 3);
        assert_eq!(freq.term_sum(), 4);
    }

    #[test]
    fn set_term_count_keeps_sum_consistent() {
        let mut freq = TermFrequency::new();
        freq.add_terms(&["a", "a", "b"]);
        freq.set_term_count("a", 5);
        assert_eq!(freq.term_sum(), 6);
        freq.set_term_count("a", 1);
        assert_eq!(freq.term_sum(), 2);
        freq.set_term_count("c", 0);
        assert!(freq.contains_term("c"));
        assert_eq!(freq.term_sum(), 2);
    }

    #[test]
    fn simple_tokenizer_splits_and_lowercases() {
        let tokenizer = SimpleTokenizer::default();
        assert_eq!(
            tokenizer.tokenize("Rust's borrow-checker, 2024!"),
            vec!["rust", "s", "borrow", "checker", "2024"]
        );
        let freq = SimpleTokenizer { lowercase: true, min_len: 2 }.term_frequency("A cat, a CAT");
        assert_eq!(freq.term_count("cat"), 2);
        assert!(!freq.contains_term("a"));
    }
}

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::info;

use crate::{
    config::EngineConfig,
    error::{ConceptError, Result},
    vectorizer::{corpus::CorpusIndex, tfidf::TFIDFEngine},
};

/// GlobalTermWeighter
/// Corpus-wide idf of every retained term.
///
/// The position of a term in the table is its dense index, so the
/// table doubles as the term -> integer mapping for binary encodings.
/// User overrides take precedence over the computed table on lookup
/// and are not persisted with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalTermWeighter {
    idf: IndexMap<Box<str>, f64>,
    overrides: IndexMap<Box<str>, f64>,
}

impl GlobalTermWeighter {
    /// Build the table from the corpus collaborator.
    ///
    /// A term is dropped when
    /// - it is made only of punctuation/symbol characters
    /// - it contains a tab or a line break (not representable in the weights file)
    /// - its document frequency is 0
    /// - its document frequency is `<= rare_term_doc_freq` and no title contains it
    pub fn build<E, C>(corpus: &C, config: &EngineConfig) -> Self
    where
        E: TFIDFEngine,
        C: CorpusIndex + ?Sized,
    {
        let doc_num = corpus.doc_num();
        let mut vocabulary = corpus.vocabulary();
        let vocabulary_len = vocabulary.len();
        // deterministic dense indices
        vocabulary.par_sort_unstable();

        let idf: Vec<Option<f64>> = vocabulary
            .par_iter()
            .map(|term| {
                if is_symbol_term(term) || term.contains(&['\t', '\n', '\r'][..]) {
                    return None;
                }
                let doc_freq = corpus.doc_freq(term);
                if doc_freq == 0 {
                    return None;
                }
                if doc_freq <= config.rare_term_doc_freq && !corpus.title_contains(term) {
                    return None;
                }
                Some(E::idf(doc_num, doc_freq))
            })
            .collect();

        let table: IndexMap<Box<str>, f64> = vocabulary
            .into_iter()
            .zip(idf)
            .filter_map(|(term, idf)| idf.map(|idf| (term, idf)))
            .collect();

        info!(
            doc_num,
            retained = table.len(),
            dropped = vocabulary_len - table.len(),
            "global term weights built"
        );
        let weighter = Self {
            idf: table,
            overrides: IndexMap::new(),
        };
        weighter.with_overrides(&config.term_weight_overrides)
    }

    /// Table from explicit (term, idf) pairs, in the given order
    pub fn from_pairs<I, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, f64)>,
        T: AsRef<str>,
    {
        Self {
            idf: pairs.into_iter().map(|(term, idf)| (Box::from(term.as_ref()), idf)).collect(),
            overrides: IndexMap::new(),
        }
    }

    /// Install user supplied idf values
    pub fn with_overrides(mut self, overrides: &IndexMap<String, f64>) -> Self {
        self.overrides = overrides
            .iter()
            .map(|(term, &idf)| (Box::from(term.as_str()), idf))
            .collect();
        self
    }

    /// idf of `term`, `None` when the term is not retained
    #[inline]
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.overrides.get(term).or_else(|| self.idf.get(term)).copied()
    }

    /// dense index of a retained term
    #[inline]
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.idf.get_index_of(term)
    }

    #[inline]
    pub fn term_at(&self, index: usize) -> Option<(&str, f64)> {
        self.idf.get_index(index).map(|(term, &idf)| (term.as_ref(), idf))
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.idf.contains_key(term) || self.overrides.contains_key(term)
    }

    /// number of retained terms (overrides excluded)
    #[inline]
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.idf.iter().map(|(term, &idf)| (term.as_ref(), idf))
    }

    /// One `term<TAB>idf` line per retained term, idf with 7 significant digits
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for (term, &idf) in self.idf.iter() {
            writeln!(writer, "{}\t{}", term, format_idf(idf))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse the text form written by `write_to`
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut idf = IndexMap::new();
        for (no, line) in reader.lines().enumerate() {
            let line_no = no + 1;
            let line = line.map_err(|e| ConceptError::Vocabulary {
                line: line_no,
                reason: e.to_string(),
            })?;
            if line.is_empty() {
                continue;
            }
            let (term, value) = line.split_once('\t').ok_or_else(|| ConceptError::Vocabulary {
                line: line_no,
                reason: "missing tab separator".into(),
            })?;
            if term.is_empty() {
                return Err(ConceptError::Vocabulary {
                    line: line_no,
                    reason: "empty term".into(),
                });
            }
            let value: f64 = value.trim_end().parse().map_err(|e| ConceptError::Vocabulary {
                line: line_no,
                reason: format!("bad idf {value:?}: {e}"),
            })?;
            if !value.is_finite() {
                return Err(ConceptError::Vocabulary {
                    line: line_no,
                    reason: format!("idf is not finite: {value}"),
                });
            }
            if idf.insert(Box::from(term), value).is_some() {
                return Err(ConceptError::Vocabulary {
                    line: line_no,
                    reason: format!("duplicate term {term:?}"),
                });
            }
        }
        Ok(Self {
            idf,
            overrides: IndexMap::new(),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| ConceptError::Vocabulary {
            line: 0,
            reason: format!("can not open {}: {e}", path.as_ref().display()),
        })?;
        Self::read_from(BufReader::new(file))
    }
}

/// `idf` rounded to 7 significant digits, positional notation
fn format_idf(idf: f64) -> String {
    let decimals = if idf == 0.0 || !idf.is_finite() {
        6
    } else {
        (6 - idf.abs().log10().floor() as i32).max(0) as usize
    };
    format!("{idf:.decimals$}")
}

/// Characters that never make a term on their own
#[inline]
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_punctuation()
        || c.is_whitespace()
        || matches!(
            c,
            '«' | '»' | '‘' | '’' | '“' | '”' | '–' | '—' | '…' | '·' | '•' | '§' | '¶' | '°' | '±'
                | '×' | '÷' | '¡' | '¿' | '。' | '、' | '「' | '」' | '『' | '』' | '・'
        )
}

/// true when every char is a symbol (and for the empty term)
#[inline]
pub fn is_symbol_term(term: &str) -> bool {
    term.chars().all(is_symbol_char)
}

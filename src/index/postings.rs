use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use ahash::RandomState;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{ConceptError, Result},
    vectorizer::concept_vec::{ConceptId, SparseConceptVector},
};

/// `term_byte_length` value closing the file
pub const SENTINEL: i32 = -1;
/// longest term accepted by the reader
const MAX_TERM_BYTES: i32 = 1 << 16;
/// int32 concept id + float32 weight
const POSTING_BYTES: usize = 8;

/// (concept, weight) attached to one term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermPosting {
    pub concept: ConceptId,
    pub weight: f32,
}

impl TermPosting {
    pub fn new(concept: ConceptId, weight: f32) -> Self {
        Self { concept, weight }
    }
}

/// `[int32 count][count x (int32 concept, float32 weight)]`, big endian
pub fn encode_payload(postings: &[TermPosting]) -> Result<Vec<u8>> {
    let count = i32::try_from(postings.len())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "too many postings for one term"))?;
    let mut buf = Vec::with_capacity(4 + postings.len() * POSTING_BYTES);
    buf.write_i32::<BigEndian>(count)?;
    for posting in postings {
        let concept = i32::try_from(posting.concept).map_err(|_| {
            io::Error::new(ErrorKind::InvalidInput, format!("concept id {} does not fit int32", posting.concept))
        })?;
        buf.write_i32::<BigEndian>(concept)?;
        buf.write_f32::<BigEndian>(posting.weight)?;
    }
    Ok(buf)
}

/// Inverse of `encode_payload`
pub fn decode_payload(term: &str, payload: &[u8]) -> Result<Vec<TermPosting>> {
    let corrupt = |reason: String| ConceptError::PostingsCorruption {
        term: term.to_string(),
        reason,
    };
    let mut reader = payload;
    let count = reader
        .read_i32::<BigEndian>()
        .map_err(|_| corrupt("payload shorter than its count field".into()))?;
    if count < 0 {
        return Err(corrupt(format!("negative posting count {count}")));
    }
    let expected = count as usize * POSTING_BYTES;
    if reader.len() != expected {
        return Err(corrupt(format!(
            "{count} postings need {expected} bytes, payload has {}",
            reader.len()
        )));
    }
    let mut postings = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let concept = reader.read_i32::<BigEndian>()?;
        let weight = reader.read_f32::<BigEndian>()?;
        if concept < 0 {
            return Err(corrupt(format!("negative concept id {concept}")));
        }
        if !weight.is_finite() {
            return Err(corrupt(format!("non finite weight for concept {concept}")));
        }
        postings.push(TermPosting::new(concept as ConceptId, weight));
    }
    Ok(postings)
}

/// Sequential writer of the pruned postings file
pub struct PostingsWriter<W: Write> {
    writer: W,
    terms: usize,
    postings: usize,
}

impl PostingsWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> PostingsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            terms: 0,
            postings: 0,
        }
    }

    /// `[int32 term_len][term][int32 payload_len][payload]`
    pub fn write_term(&mut self, term: &str, postings: &[TermPosting]) -> Result<()> {
        let term_len = i32::try_from(term.len())
            .ok()
            .filter(|len| *len <= MAX_TERM_BYTES)
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "term too long"))?;
        let payload = encode_payload(postings)?;
        self.writer.write_i32::<BigEndian>(term_len)?;
        self.writer.write_all(term.as_bytes())?;
        self.writer.write_i32::<BigEndian>(frame_len(payload.len(), "payload")?)?;
        self.writer.write_all(&payload)?;
        self.terms += 1;
        self.postings += postings.len();
        Ok(())
    }

    #[inline]
    pub fn terms_written(&self) -> usize {
        self.terms
    }

    #[inline]
    pub fn postings_written(&self) -> usize {
        self.postings
    }

    /// Write the sentinel and flush
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_i32::<BigEndian>(SENTINEL)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// PostingsIndex
/// Every term's postings loaded from a postings file, read-only.
///
/// A malformed record only affects its own term, which then has no postings.
/// A file cut short keeps every record read before the cut.
#[derive(Debug, Clone, Default)]
pub struct PostingsIndex {
    terms: IndexMap<Box<str>, Vec<TermPosting>>,
    corrupt_terms: usize,
    truncated: bool,
}

/// `Ok(None)` on a clean end of input
/// int32 length prefix, refused when `len` does not fit
fn frame_len(len: usize, what: &str) -> io::Result<i32> {
    i32::try_from(len).map_err(|_| {
        io::Error::new(ErrorKind::InvalidInput, format!("{what} of {len} bytes does not fit an int32 frame"))
    })
}

fn or_eof<T>(res: io::Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// read exactly `len` bytes without trusting `len` for the allocation
fn read_bytes<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(io::Error::new(ErrorKind::UnexpectedEof, "record cut short"));
    }
    Ok(buf)
}

impl PostingsIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut index = Self::default();
        loop {
            let Some(term_len) = or_eof(reader.read_i32::<BigEndian>())? else {
                warn!("postings file ends without sentinel");
                index.truncated = true;
                break;
            };
            if term_len == SENTINEL {
                break;
            }
            if !(0..=MAX_TERM_BYTES).contains(&term_len) {
                warn!(term_len, "invalid term length, record framing lost");
                index.truncated = true;
                break;
            }
            let Some(term_bytes) = or_eof(read_bytes(&mut reader, term_len as usize))? else {
                warn!("postings file cut inside a term");
                index.truncated = true;
                break;
            };
            let term = match String::from_utf8(term_bytes) {
                Ok(term) => Some(term),
                Err(e) => {
                    warn!(error = %e, "term is not valid utf-8");
                    None
                }
            };
            let term_name = term.clone().unwrap_or_default();

            let payload_len = or_eof(reader.read_i32::<BigEndian>())?;
            let payload = match payload_len {
                Some(len) if len >= 0 => or_eof(read_bytes(&mut reader, len as usize))?,
                Some(len) => {
                    warn!(term = %term_name, payload_len = len, "negative payload length, record framing lost");
                    None
                }
                None => None,
            };
            let Some(payload) = payload else {
                // the record itself is lost, later records can not be located
                index.mark_corrupt(term);
                index.truncated = true;
                break;
            };

            let Some(term) = term else {
                index.corrupt_terms += 1;
                continue;
            };
            match decode_payload(&term, &payload) {
                Ok(postings) => {
                    index.terms.insert(term.into_boxed_str(), postings);
                }
                Err(e) => {
                    warn!(error = %e, "dropping postings");
                    index.mark_corrupt(Some(term));
                }
            }
        }
        Ok(index)
    }

    fn mark_corrupt(&mut self, term: Option<String>) {
        self.corrupt_terms += 1;
        if let Some(term) = term {
            self.terms.insert(term.into_boxed_str(), Vec::new());
        }
    }

    /// postings of `term`, empty when unknown or corrupt
    #[inline]
    pub fn get(&self, term: &str) -> &[TermPosting] {
        self.terms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn contains_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// postings of `term` as a concept vector over a universe of `size`
    pub fn concept_vector(&self, term: &str, size: usize) -> SparseConceptVector {
        let mut vec = SparseConceptVector::new(size);
        for posting in self.get(term) {
            vec.add(posting.concept, posting.weight as f64);
        }
        vec
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TermPosting])> + '_ {
        self.terms.iter().map(|(term, postings)| (term.as_ref(), postings.as_slice()))
    }

    /// number of terms (corrupt ones included)
    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// number of records that could not be decoded
    #[inline]
    pub fn corrupt_terms(&self) -> usize {
        self.corrupt_terms
    }

    /// whether the input ended before the sentinel
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// distinct concepts referenced by any posting
    pub fn concept_num(&self) -> usize {
        let mut seen: HashSet<ConceptId, RandomState> = HashSet::with_hasher(RandomState::new());
        for postings in self.terms.values() {
            seen.extend(postings.iter().map(|p| p.concept));
        }
        seen.len()
    }
}

use std::fmt::{self, Debug, Display};

use crate::vectorizer::concept_vec::{ConceptId, SparseConceptVector};

impl SparseConceptVector {
    /// Σ(a_i * b_i) over the ids present in both vectors
    pub fn dot(&self, other: &SparseConceptVector) -> f64 {
        // probe the larger one
        let (small, large) = if self.count() <= other.count() { (self, other) } else { (other, self) };
        small.iter().map(|(id, weight)| weight * large.get(id)).sum()
    }

    /// Relatedness of two concept vectors.
    /// cos(θ) = Σ(a_i * b_i) / (||a|| * ||b||), 0.0 when either norm is 0
    pub fn cosine_similarity(&self, other: &SparseConceptVector) -> f64 {
        let norm_a = self.norm2();
        let norm_b = other.norm2();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        self.dot(other) / (norm_a * norm_b)
    }
}

/// Top concepts of a concept vector
pub struct ConceptHits {
    /// (concept id, weight)
    pub list: Vec<(ConceptId, f64)>,
}

impl ConceptHits {
    pub fn new(list: Vec<(ConceptId, f64)>) -> Self {
        Self { list }
    }

    /// The `k` heaviest concepts of `vector`, descending
    pub fn top_k(vector: &SparseConceptVector, k: usize) -> Self {
        Self {
            list: vector.ordered_iter().take(k).collect(),
        }
    }

    /// Sort results by descending score
    pub fn sort_by_score_desc(&mut self) -> &mut Self {
        self.list.retain(|(_, s)| !s.is_nan());
        self.list.sort_by(|a, b| b.1.total_cmp(&a.1));
        self
    }

    /// Sort results by ascending score
    pub fn sort_by_score_asc(&mut self) -> &mut Self {
        self.list.retain(|(_, s)| !s.is_nan());
        self.list.sort_by(|a, b| a.1.total_cmp(&b.1));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Debug for ConceptHits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // one hit per line
            writeln!(f, "ConceptHits [")?;
            for (concept, score) in &self.list {
                writeln!(f, "    {}: {:.6}", concept, score)?;
            }
            write!(f, "]")
        } else {
            f.debug_list().entries(&self.list).finish()
        }
    }
}

impl Display for ConceptHits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, (concept, score)) in self.list.iter().enumerate() {
            writeln!(f, "{:>4}. concept {} ({:.6})", rank + 1, concept, score)?;
        }
        Ok(())
    }
}

use indexmap::IndexMap;

use crate::utils::sort::rank_sort;

/// Identifier of one member of the concept universe
pub type ConceptId = u32;

/// SparseConceptVector
/// concept id -> weight, zero weights are never stored
///
/// `size()` is the declared cardinality of the concept universe,
/// `count()` is the number of stored (non-zero) entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseConceptVector {
    weights: IndexMap<ConceptId, f64>,
    size: usize,
}

impl SparseConceptVector {
    /// Create an empty vector over a universe of `size` concepts
    pub fn new(size: usize) -> Self {
        Self {
            weights: IndexMap::new(),
            size,
        }
    }

    /// Create a vector seeded with one entry
    pub fn with_entry(size: usize, id: ConceptId, weight: f64) -> Self {
        let mut vec = Self::new(size);
        vec.set(id, weight);
        vec
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// weight of `id`, 0.0 when absent
    #[inline]
    pub fn get(&self, id: ConceptId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(0.0)
    }

    /// `weight[id] += delta`
    #[inline]
    pub fn add(&mut self, id: ConceptId, delta: f64) -> &mut Self {
        let value = self.get(id) + delta;
        self.set(id, value)
    }

    /// Overwrite `weight[id]`, removing the entry when `value == 0`
    #[inline]
    pub fn set(&mut self, id: ConceptId, value: f64) -> &mut Self {
        if value == 0.0 {
            self.weights.swap_remove(&id);
        } else {
            self.weights.insert(id, value);
        }
        self
    }

    /// Add every entry of `other` into self
    pub fn add_vector(&mut self, other: &SparseConceptVector) -> &mut Self {
        self.add_scaled(other, 1.0)
    }

    /// Add every entry of `other`, multiplied by `scale`, into self
    pub fn add_scaled(&mut self, other: &SparseConceptVector, scale: f64) -> &mut Self {
        for (&id, &weight) in other.weights.iter() {
            self.add(id, weight * scale);
        }
        self
    }

    /// Exponential blend with `other`.
    ///
    /// For every `(id, v2)` in `other`: `self[id] = v2 * proportion + self[id] * (1 - proportion)`.
    /// Ids only present in self are left as they are.
    pub fn merge(&mut self, other: &SparseConceptVector, proportion: f64) -> &mut Self {
        for (&id, &v2) in other.weights.iter() {
            let v1 = self.get(id);
            self.set(id, v2 * proportion + v1 * (1.0 - proportion));
        }
        self
    }

    /// Sum of weights (signed)
    pub fn norm1(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Euclidean norm
    pub fn norm2(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// (id, weight) pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (ConceptId, f64)> + '_ {
        self.weights.iter().map(|(&id, &weight)| (id, weight))
    }

    /// (id, weight) pairs by descending weight
    pub fn ordered_iter(&self) -> OrderedIter {
        let mut ids: Vec<ConceptId> = Vec::with_capacity(self.count());
        let mut weights: Vec<f64> = Vec::with_capacity(self.count());
        for (&id, &weight) in self.weights.iter() {
            ids.push(id);
            weights.push(weight);
        }
        rank_sort(&mut weights, &mut ids);
        OrderedIter {
            pos: ids.len(),
            ids,
            weights,
        }
    }
}

impl FromIterator<(ConceptId, f64)> for SparseConceptVector {
    /// Collect pairs with `add`; the universe size is taken as `max id + 1`
    fn from_iter<T: IntoIterator<Item = (ConceptId, f64)>>(iter: T) -> Self {
        let mut vec = SparseConceptVector::new(0);
        for (id, weight) in iter {
            vec.size = vec.size.max(id as usize + 1);
            vec.add(id, weight);
        }
        vec
    }
}

/// Descending iterator over an ascending-sorted snapshot.
/// Walks the arrays from the tail.
#[derive(Debug, Clone)]
pub struct OrderedIter {
    ids: Vec<ConceptId>,
    weights: Vec<f64>,
    pos: usize,
}

impl Iterator for OrderedIter {
    type Item = (ConceptId, f64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        Some((self.ids[self.pos], self.weights[self.pos]))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pos, Some(self.pos))
    }
}

impl ExactSizeIterator for OrderedIter {}

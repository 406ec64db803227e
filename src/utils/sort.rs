use num::Float;

/// Heap sort for SoA (keys/payload), ascending by `keys`.
/// - Sorts `keys` ascending, in place
/// - Reorders `payload` with the same permutation
/// - Ties are not kept in input order
///
/// Complexity: O(n log n), no scratch allocation
#[inline]
pub fn rank_sort<N, P>(keys: &mut [N], payload: &mut [P])
where
    N: Float,
{
    assert_eq!(keys.len(), payload.len());
    let n = keys.len();
    if n <= 1 {
        return;
    }

    // Small sizes: insertion sort beats building a heap.
    if n <= 16 {
        insertion_sort_soa(keys, payload);
        return;
    }

    // heapify (max-heap)
    for root in (0..n / 2).rev() {
        sift_down(keys, payload, root, n);
    }

    // move the max to the tail, shrink the heap
    for end in (1..n).rev() {
        keys.swap(0, end);
        payload.swap(0, end);
        sift_down(keys, payload, 0, end);
    }
}

#[inline(always)]
fn sift_down<N: Float, P>(keys: &mut [N], payload: &mut [P], mut root: usize, end: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            break;
        }
        if child + 1 < end && keys[child] < keys[child + 1] {
            child += 1;
        }
        if keys[root] < keys[child] {
            keys.swap(root, child);
            payload.swap(root, child);
            root = child;
        } else {
            break;
        }
    }
}

/// Tiny insertion sort for small n (SoA).
#[inline(always)]
fn insertion_sort_soa<N: Float, P>(keys: &mut [N], payload: &mut [P]) {
    let n = keys.len();
    for i in 1..n {
        let mut j = i;
        while j > 0 && keys[j] < keys[j - 1] {
            keys.swap(j, j - 1);
            payload.swap(j, j - 1);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sorted(keys: &[f64]) {
        for i in 1..keys.len() {
            assert!(keys[i - 1] <= keys[i], "not sorted at {i}: {} > {}", keys[i - 1], keys[i]);
        }
    }

    /// every payload must still point at its original key
    fn assert_pairing(original: &[f64], keys: &[f64], payload: &[usize]) {
        for (k, &p) in keys.iter().zip(payload) {
            assert_eq!(*k, original[p], "payload {p} lost its key");
        }
        let mut seen = payload.to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..original.len()).collect::<Vec<_>>());
    }

    /// tiny deterministic PRNG (xorshift32)
    struct Rng(u32);
    impl Rng {
        fn new(seed: u32) -> Self {
            Self(seed)
        }
        fn next_u32(&mut self) -> u32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            x
        }
    }

    #[test]
    fn rank_sort_handles_empty_and_single() {
        let mut keys: Vec<f64> = vec![];
        let mut payload: Vec<u32> = vec![];
        rank_sort(&mut keys, &mut payload);
        assert!(keys.is_empty());
        assert!(payload.is_empty());

        let mut keys = vec![0.25f64];
        let mut payload = vec![7u32];
        rank_sort(&mut keys, &mut payload);
        assert_eq!(keys, vec![0.25]);
        assert_eq!(payload, vec![7]);
    }

    #[test]
    fn rank_sort_keeps_pairing_with_duplicates() {
        let original = vec![0.3f64, 0.1, 0.3, 0.2, 0.1, 0.3, 0.0];
        let mut keys = original.clone();
        let mut payload: Vec<usize> = (0..keys.len()).collect();

        rank_sort(&mut keys, &mut payload);

        assert_sorted(&keys);
        assert_pairing(&original, &keys, &payload);
    }

    #[test]
    fn rank_sort_matches_baseline_many_sizes() {
        let mut rng = Rng::new(0x1234_5678);

        for &n in &[0usize, 1, 2, 3, 7, 15, 16, 17, 31, 64, 127, 128, 129, 1024] {
            let mut keys = Vec::with_capacity(n);
            for _ in 0..n {
                // coarse buckets make ties likely
                keys.push((rng.next_u32() % 97) as f64 / 97.0);
            }
            let original = keys.clone();
            let mut payload: Vec<usize> = (0..n).collect();

            let mut baseline = original.clone();
            baseline.sort_by(|a, b| a.total_cmp(b));

            rank_sort(&mut keys, &mut payload);

            assert_sorted(&keys);
            assert_eq!(keys, baseline, "keys mismatch at n={n}");
            assert_pairing(&original, &keys, &payload);
        }
    }

    #[test]
    fn rank_sort_works_on_f32_keys() {
        let original = vec![0.5f32, -1.0, 3.0, 0.0, f32::MAX, f32::MIN, 0.5];
        let mut keys = original.clone();
        let mut payload: Vec<usize> = (0..keys.len()).collect();
        rank_sort(&mut keys, &mut payload);
        for i in 1..keys.len() {
            assert!(keys[i - 1] <= keys[i]);
        }
        for (k, &p) in keys.iter().zip(&payload) {
            assert_eq!(*k, original[p]);
        }
    }
}

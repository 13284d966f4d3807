//! Disjoint-set over global instance labels with path compression.
//!
//! The representative of a class is always its numerically smallest label,
//! so the resolved labels depend only on the set of unions applied, never
//! on their order. Label 0 is outside every class.

use std::sync::Mutex;

use serde::Serialize;

use crate::types::{Label, NOISE_LABEL};

/// Request to merge the classes of two global labels. Normalised so `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnionRequest {
    pub a: Label,
    pub b: Label,
}

impl UnionRequest {
    /// `None` when either side is noise or both sides are the same label.
    #[inline]
    pub fn new(a: Label, b: Label) -> Option<Self> {
        if a == NOISE_LABEL || b == NOISE_LABEL || a == b {
            return None;
        }
        Some(if a < b { Self { a, b } } else { Self { a: b, b: a } })
    }
}

#[derive(Debug, Clone)]
pub struct LabelUnifier {
    parent: Vec<Label>,
}

impl LabelUnifier {
    /// Singleton classes for every label in `1..=max_label`.
    pub fn new(max_label: Label) -> Self {
        let n = max_label as usize + 1;
        let mut parent = Vec::with_capacity(n);
        for i in 0..n {
            parent.push(i as Label);
        }
        Self { parent }
    }

    #[inline]
    pub fn max_label(&self) -> Label {
        (self.parent.len() - 1) as Label
    }

    /// Canonical label of `x`. Labels outside `0..=max_label` are their own class.
    pub fn find(&mut self, x: Label) -> Label {
        let idx = x as usize;
        if idx >= self.parent.len() {
            return x;
        }

        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Merge the classes of `a` and `b`, keeping the smaller root.
    /// Returns `true` if they were in different classes. No-op for label 0.
    pub fn union(&mut self, a: Label, b: Label) -> bool {
        if a == NOISE_LABEL || b == NOISE_LABEL {
            return false;
        }
        debug_assert!(a <= self.max_label() && b <= self.max_label());
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (min, max) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[max as usize] = min;
        true
    }

    /// Apply every request in order. Returns the number of merges performed.
    pub fn apply(&mut self, requests: &[UnionRequest]) -> usize {
        requests.iter().filter(|r| self.union(r.a, r.b)).count()
    }

    /// Fully compressed lookup table: `table[x] == find(x)` for `x` in `0..=max_label`.
    pub fn resolve_all(&mut self) -> Vec<Label> {
        (0..self.parent.len()).map(|x| self.find(x as Label)).collect()
    }

    /// Number of classes among labels `1..=max_label`.
    pub fn num_classes(&mut self) -> usize {
        (1..self.parent.len())
            .filter(|&x| self.find(x as Label) == x as Label)
            .count()
    }
}

/// Lock-guarded unifier for applying unions from several threads.
///
/// Resolves to the same classes as sequential application of the same requests.
#[derive(Debug)]
pub struct SharedUnifier {
    inner: Mutex<LabelUnifier>,
}

impl SharedUnifier {
    pub fn new(max_label: Label) -> Self {
        Self {
            inner: Mutex::new(LabelUnifier::new(max_label)),
        }
    }

    pub fn union(&self, a: Label, b: Label) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.union(a, b)
    }

    pub fn find(&self, x: Label) -> Label {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.find(x)
    }

    pub fn into_inner(self) -> LabelUnifier {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_union_request_normalised() {
        assert_eq!(UnionRequest::new(9, 4), Some(UnionRequest { a: 4, b: 9 }));
        assert_eq!(UnionRequest::new(0, 4), None);
        assert_eq!(UnionRequest::new(4, 0), None);
        assert_eq!(UnionRequest::new(4, 4), None);
    }

    #[test]
    fn test_union_keeps_min() {
        let mut uf = LabelUnifier::new(10);
        assert!(uf.union(7, 3));
        assert!(uf.union(9, 7));
        assert!(!uf.union(3, 9));
        assert_eq!(uf.find(9), 3);
        assert_eq!(uf.find(7), 3);
        assert_eq!(uf.find(5), 5);
        assert_eq!(uf.num_classes(), 8);
    }

    #[test]
    fn test_noise_never_unioned() {
        let mut uf = LabelUnifier::new(4);
        assert!(!uf.union(0, 3));
        assert!(!uf.union(2, 0));
        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(3), 3);
        assert_eq!(uf.num_classes(), 4);
    }

    #[test]
    fn test_find_idempotent() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut uf = LabelUnifier::new(200);
        for _ in 0..150 {
            let a = rng.gen_range(0..=200);
            let b = rng.gen_range(0..=200);
            uf.union(a, b);
        }
        for x in 0..=200 {
            let r = uf.find(x);
            assert_eq!(uf.find(r), r);
            assert!(r <= x);
        }
    }

    #[test]
    fn test_out_of_range_is_singleton() {
        let mut uf = LabelUnifier::new(3);
        assert_eq!(uf.find(42), 42);
    }

    #[test]
    fn test_order_independent() {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let mut requests: Vec<UnionRequest> = (0..300)
            .filter_map(|_| UnionRequest::new(rng.gen_range(0..=500), rng.gen_range(0..=500)))
            .collect();

        let mut reference = LabelUnifier::new(500);
        reference.apply(&requests);
        let expected = reference.resolve_all();

        for _ in 0..10 {
            requests.shuffle(&mut rng);
            let mut uf = LabelUnifier::new(500);
            uf.apply(&requests);
            assert_eq!(uf.resolve_all(), expected);
        }
    }

    #[test]
    fn test_long_chain_resolves() {
        let n = 100_000;
        let mut uf = LabelUnifier::new(n);
        for x in (2..=n).rev() {
            uf.union(x, x - 1);
        }
        assert_eq!(uf.find(n), 1);
        assert_eq!(uf.num_classes(), 1);
    }

    #[test]
    fn test_shared_matches_sequential() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let requests: Vec<UnionRequest> = (0..400)
            .filter_map(|_| UnionRequest::new(rng.gen_range(0..=300), rng.gen_range(0..=300)))
            .collect();

        let mut sequential = LabelUnifier::new(300);
        sequential.apply(&requests);

        let shared = SharedUnifier::new(300);
        std::thread::scope(|s| {
            for part in requests.chunks(50) {
                let shared = &shared;
                s.spawn(move || {
                    for r in part {
                        shared.union(r.a, r.b);
                    }
                });
            }
        });
        assert_eq!(shared.find(0), 0);

        let mut concurrent = shared.into_inner();
        assert_eq!(concurrent.resolve_all(), sequential.resolve_all());
    }
}

//! Union-Find (disjoint set) data structure for grouping.
//!
//! Used by the deduplication engine to build connected components of
//! duplicate-candidate gates from pairwise matches.

use std::collections::HashMap;
use std::hash::Hash;

/// Union-Find with path compression and union by rank.
#[derive(Debug, Clone, Default)]
pub struct UnionFind<T: Eq + Hash + Clone> {
    parent: HashMap<T, T>,
    rank: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> UnionFind<T> {
    /// Create a new empty Union-Find.
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }

    /// Create a Union-Find with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: HashMap::with_capacity(capacity),
            rank: HashMap::with_capacity(capacity),
        }
    }

    /// Add a new element as its own singleton set.
    ///
    /// No-op if the element is already present.
    pub fn make_set(&mut self, item: T) {
        if !self.parent.contains_key(&item) {
            self.parent.insert(item.clone(), item.clone());
            self.rank.insert(item, 0);
        }
    }

    /// Find the root representative of an element's set.
    ///
    /// Applies path compression. Elements not added via `make_set` are
    /// treated as singletons and added implicitly.
    pub fn find(&mut self, item: &T) -> T {
        if !self.parent.contains_key(item) {
            self.make_set(item.clone());
            return item.clone();
        }

        // Walk to the root
        let mut root = item.clone();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }

        // Path compression: point every node on the path at the root
        let mut current = item.clone();
        while current != root {
            let next = self.parent[&current].clone();
            self.parent.insert(current, root.clone());
            current = next;
        }

        root
    }

    /// Merge the sets containing two elements.
    pub fn union(&mut self, a: &T, b: &T) {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            return;
        }

        let rank_a = self.rank[&root_a];
        let rank_b = self.rank[&root_b];

        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b, root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }
    }

    /// Check whether two elements are in the same set.
    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    /// Number of tracked elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Check if the structure is empty.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

impl<T: Eq + Hash + Clone + Ord> UnionFind<T> {
    /// Extract all sets as a map from a deterministic representative
    /// (the smallest member) to the sorted set members.
    ///
    /// Sorting makes output independent of HashMap iteration order.
    pub fn groups(&mut self) -> HashMap<T, Vec<T>> {
        let items: Vec<T> = self.parent.keys().cloned().collect();

        let mut by_root: HashMap<T, Vec<T>> = HashMap::new();
        for item in items {
            let root = self.find(&item);
            by_root.entry(root).or_default().push(item);
        }

        by_root
            .into_values()
            .map(|mut members| {
                members.sort();
                (members[0].clone(), members)
            })
            .collect()
    }
}

//! Protected-Node Guard: decides which nodes must stay individually
//! addressable, and finds the protected nodes hidden inside a subtree.

use std::collections::{BTreeSet, HashSet};

use crate::diagnostics::{Diagnostics, ReferenceSource};
use crate::inputs::WeightMap;
use crate::store::GraphStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreciousSet {
    ids: BTreeSet<String>,
}

impl PreciousSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Designated ids, plus every id with non-zero own weight when
    /// `include_weighted` is set.
    pub fn build(designated: &[String], weights: &WeightMap, include_weighted: bool) -> Self {
        let mut ids: BTreeSet<String> = designated.iter().cloned().collect();
        if include_weighted {
            ids.extend(
                weights
                    .iter()
                    .filter(|(_, w)| **w > 0)
                    .map(|(id, _)| id.clone()),
            );
        }
        Self { ids }
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    /// Set the `precious` flag on every member present in the store.
    ///
    /// Members the store lacks are reported once, as precious-list
    /// references, unless they only came from the weight table.
    pub fn mark(&self, store: &mut GraphStore, designated: &[String], diagnostics: &mut Diagnostics) {
        for id in &self.ids {
            match store.node_mut(id) {
                Some(node) => node.precious = true,
                None if designated.contains(id) => {
                    diagnostics.missing(ReferenceSource::Precious, id.clone())
                }
                None => {}
            }
        }
    }

    /// Protected descendants of `node` that have no protected ancestor
    /// strictly between themselves and `node`.
    ///
    /// Nested protected nodes travel with their protected ancestor, so only
    /// the outermost ones need an explicit placement. Sorted.
    pub fn topmost_descendants(&self, store: &GraphStore, node: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<String> = store.children(node).into_iter().rev().collect();
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if self.contains(&current) {
                out.push(current);
                continue;
            }
            stack.extend(store.children(&current).into_iter().rev());
        }
        out.sort();
        out
    }
}

impl FromIterator<String> for PreciousSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

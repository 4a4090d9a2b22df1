//! Weight Propagator: cumulative subtree weights from own (leaf) weights.
//!
//! Must be re-run after every pass that changes edges; the passes never
//! patch a cumulative map incrementally.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics, ReferenceSource};
use crate::error::Result;
use crate::inputs::WeightMap;
use crate::store::GraphStore;

/// `node → own weight + all descendants' own weights`, for every node in
/// the store at the time it was computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CumulativeWeights {
    totals: HashMap<String, u64>,
}

impl CumulativeWeights {
    /// Cumulative weight of `id`; 0 for unknown nodes.
    pub fn get(&self, id: &str) -> u64 {
        self.totals.get(id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// `(id, cumulative)` pairs sorted by id.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut out: Vec<(&str, u64)> = self.totals.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        out.sort();
        out
    }

    /// Write an `id<TAB>cumulative` table with a header row, sorted by id.
    pub fn write_table<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        wtr.write_record(["id", "cumulative"])?;
        for (id, total) in self.sorted() {
            wtr.write_record([id, total.to_string().as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// `cumulative(child) / cumulative(parent)`, or `None` when the parent
    /// has no weight.
    pub fn share(&self, child: &str, parent: &str) -> Option<f64> {
        let parent_total = self.get(parent);
        if parent_total == 0 {
            return None;
        }
        Some(self.get(child) as f64 / parent_total as f64)
    }
}

/// Compute cumulative weights over the current edge set.
///
/// Each node's own weight is added to itself and to every ancestor up to a
/// parentless node. Weighted ids absent from the store are reported as
/// missing references and contribute nothing.
pub fn propagate(
    store: &GraphStore,
    weights: &WeightMap,
    diagnostics: &mut Diagnostics,
) -> CumulativeWeights {
    let mut totals: HashMap<String, u64> =
        store.node_ids().into_iter().map(|id| (id, 0)).collect();

    let mut missing: Vec<&String> = weights.keys().filter(|id| !store.contains(id)).collect();
    missing.sort();
    for id in missing {
        diagnostics.missing(ReferenceSource::Weights, id.clone());
    }

    let mut cycles: HashSet<String> = HashSet::new();
    for (id, &own) in weights {
        if own == 0 || !store.contains(id) {
            continue;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = id.as_str();
        loop {
            *totals.entry(current.to_string()).or_insert(0) += own;
            seen.insert(current);
            match store.parent(current) {
                None => break,
                Some(parent) if parent == current => break,
                Some(parent) if seen.contains(parent) => {
                    cycles.insert(parent.to_string());
                    break;
                }
                Some(parent) => current = parent,
            }
        }
    }

    let mut cycles: Vec<String> = cycles.into_iter().collect();
    cycles.sort();
    for id in cycles {
        diagnostics.push(Diagnostic::Cycle { id });
    }

    debug!("propagated {} weighted nodes over {} nodes", weights.len(), totals.len());
    CumulativeWeights { totals }
}

/// Pairs `(parent, child)` breaking `cumulative(parent) ≥ cumulative(child)`.
pub fn monotonicity_violations(
    store: &GraphStore,
    cumulative: &CumulativeWeights,
) -> Vec<(String, String)> {
    store
        .edges()
        .into_iter()
        .filter(|(child, parent)| cumulative.get(parent) < cumulative.get(child))
        .map(|(child, parent)| (parent, child))
        .collect()
}

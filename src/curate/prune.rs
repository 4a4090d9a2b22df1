//! Dead-Branch Pruner and the final aggregate cleanup.

use std::collections::HashSet;

use tracing::{debug, info};

use super::guard::PreciousSet;
use super::weights::CumulativeWeights;
use super::{Move, relocate};
use crate::store::GraphStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Top node of every zero-weight run sent to the global bucket.
    pub pruned: Vec<String>,
    pub moves: Vec<Move>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Aggregates folded back into their parent.
    pub dissolved: Vec<String>,
    /// Aggregates deleted because nothing was left in them.
    pub removed: Vec<String>,
    pub moves: Vec<Move>,
}

pub struct Pruner<'a> {
    pub cumulative: &'a CumulativeWeights,
    pub precious: &'a PreciousSet,
    pub root: &'a str,
    pub global_other: &'a str,
}

impl<'a> Pruner<'a> {
    fn is_stop(&self, store: &GraphStore, id: &str) -> bool {
        id == self.root || store.is_manual_top_level(id) || store.is_synthetic_other(id)
    }

    fn is_dead(&self, id: &str) -> bool {
        !self.precious.contains(id) && self.cumulative.get(id) == 0
    }

    /// Move every run of zero-weight, unprotected nodes ending in a leaf to
    /// the global bucket, in one move per run.
    pub fn prune(&self, store: &mut GraphStore) -> PruneOutcome {
        let mut outcome = PruneOutcome::default();
        let mut tops: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for leaf in store.leaves() {
            if self.is_stop(store, &leaf) || !self.is_dead(&leaf) {
                continue;
            }
            let mut top = leaf;
            while let Some(parent) = store.parent(&top) {
                if parent == top || self.is_stop(store, parent) || !self.is_dead(parent) {
                    break;
                }
                top = parent.to_string();
            }
            if seen.insert(top.clone()) {
                tops.push(top);
            }
        }

        for top in tops {
            if store.parent(&top) == Some(self.global_other) {
                continue;
            }
            relocate(store, &top, self.global_other, &mut outcome.moves);
            outcome.pruned.push(top);
        }
        info!("pruned {} dead branches", outcome.pruned.len());
        outcome
    }

    /// Tidy every aggregate except the global bucket.
    ///
    /// Protected content buried inside an aggregate's children is lifted to
    /// be a direct child; a child left without weight goes to the global
    /// bucket. An aggregate that is its parent's only child, or that holds
    /// a single child, is folded into the parent. Empty aggregates are
    /// deleted. Protected aggregates are left alone.
    pub fn cleanup(&self, store: &mut GraphStore) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();
        let aggregates: Vec<String> = store
            .node_ids()
            .into_iter()
            .filter(|id| {
                store.is_synthetic_other(id) && id != self.global_other && !self.precious.contains(id)
            })
            .collect();

        for aggregate in aggregates {
            self.flatten(store, &aggregate, &mut outcome.moves);

            let children = store.children(&aggregate);
            if children.is_empty() {
                debug!("removing empty aggregate {}", aggregate);
                store.remove_node(&aggregate);
                outcome.removed.push(aggregate);
                continue;
            }
            let Some(parent) = store.parent(&aggregate).map(str::to_string) else {
                continue;
            };
            if children.len() == 1 || store.child_count(&parent) == 1 {
                for child in &children {
                    relocate(store, child, &parent, &mut outcome.moves);
                }
                debug!("folded aggregate {} into {}", aggregate, parent);
                store.remove_node(&aggregate);
                outcome.dissolved.push(aggregate);
            }
        }
        info!(
            "cleanup folded {} aggregates and removed {} empty ones",
            outcome.dissolved.len(),
            outcome.removed.len()
        );
        outcome
    }

    fn flatten(&self, store: &mut GraphStore, aggregate: &str, moves: &mut Vec<Move>) {
        for child in store.children(aggregate) {
            if self.precious.contains(&child) || store.is_synthetic_other(&child) {
                continue;
            }
            let rescued = self.precious.topmost_descendants(store, &child);
            if rescued.is_empty() {
                continue;
            }
            let rescued_weight: u64 = rescued.iter().map(|r| self.cumulative.get(r)).sum();
            for r in &rescued {
                relocate(store, r, aggregate, moves);
            }
            if rescued_weight >= self.cumulative.get(&child) {
                relocate(store, &child, self.global_other, moves);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

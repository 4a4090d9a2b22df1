//! Chain Collapser: merges runs of ancestors that add no information.
//!
//! A walk starts at every weighted leaf and climbs while the parent is
//! neither a stop node nor protected, and the collapse rule holds between
//! the current node and its parent. The climbed nodes form a run; the
//! lowest one survives, the rest are merged into it, and the survivor is
//! pointed at the node that halted the walk. The walk then resumes from
//! that halting node.
//!
//! A node belongs to at most one run. A climb that reaches a node already
//! claimed by an earlier run halts there, and the survivor of that run
//! stands in for it.
//!
//! Planning is pure ([`Collapser::plan`]); [`Collapser::apply`] performs
//! the edits.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::guard::PreciousSet;
use super::weights::CumulativeWeights;
use crate::config::{CollapseConfig, CollapseRule};
use crate::store::GraphStore;

/// When an ancestor counts as "no new information".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapsePolicy {
    pub rule: CollapseRule,
    pub threshold: f64,
}

impl CollapsePolicy {
    pub fn equal() -> Self {
        Self {
            rule: CollapseRule::Equal,
            threshold: 1.0,
        }
    }

    pub fn ratio(threshold: f64) -> Self {
        Self {
            rule: CollapseRule::Ratio,
            threshold,
        }
    }

    pub fn from_config(config: &CollapseConfig) -> Self {
        Self {
            rule: config.policy,
            threshold: config.threshold,
        }
    }

    /// True if a parent with `parent_total` adds nothing over a child with
    /// `child_total`.
    pub fn uninformative(&self, child_total: u64, parent_total: u64) -> bool {
        match self.rule {
            CollapseRule::Equal => child_total == parent_total,
            CollapseRule::Ratio => {
                parent_total > 0 && (child_total as f64 / parent_total as f64) > self.threshold
            }
        }
    }
}

impl Default for CollapsePolicy {
    fn default() -> Self {
        Self::equal()
    }
}

/// One planned merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedRun {
    /// Lowest node of the run; keeps its identity.
    pub survivor: String,
    /// Higher nodes of the run, nearest first; merged into the survivor.
    pub removed: Vec<String>,
    /// Node the survivor points at afterwards (the node that halted the walk).
    pub new_parent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseOutcome {
    pub runs: Vec<CollapsedRun>,
    pub self_loops_removed: usize,
}

impl CollapseOutcome {
    pub fn removed_count(&self) -> usize {
        self.runs.iter().map(|r| r.removed.len()).sum()
    }
}

pub struct Collapser<'a> {
    pub cumulative: &'a CumulativeWeights,
    pub precious: &'a PreciousSet,
    pub policy: CollapsePolicy,
    pub root: &'a str,
}

impl<'a> Collapser<'a> {
    /// Root, pinned top-level nodes, and aggregates end every walk.
    fn is_stop(&self, store: &GraphStore, id: &str) -> bool {
        id == self.root || store.is_manual_top_level(id) || store.is_synthetic_other(id)
    }

    /// Plan the runs to collapse on the current structure.
    pub fn plan(&self, store: &GraphStore) -> Vec<CollapsedRun> {
        let mut runs: Vec<CollapsedRun> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        // Node -> survivor of the run that took it.
        let mut claimed: HashMap<String, String> = HashMap::new();

        for leaf in store.leaves() {
            if self.cumulative.get(&leaf) == 0 {
                continue;
            }
            let mut start = leaf;
            loop {
                if claimed.contains_key(&start)
                    || !visited.insert(start.clone())
                    || self.is_stop(store, &start)
                {
                    break;
                }
                let (run, halt) = self.climb(store, &start, &claimed);
                if run.len() > 1 {
                    for node in &run {
                        claimed.insert(node.clone(), run[0].clone());
                    }
                    runs.push(CollapsedRun {
                        survivor: run[0].clone(),
                        removed: run[1..].to_vec(),
                        new_parent: halt.clone(),
                    });
                }
                match halt {
                    Some(next) => start = next,
                    None => break,
                }
            }
        }

        // A halting node may have been merged away by a later run.
        for run in &mut runs {
            if let Some(survivor) = run.new_parent.as_ref().and_then(|p| claimed.get(p)) {
                run.new_parent = Some(survivor.clone());
            }
        }
        runs
    }

    /// Climb from `start`; returns the run above it and the halting node.
    fn climb(
        &self,
        store: &GraphStore,
        start: &str,
        claimed: &HashMap<String, String>,
    ) -> (Vec<String>, Option<String>) {
        let mut run: Vec<String> = Vec::new();
        let mut on_run: HashSet<String> = HashSet::new();
        let mut current = start.to_string();
        loop {
            let Some(parent) = store.parent(&current) else {
                return (run, None);
            };
            if parent == current || parent == start || on_run.contains(parent) {
                return (run, None);
            }
            if let Some(survivor) = claimed.get(parent) {
                return (run, Some(survivor.clone()));
            }
            let halts = self.is_stop(store, parent)
                || self.precious.contains(parent)
                || !self
                    .policy
                    .uninformative(self.cumulative.get(&current), self.cumulative.get(parent));
            if halts {
                return (run, Some(parent.to_string()));
            }
            on_run.insert(parent.to_string());
            run.push(parent.to_string());
            current = parent.to_string();
        }
    }

    /// Plan and perform the collapse.
    pub fn apply(&self, store: &mut GraphStore) -> CollapseOutcome {
        let runs = self.plan(store);
        for run in &runs {
            if !store.contains(&run.survivor) {
                debug!("survivor {} is gone; skipping its run", run.survivor);
                continue;
            }
            match &run.new_parent {
                Some(parent) => {
                    store.set_parent(&run.survivor, parent);
                }
                None => {
                    store.detach(&run.survivor);
                }
            }
            for removed in &run.removed {
                debug!("collapsing {} into {}", removed, run.survivor);
                store.merge_into(removed, &run.survivor);
            }
        }
        let self_loops_removed = store.remove_self_loops();
        let outcome = CollapseOutcome {
            runs,
            self_loops_removed,
        };
        info!(
            "collapsed {} runs, removed {} nodes",
            outcome.runs.len(),
            outcome.removed_count()
        );
        outcome
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

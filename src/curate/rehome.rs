//! Threshold Rehomer: groups low-share children under their parent's
//! aggregate node.
//!
//! The pass runs over an explicit work-list from a set of start nodes. At
//! each node, children whose cumulative share falls strictly below
//! `min_ratio` are moved into the aggregate, unless doing so would leave
//! the aggregate as the only child; in that case the walk continues into
//! those children instead.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use super::guard::PreciousSet;
use super::organize::{ChildPolicy, Directive};
use super::weights::CumulativeWeights;
use super::{Move, relocate};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::store::{GraphStore, Rank};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehomeOutcome {
    /// Aggregates that received children in this pass.
    pub aggregates: BTreeSet<String>,
    /// Under-threshold nodes replaced by their protected descendants and
    /// sent to the global bucket.
    pub substituted: Vec<String>,
    pub moves: Vec<Move>,
}

/// Where rehoming begins.
///
/// Without an explicit list the start nodes come from the directive
/// skeleton: walking down from `root`, a `manual` group is descended
/// through, any other group is a start node, and the plain children of a
/// `manual` group are start nodes too. No directives means `root` itself.
pub fn start_nodes(
    store: &GraphStore,
    directives: &[Directive],
    configured: &[String],
    root: &str,
) -> Vec<String> {
    if !configured.is_empty() {
        return configured.iter().filter(|id| store.contains(id)).cloned().collect();
    }
    if directives.is_empty() {
        return vec![root.to_string()];
    }

    let policy_of = |id: &str| directives.iter().rev().find(|d| d.target == id).map(|d| &d.policy);
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = vec![root.to_string()];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.clone()) {
            continue;
        }
        for child in store.children(&node).into_iter().rev() {
            if store.is_synthetic_other(&child) {
                continue;
            }
            match policy_of(&child) {
                Some(ChildPolicy::Manual { .. }) => stack.push(child),
                Some(_) => out.push(child),
                None if node != root => out.push(child),
                None => {}
            }
        }
    }
    out
}

/// Replace a start node that already owns a protected aggregate by its
/// ordinary children.
fn expand_start(store: &GraphStore, precious: &PreciousSet, start: &str) -> Vec<String> {
    let children = store.children(start);
    let protected_aggregate = children
        .iter()
        .any(|c| store.is_synthetic_other(c) && precious.contains(c));
    if protected_aggregate {
        children
            .into_iter()
            .filter(|c| !store.is_synthetic_other(c))
            .collect()
    } else {
        vec![start.to_string()]
    }
}

pub struct Rehomer<'a> {
    pub cumulative: &'a CumulativeWeights,
    pub precious: &'a PreciousSet,
    pub min_ratio: f64,
    pub terminal_ranks: &'a [Rank],
    pub synthetic_prefix: &'a str,
    pub global_other: &'a str,
}

impl<'a> Rehomer<'a> {
    fn is_terminal(&self, store: &GraphStore, id: &str) -> bool {
        store
            .node(id)
            .and_then(|n| n.rank.as_ref())
            .is_some_and(|r| self.terminal_ranks.contains(r))
    }

    fn under_threshold(&self, store: &GraphStore, child: &str, parent: &str) -> bool {
        if store.is_synthetic_other(child)
            || store.is_manual_top_level(child)
            || self.precious.contains(child)
        {
            return false;
        }
        self.cumulative
            .share(child, parent)
            .is_some_and(|share| share < self.min_ratio)
    }

    pub fn apply(
        &self,
        store: &mut GraphStore,
        starts: &[String],
        diagnostics: &mut Diagnostics,
    ) -> RehomeOutcome {
        let mut outcome = RehomeOutcome::default();
        let mut work: Vec<String> = Vec::new();
        for start in starts.iter().rev() {
            for node in expand_start(store, self.precious, start).into_iter().rev() {
                work.push(node);
            }
        }

        let mut visited: HashSet<String> = HashSet::new();
        while let Some(node) = work.pop() {
            if store.is_synthetic_other(&node) || !visited.insert(node.clone()) {
                continue;
            }
            let next = self.rehome_level(store, &node, diagnostics, &mut outcome);
            work.extend(next.into_iter().rev());
        }

        info!(
            "rehomed {} nodes into {} aggregates",
            outcome.moves.len(),
            outcome.aggregates.len()
        );
        outcome
    }

    /// Rehome the children of `parent`; returns the nodes to visit next.
    fn rehome_level(
        &self,
        store: &mut GraphStore,
        parent: &str,
        diagnostics: &mut Diagnostics,
        outcome: &mut RehomeOutcome,
    ) -> Vec<String> {
        let children = store.children(parent);
        if children.is_empty() || children.iter().all(|c| self.is_terminal(store, c)) {
            return Vec::new();
        }
        if self.cumulative.get(parent) == 0 {
            diagnostics.push(Diagnostic::ZeroWeightParent {
                id: parent.to_string(),
            });
            return Vec::new();
        }

        let (under, rest): (Vec<String>, Vec<String>) = children
            .into_iter()
            .partition(|c| self.under_threshold(store, c, parent));
        let rest_real: Vec<String> = rest
            .into_iter()
            .filter(|c| !store.is_synthetic_other(c))
            .collect();
        if under.is_empty() {
            return rest_real;
        }
        if rest_real.is_empty() {
            debug!("{}: rehoming would leave only the aggregate, descending", parent);
            return under;
        }

        let aggregate = store.ensure_aggregate(self.synthetic_prefix, parent);
        outcome.aggregates.insert(aggregate.clone());
        for node in &under {
            let rescued = self.precious.topmost_descendants(store, node);
            let rescued_weight: u64 = rescued.iter().map(|r| self.cumulative.get(r)).sum();
            for r in &rescued {
                relocate(store, r, &aggregate, &mut outcome.moves);
            }
            if !rescued.is_empty() && rescued_weight >= self.cumulative.get(node) {
                relocate(store, node, self.global_other, &mut outcome.moves);
                outcome.substituted.push(node.clone());
            } else {
                relocate(store, node, &aggregate, &mut outcome.moves);
            }
        }
        rest_real
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

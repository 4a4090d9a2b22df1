//! The curation engine: weight propagation, chain collapsing, threshold
//! rehoming, top-level organisation, and dead-branch pruning.
//!
//! Every pass takes the store by `&mut` and returns an outcome value that
//! records what it moved; none of them keep state between calls.

pub mod collapse;
pub mod guard;
pub mod organize;
pub mod pipeline;
pub mod prune;
pub mod rehome;
pub mod weights;

use std::collections::HashSet;

use tracing::debug;

use crate::store::GraphStore;

/// One reparenting performed by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub node: String,
    pub from: Option<String>,
    pub to: String,
}

/// Point `node` at `to` and record the move. No-op when already there or
/// when `node == to`.
pub(crate) fn relocate(store: &mut GraphStore, node: &str, to: &str, moves: &mut Vec<Move>) {
    if node == to || store.parent(node) == Some(to) || !store.contains(node) {
        return;
    }
    let from = store.set_parent(node, to);
    debug!("moved {} from {:?} to {}", node, from, to);
    moves.push(Move {
        node: node.to_string(),
        from,
        to: to.to_string(),
    });
}

/// Descendants of `node` matching `hit` with no matching node strictly
/// between them and `node`. The scan never enters nodes for which `fence`
/// holds. Sorted.
pub(crate) fn topmost_matching<H, F>(store: &GraphStore, node: &str, hit: H, fence: F) -> Vec<String>
where
    H: Fn(&str) -> bool,
    F: Fn(&str) -> bool,
{
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = store.children(node);
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) || current == node {
            continue;
        }
        if hit(&current) {
            out.push(current);
            continue;
        }
        if fence(&current) {
            continue;
        }
        stack.extend(store.children(&current));
    }
    out.sort();
    out
}

//! GraphStore: petgraph StableDiGraph wrapper holding the hierarchy.
//!
//! Edges run parent → child. Every node has at most one parent; the store
//! enforces this in [`GraphStore::set_parent`]. A self-loop may appear
//! transiently after a reparenting and is removed by
//! [`GraphStore::remove_self_loops`].
//!
//! All traversals are iterative with an explicit stack, so hierarchy depth
//! is bounded only by memory.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use tracing::debug;

use super::types::{NodeData, Subsumption};
use crate::ids;

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    digraph: StableDiGraph<NodeData, ()>,
    /// Maps node id → petgraph NodeIndex.
    node_index: HashMap<String, NodeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ────────────────────────────────────────────────────────────────

    /// Add a node. No-op if a node with the same id already exists.
    pub fn add_node(&mut self, data: NodeData) {
        if self.node_index.contains_key(&data.id) {
            return;
        }
        let id = data.id.clone();
        let idx = self.digraph.add_node(data);
        self.node_index.insert(id, idx);
    }

    /// Ensure a node exists, creating a bare placeholder if absent.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.node_index.contains_key(id) {
            self.add_node(NodeData::new(id));
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.node_index.get(id).map(|&idx| &self.digraph[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeData> {
        match self.node_index.get(id) {
            Some(&idx) => self.digraph.node_weight_mut(idx),
            None => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.digraph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.digraph.edge_count()
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.node_index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.node(id).and_then(|n| n.label.as_deref())
    }

    pub fn is_precious(&self, id: &str) -> bool {
        self.node(id).is_some_and(|n| n.precious)
    }

    pub fn is_synthetic_other(&self, id: &str) -> bool {
        self.node(id).is_some_and(|n| n.synthetic_other)
    }

    pub fn is_manual_top_level(&self, id: &str) -> bool {
        self.node(id).is_some_and(|n| n.manual_top_level)
    }

    /// Remove a node and all of its edges. Its children become parentless.
    pub fn remove_node(&mut self, id: &str) -> Option<NodeData> {
        let idx = self.node_index.remove(id)?;
        self.digraph.remove_node(idx)
    }

    // ── Edges ────────────────────────────────────────────────────────────────

    /// Parent of `id`, if any. A self-loop reports the node as its own parent.
    pub fn parent(&self, id: &str) -> Option<&str> {
        let &idx = self.node_index.get(id)?;
        self.digraph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .map(|p| self.digraph[p].id.as_str())
    }

    /// Point `child` at `parent`, replacing any previous parent edge.
    ///
    /// Missing endpoints are created as placeholders. Returns the previous
    /// parent.
    pub fn set_parent(&mut self, child: &str, parent: &str) -> Option<String> {
        self.ensure_node(child);
        self.ensure_node(parent);
        let previous = self.detach(child);
        let child_idx = self.node_index[child];
        let parent_idx = self.node_index[parent];
        self.digraph.add_edge(parent_idx, child_idx, ());
        previous
    }

    /// Remove the parent edge(s) of `child`. Returns the previous parent.
    pub fn detach(&mut self, child: &str) -> Option<String> {
        let &idx = self.node_index.get(child)?;
        let incoming: Vec<_> = self
            .digraph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), e.source()))
            .collect();
        let previous = incoming
            .first()
            .map(|&(_, src)| self.digraph[src].id.clone());
        for (edge, _) in incoming {
            self.digraph.remove_edge(edge);
        }
        previous
    }

    /// Sorted ids of the direct children of `id`, excluding a self-loop.
    pub fn children(&self, id: &str) -> Vec<String> {
        match self.node_index.get(id) {
            None => vec![],
            Some(&idx) => {
                let mut result: Vec<String> = self
                    .digraph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .filter(|&n| n != idx)
                    .map(|n| self.digraph[n].id.clone())
                    .collect();
                result.sort();
                result.dedup();
                result
            }
        }
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.children(id).len()
    }

    /// Every `(child, parent)` edge, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .digraph
            .edge_references()
            .map(|e| {
                (
                    self.digraph[e.target()].id.clone(),
                    self.digraph[e.source()].id.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Delete every edge whose endpoints coincide. Returns how many.
    pub fn remove_self_loops(&mut self) -> usize {
        let loops: Vec<_> = self
            .digraph
            .edge_references()
            .filter(|e| e.source() == e.target())
            .map(|e| e.id())
            .collect();
        for edge in &loops {
            self.digraph.remove_edge(*edge);
        }
        loops.len()
    }

    // ── Traversal ────────────────────────────────────────────────────────────

    /// Ancestors of `id`, nearest first. Stops at a parentless node, a
    /// self-loop, or a node already seen.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) {
                break;
            }
            result.push(parent.to_string());
            current = parent;
        }
        result
    }

    /// Ancestors of `id` strictly below `limit`, nearest first.
    ///
    /// If `limit` is not an ancestor, the whole ancestor chain is returned.
    pub fn ancestors_until(&self, id: &str, limit: &str) -> Vec<String> {
        let mut result = self.ancestors(id);
        if let Some(pos) = result.iter().position(|a| a == limit) {
            result.truncate(pos);
        }
        result
    }

    /// True if `ancestor` lies on the parent chain of `id`.
    pub fn is_descendant_of(&self, id: &str, ancestor: &str) -> bool {
        self.ancestors(id).iter().any(|a| a == ancestor)
    }

    /// All descendants of `id` in pre-order (children sorted), excluding `id`.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(id.to_string());
        let mut stack: Vec<String> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            for child in self.children(&node).into_iter().rev() {
                stack.push(child);
            }
            result.push(node);
        }
        result
    }

    /// Nodes with no children, sorted.
    pub fn leaves(&self) -> Vec<String> {
        let mut result: Vec<String> = self
            .digraph
            .node_indices()
            .filter(|&idx| {
                self.digraph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .all(|n| n == idx)
            })
            .map(|idx| self.digraph[idx].id.clone())
            .collect();
        result.sort();
        result
    }

    /// Nodes without a parent, sorted.
    pub fn roots(&self) -> Vec<String> {
        let mut result: Vec<String> = self
            .digraph
            .node_indices()
            .filter(|&idx| {
                self.digraph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.digraph[idx].id.clone())
            .collect();
        result.sort();
        result
    }

    // ── Structural edits ─────────────────────────────────────────────────────

    /// Merge `removed` into `survivor`.
    ///
    /// Children of `removed` are redirected to `survivor`, `removed` is
    /// deleted, and the subsumption is recorded on the survivor. Returns
    /// false if either node is missing or they are the same node.
    pub fn merge_into(&mut self, removed: &str, survivor: &str) -> bool {
        if removed == survivor || !self.contains(removed) || !self.contains(survivor) {
            return false;
        }
        for child in self.children(removed) {
            self.set_parent(&child, survivor);
        }
        let Some(data) = self.remove_node(removed) else {
            return false;
        };
        if let Some(node) = self.node_mut(survivor) {
            node.subsumes.push(data.id);
            node.subsumes.extend(data.subsumes);
        }
        true
    }

    /// Get or create the aggregate ("Other") child of `parent`.
    ///
    /// A new aggregate is labelled `Other <parent label>` and flagged
    /// synthetic. When the short id is already the aggregate of a parent in
    /// another namespace, the namespace-qualified id is used instead. A
    /// detached aggregate with a matching id is reattached. Returns the
    /// aggregate id.
    pub fn ensure_aggregate(&mut self, synthetic_prefix: &str, parent: &str) -> String {
        let short = ids::aggregate_id(synthetic_prefix, parent);
        let other_id = if self.owns_aggregate(&short, parent) {
            short
        } else {
            debug!("{} belongs to another parent; qualifying the aggregate of {}", short, parent);
            ids::qualified_aggregate_id(synthetic_prefix, parent)
        };
        if self.contains(&other_id) {
            if self.parent(&other_id).is_none() {
                self.set_parent(&other_id, parent);
            }
        } else {
            let parent_label = self
                .node(parent)
                .map(|n| n.display_label().to_string())
                .unwrap_or_else(|| parent.to_string());
            let mut data = NodeData::new(other_id.clone()).with_label(format!("Other {parent_label}"));
            data.synthetic_other = true;
            self.add_node(data);
            self.set_parent(&other_id, parent);
        }
        other_id
    }

    fn owns_aggregate(&self, other_id: &str, parent: &str) -> bool {
        !self.contains(other_id) || self.parent(other_id).is_none_or(|p| p == parent)
    }

    /// Every provenance record, sorted by survivor.
    pub fn subsumptions(&self) -> Vec<Subsumption> {
        let mut result: Vec<Subsumption> = self
            .digraph
            .node_indices()
            .map(|idx| &self.digraph[idx])
            .flat_map(|n| {
                n.subsumes.iter().map(|removed| Subsumption {
                    survivor: n.id.clone(),
                    removed: removed.clone(),
                })
            })
            .collect();
        result.sort_by(|a, b| (&a.survivor, &a.removed).cmp(&(&b.survivor, &b.removed)));
        result
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Conversion between the graph store and the statement schema.
//!
//! `subClassOf` statements become parent edges, `label` / `has_rank` /
//! `subsumes` / `flag` statements become node attributes, and everything
//! else is carried on the node untouched.

use tracing::debug;

use super::graph::GraphStore;
use super::types::{
    FLAG, Flag, HAS_RANK, LABEL, NodeData, OWL_CLASS, RDF_TYPE, Rank, SUB_CLASS_OF, SUBSUMES,
    Statement,
};

/// Blank-node identifiers (`_:...`) never become hierarchy nodes.
fn is_blank(id: &str) -> bool {
    id.starts_with("_:")
}

impl GraphStore {
    /// Build a store from schema statements.
    ///
    /// A node with several `subClassOf` statements keeps the first parent;
    /// the rest are dropped so the tree invariant holds.
    pub fn from_statements<I>(statements: I) -> Self
    where
        I: IntoIterator<Item = Statement>,
    {
        let mut store = GraphStore::new();
        for st in statements {
            if is_blank(&st.stanza) {
                continue;
            }
            store.ensure_node(&st.stanza);
            let about_self = st.subject == st.stanza;
            match st.predicate.as_str() {
                RDF_TYPE if about_self && st.object.as_deref() == Some(OWL_CLASS) => {}
                SUB_CLASS_OF if about_self => {
                    let Some(parent) = st.object.as_deref().filter(|p| !is_blank(p)) else {
                        continue;
                    };
                    if store.parent(&st.stanza).is_some() {
                        debug!("{} already has a parent; ignoring {}", st.stanza, parent);
                        continue;
                    }
                    store.set_parent(&st.stanza, parent);
                }
                LABEL if about_self => {
                    if let Some(node) = store.node_mut(&st.stanza) {
                        node.label = st.value;
                    }
                }
                HAS_RANK if about_self => {
                    let raw = st.object.or(st.value).unwrap_or_default();
                    if let Some(node) = store.node_mut(&st.stanza) {
                        node.rank = Rank::parse(&raw);
                    }
                }
                SUBSUMES if about_self => {
                    if let (Some(node), Some(removed)) = (store.node_mut(&st.stanza), st.value) {
                        node.subsumes.push(removed);
                    }
                }
                FLAG if about_self => {
                    let flag = st.value.as_deref().and_then(Flag::parse);
                    if let (Some(node), Some(flag)) = (store.node_mut(&st.stanza), flag) {
                        node.set_flag(flag, true);
                    }
                }
                _ => {
                    if let Some(node) = store.node_mut(&st.stanza) {
                        node.extra.push(st);
                    }
                }
            }
        }
        store
    }

    /// Export the store as schema statements, nodes in sorted id order.
    pub fn statements(&self) -> Vec<Statement> {
        let mut out = Vec::new();
        for id in self.node_ids() {
            let Some(node) = self.node(&id) else { continue };
            node_statements(node, self.parent(&id), &mut out);
        }
        out
    }
}

fn node_statements(node: &NodeData, parent: Option<&str>, out: &mut Vec<Statement>) {
    let id = node.id.as_str();
    out.push(Statement::object(id, RDF_TYPE, OWL_CLASS));
    if let Some(label) = &node.label {
        out.push(Statement::literal(id, LABEL, label.clone()));
    }
    if let Some(parent) = parent.filter(|&p| p != id) {
        out.push(Statement::object(id, SUB_CLASS_OF, parent));
    }
    if let Some(rank) = &node.rank {
        out.push(Statement::object(id, HAS_RANK, rank.to_curie()));
    }
    for flag in [Flag::Precious, Flag::ManualTopLevel, Flag::SyntheticOther] {
        if node.has_flag(flag) {
            out.push(Statement::literal(id, FLAG, flag.as_str()));
        }
    }
    for removed in &node.subsumes {
        out.push(Statement::literal(id, SUBSUMES, removed.clone()));
    }
    out.extend(node.extra.iter().cloned());
}

//! Pass sequencing.
//!
//! A [`Session`] owns everything shared between passes: the effective
//! weight map, the precious set, and the diagnostics. Each pass method
//! recomputes cumulative weights from the current edges before it runs, so
//! a pass never sees stale totals. [`curate`] runs the whole pipeline in
//! its fixed order.

use tracing::{debug, info};

use super::collapse::{CollapseOutcome, CollapsePolicy, Collapser};
use super::guard::PreciousSet;
use super::organize::{Directive, OrganizeOutcome, Organizer};
use super::prune::{CleanupOutcome, PruneOutcome, Pruner};
use super::rehome::{self, RehomeOutcome, Rehomer};
use super::weights::{self, CumulativeWeights};
use crate::config::CurationConfig;
use crate::diagnostics::{Diagnostic, Diagnostics, ReferenceSource};
use crate::inputs::WeightMap;
use crate::store::GraphStore;

/// Collaborator inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct CurationInputs {
    pub weights: WeightMap,
    /// Externally designated must-keep ids.
    pub precious: Vec<String>,
    pub directives: Vec<Directive>,
    /// `(child, new parent)` pairs applied before any pass.
    pub parent_overrides: Vec<(String, String)>,
}

/// Everything a full run produced besides the mutated store.
#[derive(Debug, Clone, Default)]
pub struct CurationReport {
    pub cumulative: CumulativeWeights,
    pub organize: OrganizeOutcome,
    pub collapse: CollapseOutcome,
    pub rehome: RehomeOutcome,
    pub prune: PruneOutcome,
    pub cleanup: CleanupOutcome,
    pub diagnostics: Diagnostics,
}

pub struct Session<'a> {
    config: &'a CurationConfig,
    directives: &'a [Directive],
    weights: WeightMap,
    precious: PreciousSet,
    /// Precious ids the store held when the session started.
    anchored: Vec<String>,
    global_other: String,
    diagnostics: Diagnostics,
}

impl<'a> Session<'a> {
    /// Prepare `store` for curation: apply parent overrides, create the
    /// global bucket, and flag the precious set.
    ///
    /// Nodes the store already flags as precious join the set, so passes
    /// run one at a time over a saved store keep the same protection.
    pub fn start(config: &'a CurationConfig, inputs: &'a CurationInputs, store: &mut GraphStore) -> Self {
        let mut diagnostics = Diagnostics::new();
        apply_parent_overrides(store, &inputs.parent_overrides, &mut diagnostics);

        let global_other = store.ensure_aggregate(&config.synthetic_prefix, &config.root);

        let mut precious =
            PreciousSet::build(&inputs.precious, &inputs.weights, config.precious_from_weights);
        for directive in &inputs.directives {
            precious.insert(directive.target.clone());
        }
        // Flags carried in from an earlier pass run.
        for id in store.node_ids() {
            if store.is_precious(&id) {
                precious.insert(id);
            }
        }
        precious.mark(store, &inputs.precious, &mut diagnostics);
        let anchored: Vec<String> = precious.iter().filter(|id| store.contains(id)).cloned().collect();

        // Reported once here; later passes only see ids the store holds.
        weights::propagate(store, &inputs.weights, &mut diagnostics);
        let weights: WeightMap = inputs
            .weights
            .iter()
            .filter(|(id, _)| store.contains(id))
            .map(|(id, &w)| (id.clone(), w))
            .collect();

        info!(
            "session ready: {} nodes, {} weighted, {} precious",
            store.node_count(),
            weights.len(),
            precious.len()
        );
        Self {
            config,
            directives: &inputs.directives,
            weights,
            precious,
            anchored,
            global_other,
            diagnostics,
        }
    }

    pub fn precious(&self) -> &PreciousSet {
        &self.precious
    }

    pub fn weights(&self) -> &WeightMap {
        &self.weights
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Cumulative weights over the current edges.
    pub fn propagate(&mut self, store: &GraphStore) -> CumulativeWeights {
        let mut scratch = Diagnostics::new();
        let cumulative = weights::propagate(store, &self.weights, &mut scratch);
        for d in scratch.iter() {
            if !self.diagnostics.iter().any(|seen| seen == d) {
                self.diagnostics.push(d.clone());
            }
        }
        cumulative
    }

    pub fn organize(&mut self, store: &mut GraphStore) -> OrganizeOutcome {
        Organizer {
            precious: &self.precious,
            synthetic_prefix: &self.config.synthetic_prefix,
            global_other: &self.global_other,
        }
        .apply(store, self.directives, &mut self.diagnostics)
    }

    pub fn collapse(&mut self, store: &mut GraphStore, policy: CollapsePolicy) -> CollapseOutcome {
        let cumulative = self.propagate(store);
        let outcome = Collapser {
            cumulative: &cumulative,
            precious: &self.precious,
            policy,
            root: &self.config.root,
        }
        .apply(store);

        // Own weight of a merged node moves to the survivor.
        for run in &outcome.runs {
            let carried: u64 = run.removed.iter().filter_map(|r| self.weights.remove(r)).sum();
            if carried > 0 {
                *self.weights.entry(run.survivor.clone()).or_insert(0) += carried;
            }
        }
        outcome
    }

    pub fn rehome(&mut self, store: &mut GraphStore, min_ratio: f64) -> RehomeOutcome {
        let cumulative = self.propagate(store);
        let starts = rehome::start_nodes(
            store,
            self.directives,
            &self.config.rehome.start_nodes,
            &self.config.root,
        );
        debug!("rehoming from {} start nodes", starts.len());
        Rehomer {
            cumulative: &cumulative,
            precious: &self.precious,
            min_ratio,
            terminal_ranks: &self.config.rehome.terminal_ranks,
            synthetic_prefix: &self.config.synthetic_prefix,
            global_other: &self.global_other,
        }
        .apply(store, &starts, &mut self.diagnostics)
    }

    /// Dead-branch pruning followed by aggregate cleanup and self-loop
    /// removal.
    pub fn prune(&mut self, store: &mut GraphStore) -> (PruneOutcome, CleanupOutcome) {
        let cumulative = self.propagate(store);
        let pruner = Pruner {
            cumulative: &cumulative,
            precious: &self.precious,
            root: &self.config.root,
            global_other: &self.global_other,
        };
        let pruned = pruner.prune(store);
        let cleaned = pruner.cleanup(store);
        store.remove_self_loops();
        (pruned, cleaned)
    }

    /// Check the structural invariants and record every violation.
    pub fn validate(&mut self, store: &GraphStore, cumulative: &CumulativeWeights) {
        let root = self.config.root.as_str();
        for id in store.roots() {
            if id != root {
                self.diagnostics.violation(id, "node has no parent");
            }
        }
        for id in store.node_ids() {
            let Some(parent) = store.parent(&id) else {
                continue;
            };
            if parent == id {
                self.diagnostics.violation(id, "node is its own parent");
                continue;
            }
            // Reported for cycle members only; a node hanging below a cycle
            // gets no diagnostic of its own.
            let ancestors = store.ancestors(&id);
            let last = ancestors.last().map(String::as_str).unwrap_or(parent);
            if store.parent(last) == Some(id.as_str()) {
                self.diagnostics.push(Diagnostic::Cycle { id });
            }
        }
        for (parent, child) in weights::monotonicity_violations(store, cumulative) {
            self.diagnostics.violation(
                parent,
                format!("cumulative weight is below that of child {child}"),
            );
        }
        for id in &self.anchored {
            if !store.contains(id) {
                self.diagnostics.violation(id.clone(), "precious node was removed");
            }
        }
    }

    pub fn finish(self) -> Diagnostics {
        self.diagnostics
    }
}

/// Reparent nodes as listed, before any pass runs.
pub fn apply_parent_overrides(
    store: &mut GraphStore,
    overrides: &[(String, String)],
    diagnostics: &mut Diagnostics,
) {
    for (child, parent) in overrides {
        let mut present = true;
        for id in [child, parent] {
            if !store.contains(id) {
                diagnostics.missing(ReferenceSource::ParentOverride, id.clone());
                present = false;
            }
        }
        if !present {
            continue;
        }
        if child == parent || store.is_descendant_of(parent, child) {
            diagnostics.violation(
                child.clone(),
                format!("override to {parent} would create a cycle; skipped"),
            );
            continue;
        }
        store.set_parent(child, parent);
    }
}

/// Append the cumulative count to the label of every weighted node, as
/// `Label (N)`.
pub fn annotate_labels(store: &mut GraphStore, cumulative: &CumulativeWeights) {
    for id in store.node_ids() {
        let total = cumulative.get(&id);
        if total == 0 {
            continue;
        }
        if let Some(node) = store.node_mut(&id) {
            node.label = Some(format!("{} ({})", node.display_label(), total));
        }
    }
}

/// Run the whole pipeline: organize, collapse, rehome, prune, clean up,
/// then validate against the final cumulative weights.
pub fn curate(
    store: &mut GraphStore,
    config: &CurationConfig,
    inputs: &CurationInputs,
) -> CurationReport {
    let mut session = Session::start(config, inputs, store);

    let organize = session.organize(store);
    let collapse = session.collapse(store, CollapsePolicy::from_config(&config.collapse));
    let rehome = session.rehome(store, config.rehome.min_ratio);
    let (prune, cleanup) = session.prune(store);

    let cumulative = session.propagate(store);
    session.validate(store, &cumulative);
    let diagnostics = session.finish();
    info!(
        "curation finished: {} nodes, {} diagnostics",
        store.node_count(),
        diagnostics.len()
    );

    CurationReport {
        cumulative,
        organize,
        collapse,
        rehome,
        prune,
        cleanup,
        diagnostics,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

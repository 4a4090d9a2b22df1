//! Top-Level Organizer: pins a hand-authored skeleton of high-level groups
//! and fixes each group's direct children.
//!
//! Directives are applied descendants-first (by their `parent` links), so a
//! group is stabilised before the group above it moves it around.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use super::guard::PreciousSet;
use super::{Move, relocate, topmost_matching};
use crate::diagnostics::{Diagnostic, Diagnostics, ReferenceSource};
use crate::store::{GraphStore, Rank};

/// How a pinned group chooses its direct children.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildPolicy {
    /// Leave the substructure as it is.
    Keep,
    /// Keep only directive children and the listed ids; everything else
    /// goes to the group's aggregate. With a fallback rank, nodes of that
    /// rank (and protected nodes) are lifted out of each displaced child
    /// first; without one, displaced children move whole.
    Manual {
        children: Vec<String>,
        fallback_rank: Option<Rank>,
    },
    /// Every descendant of `rank`, plus the `extras`, becomes a direct child.
    PromoteRank { rank: Rank, extras: Vec<String> },
}

/// One row of the top-level directive table.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub target: String,
    pub parent: String,
    pub label: Option<String>,
    pub policy: ChildPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeOutcome {
    /// Targets in the order they were applied.
    pub applied: Vec<String>,
    pub moves: Vec<Move>,
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// Deduplicate by target (later rows win, each override is a
/// `DirectiveConflict`) and order so that every directive comes before the
/// directive that names its parent.
pub fn order_directives(directives: &[Directive], diagnostics: &mut Diagnostics) -> Vec<Directive> {
    let mut latest: HashMap<&str, usize> = HashMap::new();
    for (i, d) in directives.iter().enumerate() {
        if latest.insert(d.target.as_str(), i).is_some() {
            diagnostics.push(Diagnostic::DirectiveConflict {
                target: d.target.clone(),
            });
        }
    }
    let kept: Vec<&Directive> = directives
        .iter()
        .enumerate()
        .filter(|(i, d)| latest.get(d.target.as_str()) == Some(i))
        .map(|(_, d)| d)
        .collect();

    let targets: HashSet<&str> = kept.iter().map(|d| d.target.as_str()).collect();
    let mut by_parent: HashMap<&str, Vec<&Directive>> = HashMap::new();
    for d in &kept {
        by_parent.entry(d.parent.as_str()).or_default().push(*d);
    }

    let mut ordered: Vec<Directive> = Vec::with_capacity(kept.len());
    let mut placed: HashSet<&str> = HashSet::new();
    for top in kept.iter().filter(|d| !targets.contains(d.parent.as_str())) {
        // Iterative post-order: (directive, children already pushed)
        let mut stack: Vec<(&Directive, bool)> = vec![(*top, false)];
        while let Some((d, expanded)) = stack.pop() {
            if expanded {
                ordered.push(d.clone());
                continue;
            }
            if !placed.insert(d.target.as_str()) {
                continue;
            }
            stack.push((d, true));
            if let Some(children) = by_parent.get(d.target.as_str()) {
                for child in children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
    }
    for d in &kept {
        if !placed.contains(d.target.as_str()) {
            warn!("directive for {} sits in a parent cycle; applying it last", d.target);
            ordered.push((*d).clone());
        }
    }
    ordered
}

// ─── Organizer ───────────────────────────────────────────────────────────────

pub struct Organizer<'a> {
    pub precious: &'a PreciousSet,
    pub synthetic_prefix: &'a str,
    pub global_other: &'a str,
}

fn rank_of<'s>(store: &'s GraphStore, id: &str) -> Option<&'s Rank> {
    store.node(id).and_then(|n| n.rank.as_ref())
}

/// Pinned groups and aggregates are never rearranged from outside.
fn is_fixed(store: &GraphStore, id: &str) -> bool {
    store.is_manual_top_level(id) || store.is_synthetic_other(id)
}

/// Descendants of `node` reachable without entering a fixed node.
fn open_descendants(store: &GraphStore, node: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = store.children(node);
    while let Some(current) = stack.pop() {
        if current == node || !seen.insert(current.clone()) || is_fixed(store, &current) {
            continue;
        }
        stack.extend(store.children(&current));
        out.push(current);
    }
    out
}

impl<'a> Organizer<'a> {
    /// Apply `directives` in dependency order.
    pub fn apply(
        &self,
        store: &mut GraphStore,
        directives: &[Directive],
        diagnostics: &mut Diagnostics,
    ) -> OrganizeOutcome {
        let ordered = order_directives(directives, diagnostics);
        let pinned: HashSet<String> = ordered.iter().map(|d| d.target.clone()).collect();
        let mut outcome = OrganizeOutcome::default();

        for directive in &ordered {
            if !store.contains(&directive.target) {
                diagnostics.missing(ReferenceSource::Directive, directive.target.clone());
                continue;
            }
            if !store.contains(&directive.parent) {
                diagnostics.missing(ReferenceSource::Directive, directive.parent.clone());
                continue;
            }
            self.pin(store, directive, &mut outcome.moves);

            match &directive.policy {
                ChildPolicy::Keep => {}
                ChildPolicy::Manual {
                    children,
                    fallback_rank,
                } => {
                    let mut keep = pinned.clone();
                    keep.extend(children.iter().cloned());
                    self.apply_manual(
                        store,
                        &directive.target,
                        &keep,
                        fallback_rank.as_ref(),
                        &mut outcome.moves,
                    );
                }
                ChildPolicy::PromoteRank { rank, extras } => {
                    for extra in extras.iter().filter(|e| !store.contains(e)) {
                        diagnostics.missing(ReferenceSource::Directive, extra.clone());
                    }
                    self.apply_promote(store, &directive.target, rank, extras, &mut outcome.moves);
                }
            }
            outcome.applied.push(directive.target.clone());
        }

        info!(
            "organized {} top-level groups with {} moves",
            outcome.applied.len(),
            outcome.moves.len()
        );
        outcome
    }

    /// Fix the target under its parent and flag it as part of the skeleton.
    fn pin(&self, store: &mut GraphStore, directive: &Directive, moves: &mut Vec<Move>) {
        let target = directive.target.as_str();
        let parent = directive.parent.as_str();
        if store.is_descendant_of(parent, target) {
            // Lift the parent out first so pinning cannot close a cycle.
            let lift_to = store
                .parent(target)
                .map(str::to_string)
                .unwrap_or_else(|| self.global_other.to_string());
            debug!("lifting {} out of {} before pinning", parent, target);
            relocate(store, parent, &lift_to, moves);
        }
        relocate(store, target, parent, moves);
        if let Some(node) = store.node_mut(target) {
            node.manual_top_level = true;
            if let Some(label) = &directive.label {
                node.label = Some(label.clone());
            }
        }
    }

    fn apply_manual(
        &self,
        store: &mut GraphStore,
        target: &str,
        keep: &HashSet<String>,
        fallback_rank: Option<&Rank>,
        moves: &mut Vec<Move>,
    ) {
        let others: Vec<String> = store
            .children(target)
            .into_iter()
            .filter(|c| !keep.contains(c) && !is_fixed(store, c))
            .collect();
        if others.is_empty() {
            return;
        }
        let aggregate = store.ensure_aggregate(self.synthetic_prefix, target);

        for other in others {
            let Some(rank) = fallback_rank else {
                relocate(store, &other, &aggregate, moves);
                continue;
            };
            if rank_of(store, &other) == Some(rank) {
                relocate(store, &other, &aggregate, moves);
                continue;
            }

            let other_precious = self.precious.contains(&other);
            let dest = if other_precious {
                relocate(store, &other, &aggregate, moves);
                other.clone()
            } else {
                aggregate.clone()
            };

            let view: &GraphStore = store;
            let lifted = topmost_matching(
                view,
                &other,
                |n| rank_of(view, n) == Some(rank) || self.precious.contains(n),
                |n| is_fixed(view, n),
            );
            for node in &lifted {
                relocate(store, node, &dest, moves);
            }

            if other_precious {
                for child in store.children(&other) {
                    if !lifted.contains(&child) {
                        relocate(store, &child, self.global_other, moves);
                    }
                }
            } else {
                relocate(store, &other, self.global_other, moves);
            }
        }
    }

    fn apply_promote(
        &self,
        store: &mut GraphStore,
        target: &str,
        rank: &Rank,
        extras: &[String],
        moves: &mut Vec<Move>,
    ) {
        let is_extra = |n: &str| extras.iter().any(|e| e == n);
        let mut promote: BTreeSet<String> = BTreeSet::new();

        let view: &GraphStore = store;
        for candidate in open_descendants(view, target) {
            if rank_of(view, &candidate) != Some(rank) {
                continue;
            }
            let path = view.ancestors_until(&candidate, target);
            if path.iter().any(|a| is_extra(a)) {
                // Travels with its extra ancestor.
                continue;
            }
            // Outermost protected ancestor goes up instead of the node itself.
            match path.iter().rev().find(|a| self.precious.contains(a)) {
                Some(top) => promote.insert(top.clone()),
                None => promote.insert(candidate),
            };
        }
        for extra in extras {
            if extra == target || !view.contains(extra) || view.is_descendant_of(target, extra) {
                continue;
            }
            if view.is_descendant_of(extra, target)
                && view
                    .ancestors_until(extra, target)
                    .iter()
                    .any(|a| is_extra(a))
            {
                continue;
            }
            promote.insert(extra.clone());
        }
        for node in &promote {
            relocate(store, node, target, moves);
        }

        // Whatever is left at the top level and does not belong there goes
        // to the global bucket, after its protected content is rescued.
        let stray: Vec<String> = store
            .children(target)
            .into_iter()
            .filter(|c| {
                rank_of(store, c) != Some(rank)
                    && !is_extra(c)
                    && !self.precious.contains(c)
                    && !is_fixed(store, c)
            })
            .collect();
        for node in stray {
            let view: &GraphStore = store;
            let rescued = topmost_matching(
                view,
                &node,
                |n| self.precious.contains(n),
                |n| is_fixed(view, n),
            );
            if !rescued.is_empty() {
                let aggregate = store.ensure_aggregate(self.synthetic_prefix, target);
                for r in &rescued {
                    relocate(store, r, &aggregate, moves);
                }
            }
            relocate(store, &node, self.global_other, moves);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Pipeline scenarios run through the public API.

use taxon_curate::curate::guard::PreciousSet;
use taxon_curate::curate::weights::monotonicity_violations;
use taxon_curate::{
    ChildPolicy, CollapsePolicy, CurationConfig, CurationInputs, Diagnostic, Directive,
    GraphStore, Rank, Session, curate, propagate,
};

const GLOBAL: &str = "iedb-taxon:root-other";

fn config() -> CurationConfig {
    CurationConfig {
        root: "root".into(),
        precious_from_weights: false,
        ..CurationConfig::default()
    }
}

fn weights(pairs: &[(&str, u64)]) -> CurationInputs {
    CurationInputs {
        weights: pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect(),
        ..CurationInputs::default()
    }
}

fn store(edges: &[(&str, &str)]) -> GraphStore {
    let mut g = GraphStore::new();
    g.ensure_node("root");
    for (child, parent) in edges {
        g.set_parent(child, parent);
    }
    g
}

fn set_rank(g: &mut GraphStore, ids: &[&str], rank: Rank) {
    for id in ids {
        g.node_mut(id).unwrap().rank = Some(rank.clone());
    }
}

/// Every non-root node reaches `root` through single parent edges.
fn assert_tree(g: &GraphStore) {
    for id in g.node_ids() {
        if id == "root" {
            continue;
        }
        let ancestors = g.ancestors(&id);
        assert_eq!(
            ancestors.last().map(String::as_str),
            Some("root"),
            "{} does not reach the root",
            id
        );
    }
}

// ── Collapse ─────────────────────────────────────────────────────────────

#[test]
fn test_chain_collapses_into_one_node() {
    let mut g = store(&[("A", "root"), ("B", "A"), ("C", "B")]);
    let cfg = config();
    let inputs = weights(&[("C", 5)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    let out = session.collapse(&mut g, CollapsePolicy::equal());

    assert_eq!(out.runs.len(), 1);
    assert_eq!(g.parent("C"), Some("B"));
    assert_eq!(g.parent("B"), Some("root"));
    assert!(!g.contains("A"));
    let cum = session.propagate(&g);
    assert_eq!(cum.get("B"), 5);
    assert_eq!(cum.get("root"), 5);
}

#[test]
fn test_collapse_twice_is_noop() {
    let mut g = store(&[
        ("A", "root"),
        ("B", "A"),
        ("C", "B"),
        ("D", "C"),
        ("E", "A"),
        ("F", "E"),
    ]);
    let cfg = config();
    let inputs = weights(&[("D", 5), ("F", 2)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    session.collapse(&mut g, CollapsePolicy::equal());
    let edges = g.edges();
    let second = session.collapse(&mut g, CollapsePolicy::equal());
    assert!(second.runs.is_empty());
    assert_eq!(g.edges(), edges);
}

// ── Rehome ───────────────────────────────────────────────────────────────

fn xyz() -> GraphStore {
    store(&[("P", "root"), ("X", "P"), ("Y", "P"), ("Z", "P")])
}

#[test]
fn test_low_share_children_rehomed() {
    let mut g = xyz();
    let cfg = config();
    let inputs = weights(&[("X", 1), ("Y", 98), ("Z", 1)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    session.rehome(&mut g, 0.02);

    assert_eq!(g.parent("Y"), Some("P"));
    assert_eq!(g.parent("X"), Some("iedb-taxon:P-other"));
    assert_eq!(g.parent("Z"), Some("iedb-taxon:P-other"));
    assert_eq!(g.parent("iedb-taxon:P-other"), Some("P"));
}

#[test]
fn test_precious_child_not_rehomed() {
    let mut g = xyz();
    let cfg = config();
    let mut inputs = weights(&[("X", 1), ("Y", 98), ("Z", 1)]);
    inputs.precious = vec!["X".into()];
    let mut session = Session::start(&cfg, &inputs, &mut g);
    session.rehome(&mut g, 0.02);

    assert_eq!(g.parent("X"), Some("P"));
    assert_eq!(g.parent("Z"), Some("iedb-taxon:P-other"));
    assert!(g.is_precious("X"));
}

#[test]
fn test_lone_low_child_gets_no_aggregate_level() {
    let mut g = store(&[("P", "root"), ("C", "P")]);
    let cfg = config();
    let inputs = weights(&[("P", 99), ("C", 1)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    let out = session.rehome(&mut g, 0.02);

    assert!(out.aggregates.is_empty());
    assert_eq!(g.children("P"), vec!["C"]);
}

#[test]
fn test_weighted_nodes_are_precious_by_default() {
    let mut g = xyz();
    let cfg = CurationConfig {
        root: "root".into(),
        ..CurationConfig::default()
    };
    let inputs = weights(&[("X", 1), ("Y", 98), ("Z", 1)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    let out = session.rehome(&mut g, 0.02);
    assert!(out.moves.is_empty());
    assert_eq!(g.children("P"), vec!["X", "Y", "Z"]);
}

// ── Propagation ──────────────────────────────────────────────────────────

#[test]
fn test_root_total_matches_weight_sum() {
    let g = store(&[("A", "root"), ("B", "A"), ("C", "A"), ("D", "C")]);
    let inputs = weights(&[("B", 2), ("C", 3), ("D", 4)]);
    let cum = propagate(&g, &inputs.weights, &mut Default::default());
    assert_eq!(cum.get("root"), 9);
    assert!(monotonicity_violations(&g, &cum).is_empty());
}

// ── Full pipeline ────────────────────────────────────────────────────────

fn sample() -> (GraphStore, CurationInputs) {
    let mut g = store(&[
        ("Bacteria", "root"),
        ("order1", "Bacteria"),
        ("fam1", "order1"),
        ("genusA", "fam1"),
        ("spA1", "genusA"),
        ("spA2", "genusA"),
        ("genusB", "fam1"),
        ("spB1", "genusB"),
        ("junk", "Bacteria"),
        ("junk2", "junk"),
        ("Viruses", "root"),
        ("virfam1", "Viruses"),
        ("v1", "virfam1"),
        ("virfam2", "Viruses"),
        ("vx", "virfam2"),
        ("v2", "vx"),
        ("stray", "Viruses"),
        ("zero", "stray"),
        ("misc", "root"),
        ("misc2", "misc"),
        ("misc3", "misc2"),
    ]);
    set_rank(&mut g, &["genusA", "genusB"], Rank::Genus);
    set_rank(&mut g, &["spA1", "spA2", "spB1", "v1", "v2"], Rank::Species);

    let mut inputs = weights(&[
        ("spA1", 50),
        ("spA2", 1),
        ("spB1", 30),
        ("v1", 10),
        ("v2", 2),
        ("misc3", 1),
    ]);
    inputs.directives = vec![
        Directive {
            target: "Bacteria".into(),
            parent: "root".into(),
            label: None,
            policy: ChildPolicy::PromoteRank {
                rank: Rank::Genus,
                extras: vec![],
            },
        },
        Directive {
            target: "Viruses".into(),
            parent: "root".into(),
            label: Some("virus".into()),
            policy: ChildPolicy::Manual {
                children: vec!["virfam1".into()],
                fallback_rank: Some(Rank::Species),
            },
        },
    ];
    (g, inputs)
}

#[test]
fn test_full_pipeline_shapes_tree() {
    let (mut g, inputs) = sample();
    let cfg = CurationConfig {
        root: "root".into(),
        ..CurationConfig::default()
    };
    let report = curate(&mut g, &cfg, &inputs);

    assert_eq!(g.children("Bacteria"), vec!["genusA", "genusB"]);
    assert_eq!(g.parent("order1"), Some(GLOBAL));
    assert_eq!(g.parent("junk"), Some(GLOBAL));

    assert_eq!(g.label("Viruses"), Some("virus"));
    assert_eq!(g.parent("virfam1"), Some("Viruses"));
    assert_eq!(g.parent("virfam2"), Some(GLOBAL));
    assert_eq!(g.parent("stray"), Some(GLOBAL));
    // The Viruses aggregate held only v2 and was folded back.
    assert_eq!(g.parent("v2"), Some("Viruses"));
    assert!(!g.contains("iedb-taxon:Viruses-other"));

    assert!(!g.contains("misc"));
    assert_eq!(g.parent("misc2"), Some("root"));
    assert_eq!(g.node("misc2").unwrap().subsumes, vec!["misc"]);

    assert_eq!(report.cumulative.get("root"), 94);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
}

#[test]
fn test_full_pipeline_invariants() {
    let (mut g, inputs) = sample();
    let cfg = CurationConfig {
        root: "root".into(),
        ..CurationConfig::default()
    };
    let report = curate(&mut g, &cfg, &inputs);

    assert_tree(&g);
    assert!(monotonicity_violations(&g, &report.cumulative).is_empty());

    let precious = PreciousSet::build(&inputs.precious, &inputs.weights, true);
    for id in precious.iter() {
        assert!(g.contains(id), "{} was removed", id);
        assert!(g.is_precious(id));
        assert!(!g.is_synthetic_other(id));
    }
    assert!(
        !report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::InvariantViolation { .. } | Diagnostic::Cycle { .. }))
    );

    // A second full run leaves the tree as it is.
    let edges = g.edges();
    curate(&mut g, &cfg, &inputs);
    assert_eq!(g.edges(), edges);
}

fn assert_monotone(session: &mut Session<'_>, g: &GraphStore, total: u64, pass: &str) {
    let cum = session.propagate(g);
    assert!(
        monotonicity_violations(g, &cum).is_empty(),
        "weights not monotone after {}",
        pass
    );
    assert_eq!(cum.get("root"), total, "root total changed by {}", pass);
}

#[test]
fn test_each_pass_keeps_weights_monotone() {
    let (mut g, inputs) = sample();
    let cfg = CurationConfig {
        root: "root".into(),
        ..CurationConfig::default()
    };
    let mut session = Session::start(&cfg, &inputs, &mut g);
    let total = session.propagate(&g).get("root");
    assert_eq!(total, 94);

    session.organize(&mut g);
    assert_monotone(&mut session, &g, total, "organize");
    session.collapse(&mut g, CollapsePolicy::equal());
    assert_monotone(&mut session, &g, total, "collapse");
    session.rehome(&mut g, cfg.rehome.min_ratio);
    assert_monotone(&mut session, &g, total, "rehome");
    session.prune(&mut g);
    assert_monotone(&mut session, &g, total, "prune");
}

#[test]
fn test_ratio_collapse_with_shared_ancestors() {
    let mut g = store(&[
        ("A", "root"),
        ("B", "A"),
        ("C", "B"),
        ("D", "C"),
        ("L1", "D"),
        ("L2", "C"),
        ("L3", "B"),
        ("E", "A"),
        ("L4", "E"),
    ]);
    let cfg = config();
    let inputs = weights(&[("L1", 1000), ("L2", 1), ("L3", 2), ("L4", 3)]);
    let mut session = Session::start(&cfg, &inputs, &mut g);
    session.collapse(&mut g, CollapsePolicy::ratio(0.95));

    for s in g.subsumptions() {
        assert!(!g.contains(&s.removed), "{} merged but still present", s.removed);
    }
    for leaf in ["L1", "L2", "L3", "L4"] {
        assert!(g.contains(leaf));
    }
    assert_tree(&g);
    let cum = session.propagate(&g);
    assert_eq!(cum.get("root"), 1006);
    assert!(monotonicity_violations(&g, &cum).is_empty());
}

#[test]
fn test_curated_store_survives_tsv_round_trip() {
    let (mut g, inputs) = sample();
    let cfg = CurationConfig {
        root: "root".into(),
        ..CurationConfig::default()
    };
    curate(&mut g, &cfg, &inputs);

    let mut buf = Vec::new();
    g.write_to(&mut buf).unwrap();
    let back = GraphStore::read_from(buf.as_slice()).unwrap();
    assert_eq!(back.edges(), g.edges());
    assert_eq!(back.subsumptions(), g.subsumptions());
    assert!(back.is_manual_top_level("Bacteria"));
    assert!(back.is_synthetic_other(GLOBAL));
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let depth = 50_000;
    let mut g = GraphStore::new();
    g.ensure_node("root");
    let mut parent = "root".to_string();
    for i in 0..depth {
        let id = format!("n{}", i);
        g.set_parent(&id, &parent);
        parent = id;
    }
    let inputs = weights(&[(parent.as_str(), 7)]);
    let report = curate(&mut g, &config(), &inputs);

    assert_eq!(report.cumulative.get("root"), 7);
    // The whole chain above the leaf collapses into one survivor.
    assert_eq!(g.ancestors(&parent).len(), 2);
}

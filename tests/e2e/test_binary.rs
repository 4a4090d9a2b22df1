//! Integration tests for the taxon-curate binary.
//!
//! These tests run the compiled binary on small statement tables written to
//! a scratch directory and read the results back through the library.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use taxon_curate::GraphStore;

const ROOT: &str = "OBI:0100026";
const GLOBAL: &str = "iedb-taxon:0100026-other";

/// root <- 1 <- 2 <- 3
const CHAIN: &str = "stanza\tsubject\tpredicate\tobject\tvalue\n\
OBI:0100026\tOBI:0100026\trdfs:label\t\torganism\n\
NCBITaxon:1\tNCBITaxon:1\trdfs:subClassOf\tOBI:0100026\t\n\
NCBITaxon:2\tNCBITaxon:2\trdfs:subClassOf\tNCBITaxon:1\t\n\
NCBITaxon:3\tNCBITaxon:3\trdfs:subClassOf\tNCBITaxon:2\t\n\
NCBITaxon:3\tNCBITaxon:3\trdfs:label\t\tleaf\n";

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_taxon-curate"))
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("cannot write fixture");
    path
}

/// Run the binary with `args`, feeding `stdin` if given.
fn run_binary(args: &[&str], stdin: Option<&str>) -> Output {
    Command::new(binary_path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            use std::io::Write;
            if let (Some(input), Some(pipe)) = (stdin, child.stdin.as_mut()) {
                pipe.write_all(input.as_bytes()).ok();
            }
            drop(child.stdin.take());
            child.wait_with_output()
        })
        .expect("Failed to run binary")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "Binary exited with {:?}:\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_curate_collapses_chain() {
    let dir = tempfile::tempdir().unwrap();
    let store = write(dir.path(), "store.tsv", CHAIN);
    let weights = write(dir.path(), "weights.tsv", "id\tcount\n3\t5\n");
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "curate",
            store.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_success(&output);

    let g = GraphStore::load(&out).unwrap();
    assert!(!g.contains("NCBITaxon:1"));
    assert_eq!(g.parent("NCBITaxon:2"), Some(ROOT));
    assert_eq!(g.parent("NCBITaxon:3"), Some("NCBITaxon:2"));
    assert_eq!(g.parent(GLOBAL), Some(ROOT));
    assert_eq!(g.label(GLOBAL), Some("Other organism"));
    assert_eq!(g.node("NCBITaxon:2").unwrap().subsumes, vec!["NCBITaxon:1"]);
    assert!(g.is_precious("NCBITaxon:3"));
}

#[test]
fn test_missing_reference_exits_2_after_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = write(dir.path(), "store.tsv", CHAIN);
    let weights = write(dir.path(), "weights.tsv", "3\t5\n999\t1\n");
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "propagate-weights",
            store.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NCBITaxon:999"), "stderr: {}", stderr);
    assert!(out.exists());
}

#[test]
fn test_propagate_writes_table_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let store = write(dir.path(), "store.tsv", CHAIN);
    let weights = write(dir.path(), "weights.tsv", "3\t5\n");
    let table = dir.path().join("cumulative.tsv");
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "propagate-weights",
            store.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
            "--table",
            table.to_str().unwrap(),
            "--annotate-labels",
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_success(&output);

    let text = fs::read_to_string(&table).unwrap();
    assert!(text.starts_with("id\tcumulative\n"));
    assert!(text.contains("NCBITaxon:1\t5\n"));
    assert!(text.contains("OBI:0100026\t5\n"));

    let g = GraphStore::load(&out).unwrap();
    assert_eq!(g.label("NCBITaxon:3"), Some("leaf (5)"));
    assert_eq!(g.parent("NCBITaxon:2"), Some("NCBITaxon:1"));
}

#[test]
fn test_collapse_reads_stdin_writes_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let weights = write(dir.path(), "weights.tsv", "3\t5\n");

    let output = run_binary(
        &["collapse-chains", "--weights", weights.to_str().unwrap()],
        Some(CHAIN),
    );
    assert_success(&output);

    let g = GraphStore::read_from(output.stdout.as_slice()).unwrap();
    assert!(!g.contains("NCBITaxon:1"));
    assert_eq!(g.parent("NCBITaxon:2"), Some(ROOT));
}

#[test]
fn test_organize_with_directive_table() {
    let dir = tempfile::tempdir().unwrap();
    let store = write(dir.path(), "store.tsv", CHAIN);
    let directives = write(
        dir.path(),
        "top.tsv",
        "ID\tParent ID\tChild Rank\tOther Rank\tExtra Nodes\tLabel\n\
         3\tOBI:0100026\t\t\t\tLeaf group\n",
    );
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "organize-top-level",
            store.to_str().unwrap(),
            "--directives",
            directives.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_success(&output);

    let g = GraphStore::load(&out).unwrap();
    assert_eq!(g.parent("NCBITaxon:3"), Some(ROOT));
    assert!(g.is_manual_top_level("NCBITaxon:3"));
    assert_eq!(g.label("NCBITaxon:3"), Some("Leaf group"));
}

#[test]
fn test_rehome_moves_low_share_children() {
    let dir = tempfile::tempdir().unwrap();
    let store = write(
        dir.path(),
        "store.tsv",
        "stanza\tsubject\tpredicate\tobject\tvalue\n\
         NCBITaxon:10\tNCBITaxon:10\trdfs:subClassOf\tOBI:0100026\t\n\
         NCBITaxon:11\tNCBITaxon:11\trdfs:subClassOf\tNCBITaxon:10\t\n\
         NCBITaxon:12\tNCBITaxon:12\trdfs:subClassOf\tNCBITaxon:10\t\n\
         NCBITaxon:13\tNCBITaxon:13\trdfs:subClassOf\tNCBITaxon:10\t\n",
    );
    let weights = write(dir.path(), "weights.tsv", "11\t98\n12\t1\n13\t1\n");
    let config = write(dir.path(), "curate.toml", "precious_from_weights = false\n");
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "rehome",
            store.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--min-ratio",
            "0.02",
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_success(&output);

    let g = GraphStore::load(&out).unwrap();
    let aggregate = "iedb-taxon:10-other";
    assert_eq!(g.parent(aggregate), Some("NCBITaxon:10"));
    assert!(g.is_synthetic_other(aggregate));
    assert_eq!(g.children(aggregate), vec!["NCBITaxon:12", "NCBITaxon:13"]);
    assert_eq!(g.parent("NCBITaxon:11"), Some("NCBITaxon:10"));
}

#[test]
fn test_prune_sends_dead_branch_to_global_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let table = format!(
        "{}NCBITaxon:4\tNCBITaxon:4\trdfs:subClassOf\tNCBITaxon:1\t\n",
        CHAIN
    );
    let store = write(dir.path(), "store.tsv", &table);
    let weights = write(dir.path(), "weights.tsv", "3\t5\n");
    let out = dir.path().join("out.tsv");

    let output = run_binary(
        &[
            "prune-dead-branches",
            store.to_str().unwrap(),
            "--weights",
            weights.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ],
        None,
    );
    assert_success(&output);

    let g = GraphStore::load(&out).unwrap();
    assert_eq!(g.parent("NCBITaxon:4"), Some(GLOBAL));
    assert_eq!(g.parent(GLOBAL), Some(ROOT));
    assert_eq!(g.parent("NCBITaxon:3"), Some("NCBITaxon:2"));
    assert_eq!(g.parent("NCBITaxon:1"), Some(ROOT));
}

#[test]
fn test_version_flag() {
    let output = run_binary(&["--version"], None);
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("taxon-curate "));
}

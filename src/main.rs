//! taxon-curate CLI entry point.
//!
//! Every pass can run on its own; `curate` runs the whole pipeline.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use taxon_curate::curate::organize::Directive;
use taxon_curate::inputs;
use taxon_curate::{
    CollapsePolicy, CumulativeWeights, CurationConfig, CurationInputs, Diagnostics,
    GraphStore, IdScheme, Session, annotate_labels, curate,
};

/// Weight-aware curation of a taxonomic hierarchy.
#[derive(Parser, Debug)]
#[command(
    name = "taxon-curate",
    version = env!("TAXON_CURATE_VERSION"),
    about = "Weight-aware curation of a taxonomic hierarchy"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Raise log verbosity (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Arguments shared by every command.
#[derive(Args, Debug)]
struct Common {
    /// Statement table to read (reads from stdin if not provided)
    store: Option<PathBuf>,

    /// Write the curated store to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Leaf weight table (id, count)
    #[arg(long = "weights")]
    weights: Option<PathBuf>,

    /// Ids that must stay individually addressable
    #[arg(long = "precious")]
    precious: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute cumulative weights
    PropagateWeights {
        #[command(flatten)]
        common: Common,
        /// Write an id/cumulative table to this file
        #[arg(long = "table")]
        table: Option<PathBuf>,
        /// Append cumulative counts to labels
        #[arg(long = "annotate-labels")]
        annotate_labels: bool,
    },
    /// Merge chains of ancestors that add no information
    CollapseChains {
        #[command(flatten)]
        common: Common,
        /// Use the ratio rule with this threshold instead of exact equality
        #[arg(long = "threshold")]
        threshold: Option<f64>,
    },
    /// Move low-share children into aggregate nodes
    Rehome {
        #[command(flatten)]
        common: Common,
        /// Minimum share of the parent's weight a child needs to stay put
        #[arg(long = "min-ratio")]
        min_ratio: Option<f64>,
    },
    /// Apply the top-level directive table
    OrganizeTopLevel {
        #[command(flatten)]
        common: Common,
        /// Directive table
        #[arg(long = "directives")]
        directives: PathBuf,
    },
    /// Send zero-weight branches to the global aggregate and tidy aggregates
    PruneDeadBranches {
        #[command(flatten)]
        common: Common,
    },
    /// Run every pass in order
    Curate {
        #[command(flatten)]
        common: Common,
        /// Directive table
        #[arg(long = "directives")]
        directives: Option<PathBuf>,
        /// Parent override table (taxon id, parent id)
        #[arg(long = "parent-overrides")]
        parent_overrides: Option<PathBuf>,
        /// Write an id/cumulative table to this file
        #[arg(long = "table")]
        table: Option<PathBuf>,
        /// Append cumulative counts to labels
        #[arg(long = "annotate-labels")]
        annotate_labels: bool,
    },
}

impl Command {
    fn common(&self) -> &Common {
        match self {
            Command::PropagateWeights { common, .. }
            | Command::CollapseChains { common, .. }
            | Command::Rehome { common, .. }
            | Command::OrganizeTopLevel { common, .. }
            | Command::PruneDeadBranches { common }
            | Command::Curate { common, .. } => common,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn read_store(path: Option<&Path>) -> Result<GraphStore> {
    match path {
        Some(path) => GraphStore::load(path)
            .with_context(|| format!("cannot read store '{}'", path.display())),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("cannot read stdin")?;
            GraphStore::read_from(buf.as_slice()).context("cannot parse store from stdin")
        }
    }
}

fn write_store(store: &GraphStore, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => store
            .save(path)
            .with_context(|| format!("cannot write '{}'", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            store.write_to(&mut handle).context("cannot write stdout")?;
            handle.flush().context("cannot flush stdout")
        }
    }
}

fn write_table(cumulative: &CumulativeWeights, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("cannot create '{}'", path.display()))?;
    cumulative
        .write_table(file)
        .with_context(|| format!("cannot write '{}'", path.display()))
}

fn load_directives(path: &Path, ids: &IdScheme) -> Result<Vec<Directive>> {
    inputs::load_directives(path, ids)
        .with_context(|| format!("cannot read directives '{}'", path.display()))
}

/// Print every diagnostic and choose the exit status.
fn report(diagnostics: &Diagnostics) -> i32 {
    for d in diagnostics.iter() {
        eprintln!("diagnostic: {}", d);
    }
    if diagnostics.has_missing_references() { 2 } else { 0 }
}

fn run(command: Command) -> Result<i32> {
    let common = command.common();
    let config = match &common.config {
        Some(path) => CurationConfig::load(path)
            .with_context(|| format!("cannot read config '{}'", path.display()))?,
        None => CurationConfig::default(),
    };
    let ids = IdScheme::from_config(&config).context("invalid local id pattern")?;

    let mut store = read_store(common.store.as_deref())?;
    info!("loaded {} nodes, {} edges", store.node_count(), store.edge_count());

    let mut collaborators = CurationInputs::default();
    if let Some(path) = &common.weights {
        collaborators.weights = inputs::load_weights(path, &ids, &config.excluded_ids)
            .with_context(|| format!("cannot read weights '{}'", path.display()))?;
    }
    if let Some(path) = &common.precious {
        collaborators.precious = inputs::load_precious(path, &ids)
            .with_context(|| format!("cannot read precious list '{}'", path.display()))?;
    }

    let diagnostics = match &command {
        Command::PropagateWeights {
            table,
            annotate_labels: annotate,
            ..
        } => {
            let mut session = Session::start(&config, &collaborators, &mut store);
            let cumulative = session.propagate(&store);
            if let Some(path) = table {
                write_table(&cumulative, path)?;
            }
            if *annotate {
                annotate_labels(&mut store, &cumulative);
            }
            session.finish()
        }
        Command::CollapseChains { threshold, .. } => {
            let policy = match threshold {
                Some(t) => CollapsePolicy::ratio(*t),
                None => CollapsePolicy::from_config(&config.collapse),
            };
            let mut session = Session::start(&config, &collaborators, &mut store);
            session.collapse(&mut store, policy);
            session.finish()
        }
        Command::Rehome { min_ratio, .. } => {
            let min_ratio = min_ratio.unwrap_or(config.rehome.min_ratio);
            let mut session = Session::start(&config, &collaborators, &mut store);
            session.rehome(&mut store, min_ratio);
            session.finish()
        }
        Command::OrganizeTopLevel { directives, .. } => {
            collaborators.directives = load_directives(directives, &ids)?;
            let mut session = Session::start(&config, &collaborators, &mut store);
            session.organize(&mut store);
            session.finish()
        }
        Command::PruneDeadBranches { .. } => {
            let mut session = Session::start(&config, &collaborators, &mut store);
            session.prune(&mut store);
            session.finish()
        }
        Command::Curate {
            directives,
            parent_overrides,
            table,
            annotate_labels: annotate,
            ..
        } => {
            if let Some(path) = directives {
                collaborators.directives = load_directives(path, &ids)?;
            }
            if let Some(path) = parent_overrides {
                collaborators.parent_overrides = inputs::load_parent_overrides(path, &ids)
                    .with_context(|| format!("cannot read parent overrides '{}'", path.display()))?;
            }
            let report = curate(&mut store, &config, &collaborators);
            if let Some(path) = table {
                write_table(&report.cumulative, path)?;
            }
            if *annotate {
                annotate_labels(&mut store, &report.cumulative);
            }
            report.diagnostics
        }
    };

    write_store(&store, common.output.as_deref())?;
    Ok(report(&diagnostics))
}

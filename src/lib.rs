//! taxon-curate: weight-aware curation of large taxonomic hierarchies.
//!
//! Public API: [`GraphStore`] to load and save a hierarchy, [`curate`] to
//! run the full pipeline, and [`Session`] to run individual passes.

pub mod config;
pub mod curate;
pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod inputs;
pub mod store;

pub use config::{CollapseRule, CurationConfig};
pub use curate::collapse::CollapsePolicy;
pub use curate::organize::{ChildPolicy, Directive};
pub use curate::pipeline::{CurationInputs, CurationReport, Session, annotate_labels, curate};
pub use curate::weights::{CumulativeWeights, propagate};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{CurateError, Result};
pub use ids::IdScheme;
pub use store::{GraphStore, NodeData, Rank};

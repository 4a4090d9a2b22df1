//! Non-fatal diagnostics collected during a curation run.
//!
//! None of these abort the run. They are gathered in a [`Diagnostics`]
//! accumulator that every pass receives by `&mut`, and surfaced once the
//! run finishes.

use std::fmt;

use tracing::warn;

/// Which collaborator input referenced an identifier the store lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    Weights,
    Precious,
    Directive,
    ParentOverride,
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceSource::Weights => "weight table",
            ReferenceSource::Precious => "precious list",
            ReferenceSource::Directive => "top-level directives",
            ReferenceSource::ParentOverride => "parent overrides",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An input table names a node absent from the hierarchy.
    MissingReference { source: ReferenceSource, id: String },
    /// Two directives target the same node; the later one was kept.
    DirectiveConflict { target: String },
    /// A parent with cumulative weight 0 was skipped for rehoming.
    ZeroWeightParent { id: String },
    /// An ancestor walk revisited a node.
    Cycle { id: String },
    /// A post-run structural check failed.
    InvariantViolation { id: String, detail: String },
}

impl Diagnostic {
    pub fn is_missing_reference(&self) -> bool {
        matches!(self, Diagnostic::MissingReference { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingReference { source, id } => {
                write!(f, "{id} (from {source}) is missing from the hierarchy")
            }
            Diagnostic::DirectiveConflict { target } => {
                write!(f, "{target} is targeted by more than one directive; the last one wins")
            }
            Diagnostic::ZeroWeightParent { id } => {
                write!(f, "{id} has cumulative weight 0; rehoming skipped")
            }
            Diagnostic::Cycle { id } => write!(f, "cycle detected at {id}"),
            Diagnostic::InvariantViolation { id, detail } => write!(f, "{id}: {detail}"),
        }
    }
}

/// Accumulator for [`Diagnostic`]s, in the order they were raised.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn missing(&mut self, source: ReferenceSource, id: impl Into<String>) {
        self.push(Diagnostic::MissingReference {
            source,
            id: id.into(),
        });
    }

    pub fn violation(&mut self, id: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::InvariantViolation {
            id: id.into(),
            detail: detail.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn has_missing_references(&self) -> bool {
        self.items.iter().any(Diagnostic::is_missing_reference)
    }
}

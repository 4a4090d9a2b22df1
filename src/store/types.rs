//! Graph store data types: ranks, node data, and schema statements.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

// ─── Schema predicates ───────────────────────────────────────────────────────

pub const RDF_TYPE: &str = "rdf:type";
pub const OWL_CLASS: &str = "owl:Class";
pub const SUB_CLASS_OF: &str = "rdfs:subClassOf";
pub const LABEL: &str = "rdfs:label";
pub const HAS_RANK: &str = "ncbitaxon:has_rank";
pub const SUBSUMES: &str = "iedb-taxon:subsumes";
pub const FLAG: &str = "iedb-taxon:flag";

/// Namespace used for rank objects in `has_rank` statements.
pub const RANK_PREFIX: &str = "NCBITaxon:";

// ─── Rank ────────────────────────────────────────────────────────────────────

/// Taxonomic level of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum Rank {
    Superkingdom,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Subspecies,
    Strain,
    /// Any other named level (e.g. "subfamily", "clade").
    Named(String),
}

impl Rank {
    pub fn as_str(&self) -> &str {
        match self {
            Rank::Superkingdom => "superkingdom",
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Subspecies => "subspecies",
            Rank::Strain => "strain",
            Rank::Named(name) => name,
        }
    }

    /// Parse a rank, accepting both `species` and `NCBITaxon:species`.
    ///
    /// Returns `None` for empty input and for "no rank".
    pub fn parse(raw: &str) -> Option<Rank> {
        let name = raw.trim();
        let name = name.rsplit_once(':').map(|(_, n)| n).unwrap_or(name);
        let name = name.trim().to_lowercase();
        let rank = match name.as_str() {
            "" | "none" | "no_rank" | "no rank" => return None,
            "superkingdom" => Rank::Superkingdom,
            "kingdom" => Rank::Kingdom,
            "phylum" => Rank::Phylum,
            "class" => Rank::Class,
            "order" => Rank::Order,
            "family" => Rank::Family,
            "genus" => Rank::Genus,
            "species" => Rank::Species,
            "subspecies" => Rank::Subspecies,
            "strain" => Rank::Strain,
            _ => Rank::Named(name),
        };
        Some(rank)
    }

    /// Object value used in `has_rank` statements.
    pub fn to_curie(&self) -> String {
        format!("{}{}", RANK_PREFIX, self.as_str())
    }
}

impl From<String> for Rank {
    fn from(s: String) -> Self {
        Rank::parse(&s).unwrap_or(Rank::Named(s))
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::parse(s).ok_or_else(|| format!("not a rank: {s:?}"))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Statement ───────────────────────────────────────────────────────────────

/// One row of the statement table: `(stanza, subject, predicate, object, value)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub stanza: String,
    pub subject: String,
    pub predicate: String,
    pub object: Option<String>,
    pub value: Option<String>,
}

impl Statement {
    /// Statement about `id` itself with an object.
    pub fn object(id: &str, predicate: &str, object: impl Into<String>) -> Self {
        Self {
            stanza: id.to_string(),
            subject: id.to_string(),
            predicate: predicate.to_string(),
            object: Some(object.into()),
            value: None,
        }
    }

    /// Statement about `id` itself with a literal value.
    pub fn literal(id: &str, predicate: &str, value: impl Into<String>) -> Self {
        Self {
            stanza: id.to_string(),
            subject: id.to_string(),
            predicate: predicate.to_string(),
            object: None,
            value: Some(value.into()),
        }
    }
}

// ─── Node flags ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Precious,
    ManualTopLevel,
    SyntheticOther,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Precious => "precious",
            Flag::ManualTopLevel => "manual-top-level",
            Flag::SyntheticOther => "synthetic-other",
        }
    }

    pub fn parse(s: &str) -> Option<Flag> {
        match s.trim() {
            "precious" => Some(Flag::Precious),
            "manual-top-level" => Some(Flag::ManualTopLevel),
            "synthetic-other" => Some(Flag::SyntheticOther),
            _ => None,
        }
    }
}

// ─── NodeData ────────────────────────────────────────────────────────────────

/// Per-node metadata held by the graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub id: String,
    pub label: Option<String>,
    pub rank: Option<Rank>,
    pub precious: bool,
    pub synthetic_other: bool,
    pub manual_top_level: bool,
    /// Ids of nodes merged into this one.
    pub subsumes: Vec<String>,
    /// Statements the engine does not interpret (synonyms, label sources, ...).
    pub extra: Vec<Statement>,
}

impl NodeData {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let synthetic_other = crate::ids::is_aggregate_id(&id);
        Self {
            id,
            label: None,
            rank: None,
            precious: false,
            synthetic_other,
            manual_top_level: false,
            subsumes: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label for display, falling back to the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Precious => self.precious,
            Flag::ManualTopLevel => self.manual_top_level,
            Flag::SyntheticOther => self.synthetic_other,
        }
    }

    pub fn set_flag(&mut self, flag: Flag, on: bool) {
        match flag {
            Flag::Precious => self.precious = on,
            Flag::ManualTopLevel => self.manual_top_level = on,
            Flag::SyntheticOther => self.synthetic_other = on,
        }
    }
}

/// Provenance record: `survivor` absorbed `removed` during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsumption {
    pub survivor: String,
    pub removed: String,
}

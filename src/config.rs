//! Configuration for the curation pipeline.
//!
//! Every field has a default, so an empty (or absent) TOML file yields the
//! stock configuration. CLI flags override individual values afterwards.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::store::types::Rank;

/// How the Chain Collapser decides that an ancestor adds no information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseRule {
    /// Parent and child have exactly the same cumulative weight.
    #[default]
    Equal,
    /// `cumulative(child) / cumulative(parent)` is above the threshold.
    Ratio,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    pub policy: CollapseRule,
    /// Only read when `policy = "ratio"`.
    pub threshold: f64,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            policy: CollapseRule::Equal,
            threshold: 0.99,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RehomeConfig {
    /// Children below this share of their parent's cumulative weight are rehomed.
    pub min_ratio: f64,
    /// Explicit rehoming start nodes. Empty = derive from the directives.
    pub start_nodes: Vec<String>,
    /// Ranks at which rehoming stops descending.
    pub terminal_ranks: Vec<Rank>,
}

impl Default for RehomeConfig {
    fn default() -> Self {
        Self {
            min_ratio: 0.01,
            start_nodes: Vec::new(),
            terminal_ranks: vec![Rank::Species, Rank::Subspecies],
        }
    }
}

/// Top-level configuration for a curation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// The organism root of the curated tree.
    pub root: String,
    /// Namespace for locally defined taxa and synthetic aggregate nodes.
    pub synthetic_prefix: String,
    /// Namespace for taxa sourced from the external authority.
    pub external_prefix: String,
    /// Bare ids matching this pattern belong to `synthetic_prefix`.
    pub local_id_pattern: String,
    /// Treat every node with non-zero own weight as precious.
    pub precious_from_weights: bool,
    /// Weight table entries dropped on load.
    pub excluded_ids: Vec<String>,
    pub collapse: CollapseConfig,
    pub rehome: RehomeConfig,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            root: "OBI:0100026".to_string(),
            synthetic_prefix: "iedb-taxon".to_string(),
            external_prefix: "NCBITaxon".to_string(),
            local_id_pattern: r"^100\d{5}$".to_string(),
            precious_from_weights: true,
            excluded_ids: Vec::new(),
            collapse: CollapseConfig::default(),
            rehome: RehomeConfig::default(),
        }
    }
}

impl CurationConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Id of the global "Other" bucket hanging off the root.
    pub fn global_other(&self) -> String {
        crate::ids::aggregate_id(&self.synthetic_prefix, &self.root)
    }
}

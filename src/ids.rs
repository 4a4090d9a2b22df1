//! Identifier handling.
//!
//! Node identifiers are namespaced strings (`prefix:local`). Collaborator
//! tables often carry bare numeric tax ids, which [`IdScheme`] resolves to
//! the right namespace.

use regex::Regex;

use crate::config::CurationConfig;
use crate::error::Result;

/// Suffix marking synthetic aggregate ("Other") nodes.
pub const OTHER_SUFFIX: &str = "-other";

/// Part of an identifier after the namespace prefix.
pub fn local_part(id: &str) -> &str {
    id.split_once(':').map(|(_, local)| local).unwrap_or(id)
}

/// Id of the aggregate node belonging to `parent`.
pub fn aggregate_id(synthetic_prefix: &str, parent: &str) -> String {
    format!("{}:{}{}", synthetic_prefix, local_part(parent), OTHER_SUFFIX)
}

/// Aggregate id that keeps the parent's namespace, for parents whose
/// short [`aggregate_id`] already belongs to a parent in another namespace.
pub fn qualified_aggregate_id(synthetic_prefix: &str, parent: &str) -> String {
    format!("{}:{}{}", synthetic_prefix, parent.replace(':', "_"), OTHER_SUFFIX)
}

pub fn is_aggregate_id(id: &str) -> bool {
    id.ends_with(OTHER_SUFFIX)
}

/// Resolves bare ids from input tables to namespaced identifiers.
#[derive(Debug, Clone)]
pub struct IdScheme {
    external_prefix: String,
    local_prefix: String,
    local_pattern: Regex,
}

impl IdScheme {
    pub fn new(external_prefix: &str, local_prefix: &str, local_pattern: &str) -> Result<Self> {
        Ok(Self {
            external_prefix: external_prefix.to_string(),
            local_prefix: local_prefix.to_string(),
            local_pattern: Regex::new(local_pattern)?,
        })
    }

    pub fn from_config(config: &CurationConfig) -> Result<Self> {
        Self::new(
            &config.external_prefix,
            &config.synthetic_prefix,
            &config.local_id_pattern,
        )
    }

    /// Namespace a raw id. Ids that already carry a prefix pass through.
    pub fn resolve(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.contains(':') {
            return raw.to_string();
        }
        if is_aggregate_id(raw) || self.local_pattern.is_match(raw) {
            return format!("{}:{}", self.local_prefix, raw);
        }
        format!("{}:{}", self.external_prefix, raw)
    }
}

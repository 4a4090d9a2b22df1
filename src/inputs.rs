//! Collaborator input tables: leaf weights, the precious list, top-level
//! directives, and parent overrides. All are tab-separated.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::curate::organize::{ChildPolicy, Directive};
use crate::error::{CurateError, Result};
use crate::ids::IdScheme;
use crate::store::types::Rank;

/// `node → own weight`.
pub type WeightMap = HashMap<String, u64>;

fn tsv_reader<R: Read>(reader: R, has_headers: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(reader)
}

fn open(path: &Path) -> Result<std::fs::File> {
    Ok(std::fs::File::open(path)?)
}

// ─── Weight table ─────────────────────────────────────────────────────────────

/// Read `id<TAB>count` rows. A leading header row is skipped, as are rows
/// whose id is `NULL` and ids listed in `excluded`.
pub fn read_weights<R: Read>(reader: R, ids: &IdScheme, excluded: &[String]) -> Result<WeightMap> {
    let mut weights = WeightMap::new();
    for (line, record) in tsv_reader(reader, false).records().enumerate() {
        let record = record?;
        let raw_id = record.get(0).unwrap_or("").trim();
        let raw_count = record.get(1).unwrap_or("").trim();
        if raw_id.is_empty() || raw_id == "NULL" {
            continue;
        }
        let count: u64 = match raw_count.parse() {
            Ok(c) => c,
            Err(_) if line == 0 => {
                debug!("skipping weight table header: {raw_id}\t{raw_count}");
                continue;
            }
            Err(_) => {
                return Err(CurateError::invalid(format!(
                    "weight table row {}: {raw_count:?} is not a count",
                    line + 1
                )));
            }
        };
        let id = ids.resolve(raw_id);
        if excluded.iter().any(|e| *e == id || e == raw_id) {
            continue;
        }
        *weights.entry(id).or_insert(0) += count;
    }
    Ok(weights)
}

pub fn load_weights(path: &Path, ids: &IdScheme, excluded: &[String]) -> Result<WeightMap> {
    read_weights(open(path)?, ids, excluded)
}

// ─── Precious list ────────────────────────────────────────────────────────────

/// Read designated precious ids from the first column.
pub fn read_precious<R: Read>(reader: R, ids: &IdScheme) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for record in tsv_reader(reader, false).records() {
        let record = record?;
        let raw = record.get(0).unwrap_or("").trim();
        if raw.is_empty() {
            continue;
        }
        out.push(ids.resolve(raw));
    }
    Ok(out)
}

pub fn load_precious(path: &Path, ids: &IdScheme) -> Result<Vec<String>> {
    read_precious(open(path)?, ids)
}

// ─── Directive table ──────────────────────────────────────────────────────────

fn split_list(raw: Option<&String>, ids: &IdScheme) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(|x| ids.resolve(x))
            .collect()
    })
    .unwrap_or_default()
}

fn column<'a>(row: &'a BTreeMap<String, String>, name: &str) -> Option<&'a String> {
    row.get(name).filter(|v| !v.trim().is_empty())
}

/// Read the ordered directive table. Columns are matched by header name:
/// `ID`, `Parent ID`, `Child Rank`, `Other Rank`, `Extra Nodes`, `Label`,
/// `Manual Children`.
pub fn read_directives<R: Read>(reader: R, ids: &IdScheme) -> Result<Vec<Directive>> {
    let mut rdr = tsv_reader(reader, true);
    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<BTreeMap<String, String>>().enumerate() {
        let row = row?;
        let target = column(&row, "ID")
            .map(|v| ids.resolve(v))
            .ok_or_else(|| CurateError::invalid(format!("directive row {}: missing ID", line + 1)))?;
        let parent = column(&row, "Parent ID")
            .map(|v| ids.resolve(v))
            .ok_or_else(|| {
                CurateError::invalid(format!("directive row {}: missing Parent ID", line + 1))
            })?;
        let child_rank = column(&row, "Child Rank").map(|s| s.trim().to_lowercase());
        let policy = match child_rank.as_deref() {
            None => ChildPolicy::Keep,
            Some("manual") => {
                let fallback_rank = match column(&row, "Other Rank").map(|s| s.trim()) {
                    None => Some(Rank::Species),
                    Some(raw) => Rank::parse(raw),
                };
                ChildPolicy::Manual {
                    children: split_list(column(&row, "Manual Children"), ids),
                    fallback_rank,
                }
            }
            Some(raw) => {
                let rank = Rank::parse(raw).ok_or_else(|| {
                    CurateError::invalid(format!("directive row {}: bad Child Rank {raw:?}", line + 1))
                })?;
                ChildPolicy::PromoteRank {
                    rank,
                    extras: split_list(column(&row, "Extra Nodes"), ids),
                }
            }
        };
        out.push(Directive {
            target,
            parent,
            label: column(&row, "Label").cloned(),
            policy,
        });
    }
    Ok(out)
}

pub fn load_directives(path: &Path, ids: &IdScheme) -> Result<Vec<Directive>> {
    read_directives(open(path)?, ids)
}

// ─── Parent overrides ─────────────────────────────────────────────────────────

/// Read `Taxon ID<TAB>Parent ID` rows (with header) as `(child, parent)` pairs.
pub fn read_parent_overrides<R: Read>(reader: R, ids: &IdScheme) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (line, record) in tsv_reader(reader, true).records().enumerate() {
        let record = record?;
        let (Some(child), Some(parent)) = (record.get(0), record.get(1)) else {
            return Err(CurateError::invalid(format!(
                "parent override row {}: expected two columns",
                line + 1
            )));
        };
        if child.trim().is_empty() || parent.trim().is_empty() {
            continue;
        }
        out.push((ids.resolve(child), ids.resolve(parent)));
    }
    Ok(out)
}

pub fn load_parent_overrides(path: &Path, ids: &IdScheme) -> Result<Vec<(String, String)>> {
    read_parent_overrides(open(path)?, ids)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurationConfig;

    fn scheme() -> IdScheme {
        IdScheme::from_config(&CurationConfig::default()).unwrap()
    }

    #[test]
    fn test_weights_with_header_and_null() {
        let text = "Taxon ID\tCount\n9606\t12\nNULL\t4\n10000001\t3\n";
        let w = read_weights(text.as_bytes(), &scheme(), &[]).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w["NCBITaxon:9606"], 12);
        assert_eq!(w["iedb-taxon:10000001"], 3);
    }

    #[test]
    fn test_weights_excluded() {
        let text = "694009\t5\n9606\t1\n";
        let w = read_weights(text.as_bytes(), &scheme(), &["NCBITaxon:694009".into()]).unwrap();
        assert_eq!(w.len(), 1);
        assert!(!w.contains_key("NCBITaxon:694009"));
    }

    #[test]
    fn test_weights_bad_count_is_error() {
        let text = "9606\t12\n562\tmany\n";
        assert!(read_weights(text.as_bytes(), &scheme(), &[]).is_err());
    }

    #[test]
    fn test_precious_list() {
        let text = "9606\n\n# comment\nOBI:0100026\textra\n";
        let p = read_precious(text.as_bytes(), &scheme()).unwrap();
        assert_eq!(p, vec!["NCBITaxon:9606", "OBI:0100026"]);
    }

    #[test]
    fn test_directives_policies() {
        let text = "ID\tLabel\tParent ID\tChild Rank\tOther Rank\tExtra Nodes\n\
                    2\tbacterium\tOBI:0100026\tgenus\t\t1234, 5678\n\
                    33208\tanimal\tOBI:0100026\tmanual\tnone\t\n\
                    10239\tvirus\tNCBITaxon:1\t\t\t\n";
        let d = read_directives(text.as_bytes(), &scheme()).unwrap();
        assert_eq!(d.len(), 3);
        assert_eq!(d[0].target, "NCBITaxon:2");
        assert_eq!(d[0].label.as_deref(), Some("bacterium"));
        assert_eq!(
            d[0].policy,
            ChildPolicy::PromoteRank {
                rank: Rank::Genus,
                extras: vec!["NCBITaxon:1234".into(), "NCBITaxon:5678".into()],
            }
        );
        assert_eq!(
            d[1].policy,
            ChildPolicy::Manual {
                children: vec![],
                fallback_rank: None
            }
        );
        assert_eq!(d[2].policy, ChildPolicy::Keep);
        assert_eq!(d[2].parent, "NCBITaxon:1");
    }

    #[test]
    fn test_directive_manual_default_species() {
        let text = "ID\tParent ID\tChild Rank\tManual Children\n7742\tOBI:0100026\tmanual\t40674,8782\n";
        let d = read_directives(text.as_bytes(), &scheme()).unwrap();
        assert_eq!(
            d[0].policy,
            ChildPolicy::Manual {
                children: vec!["NCBITaxon:40674".into(), "NCBITaxon:8782".into()],
                fallback_rank: Some(Rank::Species),
            }
        );
    }

    #[test]
    fn test_directive_missing_parent_is_error() {
        let text = "ID\tParent ID\n2\t\n";
        assert!(read_directives(text.as_bytes(), &scheme()).is_err());
    }

    #[test]
    fn test_parent_overrides() {
        let text = "Taxon ID\tParent ID\n562\t543\n\t\n";
        let o = read_parent_overrides(text.as_bytes(), &scheme()).unwrap();
        assert_eq!(o, vec![("NCBITaxon:562".to_string(), "NCBITaxon:543".to_string())]);
    }
}

//! Tab-separated persistence for the statement table.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::graph::GraphStore;
use super::types::Statement;
use crate::error::Result;

/// On-disk row. Extra columns (datatype, language) are ignored on read.
#[derive(Debug, Serialize, Deserialize)]
struct StatementRow {
    stanza: String,
    #[serde(default)]
    subject: Option<String>,
    predicate: String,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl From<StatementRow> for Statement {
    fn from(row: StatementRow) -> Self {
        let subject = row.subject.unwrap_or_else(|| row.stanza.clone());
        Statement {
            stanza: row.stanza,
            subject,
            predicate: row.predicate,
            object: row.object.filter(|s| !s.is_empty()),
            value: row.value.filter(|s| !s.is_empty()),
        }
    }
}

impl From<&Statement> for StatementRow {
    fn from(st: &Statement) -> Self {
        StatementRow {
            stanza: st.stanza.clone(),
            subject: Some(st.subject.clone()),
            predicate: st.predicate.clone(),
            object: st.object.clone(),
            value: st.value.clone(),
        }
    }
}

/// Read statements from a TSV source with a header row.
pub fn read_statements<R: Read>(reader: R) -> Result<Vec<Statement>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize::<StatementRow>() {
        out.push(row?.into());
    }
    Ok(out)
}

/// Write statements as TSV with a header row.
pub fn write_statements<W: Write>(writer: W, statements: &[Statement]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for st in statements {
        wtr.serialize(StatementRow::from(st))?;
    }
    wtr.flush()?;
    Ok(())
}

impl GraphStore {
    /// Load a store from a TSV statement file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(file)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::from_statements(read_statements(reader)?))
    }

    /// Write the store as a TSV statement file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        write_statements(writer, &self.statements())
    }
}

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::table::Table;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Column names forming the (state_abbreviation, state_name, municipality)
/// join key shared by every dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyColumns {
    #[serde(default = "default_abbreviation_column")]
    pub state_abbreviation: String,
    #[serde(default = "default_state_name_column")]
    pub state_name: String,
    #[serde(default = "default_municipality_column")]
    pub municipality: String,
}

fn default_abbreviation_column() -> String {
    "state_abbreviation".into()
}

fn default_state_name_column() -> String {
    "state_name".into()
}

fn default_municipality_column() -> String {
    "municipality".into()
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            state_abbreviation: default_abbreviation_column(),
            state_name: default_state_name_column(),
            municipality: default_municipality_column(),
        }
    }
}

impl KeyColumns {
    /// Key columns in join order.
    pub fn all(&self) -> [&str; 3] {
        [
            self.state_abbreviation.as_str(),
            self.state_name.as_str(),
            self.municipality.as_str(),
        ]
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.all().iter().map(|c| c.to_string()).collect()
    }

    /// Resolve the three key column indices in `table`.
    pub fn indices(&self, table: &Table) -> Result<[usize; 3], PipelineError> {
        Ok([
            table.column_index(&self.state_abbreviation)?,
            table.column_index(&self.state_name)?,
            table.column_index(&self.municipality)?,
        ])
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The key triple of one row. In the master registry the
/// (state_abbreviation, municipality_name) pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MunicipalityRecord {
    pub state_abbreviation: String,
    pub state_name: String,
    pub municipality_name: String,
}

impl MunicipalityRecord {
    /// Extract one record per row, in table order.
    pub fn from_table(table: &Table, keys: &KeyColumns) -> Result<Vec<Self>, PipelineError> {
        let [abbr, name, muni] = keys.indices(table)?;
        Ok((0..table.len())
            .map(|row| Self {
                state_abbreviation: table.text(row, abbr),
                state_name: table.text(row, name),
                municipality_name: table.text(row, muni),
            })
            .collect())
    }
}

impl fmt::Display for MunicipalityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.state_abbreviation, self.state_name, self.municipality_name)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Master,
    Comparison,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Comparison => write!(f, "comparison"),
        }
    }
}

/// One row whose municipality name exists, verbatim, on only one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivergenceEntry {
    pub origin: Origin,
    pub state_abbreviation: String,
    pub state_name: String,
    pub municipality_name: String,
    pub row_index: usize,
    pub resolved: bool,
}

impl fmt::Display for DivergenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] row {}: {} ({}) {:?}",
            self.origin, self.row_index, self.state_abbreviation, self.state_name, self.municipality_name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Ratio,
    Containment,
}

/// A comparison-side name rewritten to the master spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub state_abbreviation: String,
    pub master_name: String,
    pub comparison_name: String,
    pub master_row: usize,
    pub comparison_row: usize,
    pub rule: MatchRule,
    pub score: u8,
}

// ---------------------------------------------------------------------------
// Positional validation
// ---------------------------------------------------------------------------

/// A key-column mismatch between a table and the reference at one position.
/// `None` means the row does not exist on that side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PositionalDivergence {
    pub table_id: String,
    pub position: usize,
    pub expected: Option<String>,
    pub found: Option<String>,
}

impl fmt::Display for PositionalDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| match v {
            Some(s) => format!("{s:?}"),
            None => "<missing>".to_string(),
        };
        write!(
            f,
            "{} @ {}: expected {}, found {}",
            self.table_id,
            self.position,
            show(&self.expected),
            show(&self.found)
        )
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Raw data loaded for one configured source.
#[derive(Debug, Clone)]
pub enum SourceData {
    Table(Table),
    /// One table per period, each named by its period id.
    Periods(Vec<Table>),
}

impl SourceData {
    pub fn row_count(&self) -> usize {
        match self {
            Self::Table(t) => t.len(),
            Self::Periods(p) => p.iter().map(Table::len).sum(),
        }
    }
}

/// Everything the pipeline reads, already loaded. Sources are keyed by
/// their configured name.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub states: Table,
    pub master: Table,
    pub sources: HashMap<String, SourceData>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub rows_in: usize,
    pub duplicates_removed: usize,
    pub rows_out: usize,
    pub resolutions: Vec<Resolution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub meta: RunMeta,
    pub municipalities: Table,
    pub merged: Table,
    pub sources: Vec<SourceReport>,
}

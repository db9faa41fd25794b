use std::cmp::Ordering;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A single field value. `Eq` + `Hash` are total so whole rows can be
/// compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(OrderedFloat<f64>),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        Self::Number(OrderedFloat(n))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.0),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{}", n.0),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(n.0),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Named columns plus rows of cells. Every row is exactly as wide as
/// `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals; empty strings become `Cell::Empty`.
    pub fn from_text_rows(name: &str, columns: &[&str], rows: &[Vec<&str>]) -> Self {
        let mut table = Self::new(name, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|v| Cell::from(*v)).collect());
        }
        table
    }

    /// Parse delimited text; the first record is the header. Header names
    /// are trimmed, empty fields become `Cell::Empty`, short rows are padded.
    pub fn from_csv(name: &str, data: &str, delimiter: u8) -> Result<Self, PipelineError> {
        let unavailable = |reason: String| PipelineError::SourceUnavailable {
            source: name.to_string(),
            reason,
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers = reader.headers().map_err(|e| unavailable(e.to_string()))?;
        if headers.is_empty() {
            return Err(unavailable("no header row".into()));
        }
        let mut table = Self::new(name, headers.iter().map(|h| h.trim().to_string()).collect());
        for result in reader.records() {
            let record = result.map_err(|e| unavailable(e.to_string()))?;
            table.push_row(record.iter().map(Cell::from).collect());
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row, padding with `Empty` or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn find_column(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn column_index(&self, column: &str) -> Result<usize, PipelineError> {
        self.find_column(column).ok_or_else(|| PipelineError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.find_column(column).is_some()
    }

    /// Text view of a cell: numbers are rendered, empty cells yield "".
    pub fn text(&self, row: usize, col: usize) -> String {
        self.rows[row][col].to_string()
    }

    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        self.rows[row][col] = value;
    }

    /// Append a column filled with `Empty`, returning its index. An existing
    /// column of the same name is reused.
    pub fn add_column(&mut self, column: &str) -> usize {
        if let Some(idx) = self.find_column(column) {
            return idx;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(Cell::Empty);
        }
        self.columns.len() - 1
    }

    /// All values of one column as text, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<String>, PipelineError> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[idx].to_string()).collect())
    }

    /// Project onto the given columns, in the given order.
    pub fn select(&self, columns: &[String]) -> Result<Table, PipelineError> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Table::new(self.name.clone(), columns.to_vec());
        for row in &self.rows {
            out.rows.push(indices.iter().map(|&i| row[i].clone()).collect());
        }
        Ok(out)
    }

    /// Stable sort by the given columns, compared as text.
    pub fn sort_by_columns(&mut self, columns: &[&str]) -> Result<(), PipelineError> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.sort_by(|a, b| {
            for &i in &indices {
                let ord = compare_cells(&a[i], &b[i]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|r| keep(r));
    }
}

fn compare_cells(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

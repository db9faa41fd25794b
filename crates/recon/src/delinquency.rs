//! Consolidation of periodic delinquency sheets into one table.
//!
//! Each period sheet lists, in one column, a state header row (the cell holds
//! the state abbreviation) followed by that state's municipalities, and ends
//! with a grand-total row. Every period must carry the same layout as the
//! reference period; the consolidated table sums paid and opted-in counts
//! per municipality and derives `paid / opted`.

use std::collections::HashSet;

use crate::config::SourceConfig;
use crate::error::PipelineError;
use crate::model::KeyColumns;
use crate::positional::ensure_aligned;
use crate::prepare::{clean_name, parse_number};
use crate::states::StateRegistry;
use crate::table::{Cell, Table};

const HEADER_COLUMN: &str = "state_header";
const ABBR_COLUMN: &str = "state_abbreviation";
const MUNI_COLUMN: &str = "municipality";
const PAID_COLUMN: &str = "paid";
const OPTED_COLUMN: &str = "opted";

pub fn consolidate(
    periods: &[Table],
    source: &SourceConfig,
    keys: &KeyColumns,
    registry: &StateRegistry,
    expected_states: usize,
) -> Result<Table, PipelineError> {
    let reference = source.reference_period.as_deref().ok_or_else(|| {
        PipelineError::ConfigValidation(format!("source '{}': no reference_period", source.name))
    })?;

    let mut header_tables = Vec::with_capacity(periods.len());
    for period in periods {
        header_tables.push(header_marks(period, source, registry, expected_states)?);
    }
    ensure_aligned(&header_tables, HEADER_COLUMN, reference)?;

    let mut period_tables = Vec::with_capacity(periods.len());
    for (period, marks) in periods.iter().zip(&header_tables) {
        period_tables.push(municipality_rows(period, marks, source)?);
    }
    ensure_aligned(&period_tables, MUNI_COLUMN, reference)?;

    let base = period_tables
        .iter()
        .find(|t| t.name == reference)
        .ok_or_else(|| PipelineError::SourceUnavailable {
            source: source.name.clone(),
            reason: format!("reference period '{reference}' was not loaded"),
        })?;

    let d = &source.delinquency;
    let mut columns = keys.to_vec();
    columns.extend([d.paid_column.clone(), d.opted_column.clone(), d.ratio_column.clone()]);
    let mut out = Table::new(source.name.clone(), columns);

    for (row, base_row) in base.rows.iter().enumerate() {
        let mut paid = 0.0;
        let mut opted = 0.0;
        for t in &period_tables {
            paid += t.rows[row][2].as_f64().unwrap_or(0.0);
            opted += t.rows[row][3].as_f64().unwrap_or(0.0);
        }
        let abbr = base_row[0].to_string();
        let state_name = registry.abbreviation_to_name(&abbr)?;
        let ratio = if opted == 0.0 { Cell::Empty } else { Cell::number(paid / opted) };
        out.push_row(vec![
            Cell::text(abbr.clone()),
            Cell::text(state_name),
            base_row[1].clone(),
            Cell::number(paid),
            Cell::number(opted),
            ratio,
        ]);
    }

    log::info!(
        "{}: consolidated {} period(s) into {} municipalities",
        source.name,
        periods.len(),
        out.len()
    );
    Ok(out)
}

/// One-column table marking state header rows with their abbreviation.
fn header_marks(
    period: &Table,
    source: &SourceConfig,
    registry: &StateRegistry,
    expected_states: usize,
) -> Result<Table, PipelineError> {
    let muni_col = period.column_index(&source.municipality_column)?;
    let mut marks = Table::new(period.name.clone(), vec![HEADER_COLUMN.to_string()]);
    let mut count = 0;
    let mut unique = HashSet::new();
    for row in 0..period.len() {
        let value = period.text(row, muni_col).trim().to_uppercase();
        if registry.is_abbreviation(&value) {
            count += 1;
            unique.insert(value.clone());
            marks.push_row(vec![Cell::text(value)]);
        } else {
            marks.push_row(vec![Cell::Empty]);
        }
    }
    if count != expected_states || unique.len() != expected_states {
        return Err(PipelineError::InvariantViolation {
            subject: format!("source '{}' period '{}'", source.name, period.name),
            detail: format!(
                "expected {expected_states} state headers, found {count} ({} unique)",
                unique.len()
            ),
        });
    }
    Ok(marks)
}

/// Municipality rows of one period with their state, paid and opted counts.
/// Header rows, blank rows and the trailing grand total are dropped; empty
/// counts read as 0.
fn municipality_rows(period: &Table, marks: &Table, source: &SourceConfig) -> Result<Table, PipelineError> {
    let muni_col = period.column_index(&source.municipality_column)?;
    let paid_col = column_containing(period, &source.delinquency.paid_match)?;
    let opted_col = column_containing(period, &source.delinquency.opted_match)?;

    let is_header = |row: usize| !marks.rows[row][0].is_empty();
    let is_blank = |row: usize| period.text(row, muni_col).trim().is_empty();
    let total_row = (0..period.len()).rev().find(|&r| !is_blank(r)).filter(|&r| !is_header(r));

    let mut out = Table::new(
        period.name.clone(),
        vec![ABBR_COLUMN.into(), MUNI_COLUMN.into(), PAID_COLUMN.into(), OPTED_COLUMN.into()],
    );
    let mut current: Option<String> = None;
    for row in 0..period.len() {
        if is_blank(row) || Some(row) == total_row {
            continue;
        }
        if is_header(row) {
            current = Some(marks.text(row, 0));
            continue;
        }
        let Some(abbr) = &current else {
            return Err(PipelineError::InvariantViolation {
                subject: format!("source '{}' period '{}'", source.name, period.name),
                detail: format!("row {row} precedes any state header"),
            });
        };
        out.push_row(vec![
            Cell::text(abbr.clone()),
            Cell::text(clean_name(&period.text(row, muni_col))),
            Cell::number(count(period, row, paid_col, source)?),
            Cell::number(count(period, row, opted_col, source)?),
        ]);
    }
    Ok(out)
}

fn column_containing(table: &Table, needle: &str) -> Result<usize, PipelineError> {
    table
        .columns
        .iter()
        .position(|c| c.contains(needle))
        .ok_or_else(|| PipelineError::MissingColumn {
            table: table.name.clone(),
            column: format!("*{needle}*"),
        })
}

fn count(table: &Table, row: usize, col: usize, source: &SourceConfig) -> Result<f64, PipelineError> {
    match &table.rows[row][col] {
        Cell::Empty => Ok(0.0),
        Cell::Number(n) => Ok(n.0),
        Cell::Text(s) if s.trim().is_empty() => Ok(0.0),
        Cell::Text(s) => parse_number(s, source.decimal).ok_or_else(|| PipelineError::ValueParse {
            table: table.name.clone(),
            column: table.columns[col].clone(),
            row,
            value: s.clone(),
        }),
    }
}

//! Shaping raw source tables into key + payload tables.
//!
//! Every prepared table carries the three key columns (abbreviation and
//! state name taken from the registry so they compare equal across
//! datasets) followed by its numeric payload columns.

use crate::config::{DecimalSeparator, MasterConfig, SourceConfig};
use crate::error::PipelineError;
use crate::model::KeyColumns;
use crate::states::StateRegistry;
use crate::table::{Cell, Table};

/// Master registry table: keys only.
pub fn prepare_master(
    raw: &Table,
    config: &MasterConfig,
    keys: &KeyColumns,
    registry: &StateRegistry,
) -> Result<Table, PipelineError> {
    let state_col = raw.column_index(&config.state_column)?;
    let muni_col = raw.column_index(&config.municipality_column)?;

    let mut out = Table::new(raw.name.clone(), keys.to_vec());
    for row in 0..raw.len() {
        let abbr = registry.name_to_abbreviation(&raw.text(row, state_col))?;
        let name = registry.abbreviation_to_name(abbr)?;
        out.push_row(vec![
            Cell::text(abbr),
            Cell::text(name),
            Cell::text(clean_name(&raw.text(row, muni_col))),
        ]);
    }
    log::info!("{}: {} master rows", out.name, out.len());
    Ok(out)
}

/// Comparison table from a single-file source: filter, parse, scale, total,
/// then project onto keys + payload.
pub fn prepare_source(
    raw: &Table,
    source: &SourceConfig,
    keys: &KeyColumns,
    registry: &StateRegistry,
) -> Result<Table, PipelineError> {
    let mut table = raw.clone();
    table.name = source.name.clone();

    if let Some(filter) = &source.filter {
        let col = table.column_index(&filter.column)?;
        let before = table.len();
        table.retain_rows(|r| {
            let value = r[col].to_string();
            filter.values.iter().any(|v| v.as_str() == value.trim())
        });
        log::debug!("{}: filter on '{}' kept {} of {before} rows", source.name, filter.column, table.len());
    }

    let mut numeric: Vec<&String> = source.payload.iter().collect();
    if let Some(scale) = &source.scale {
        numeric.extend(scale.columns.iter());
    }
    for total in &source.totals {
        numeric.extend(total.columns.iter());
    }
    for column in numeric {
        // Total outputs are produced below, not parsed.
        if source.totals.iter().any(|t| &t.into == column) && !table.has_column(column) {
            continue;
        }
        parse_numeric_column(&mut table, column, source.decimal)?;
    }

    if let Some(scale) = &source.scale {
        for column in &scale.columns {
            let col = table.column_index(column)?;
            for row in &mut table.rows {
                if let Some(v) = row[col].as_f64() {
                    row[col] = Cell::number(v * scale.factor);
                }
            }
        }
    }

    for total in &source.totals {
        let parts = total
            .columns
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let into = table.add_column(&total.into);
        for row in &mut table.rows {
            let sum: Option<f64> = parts.iter().map(|&i| row[i].as_f64()).sum();
            row[into] = sum.map(Cell::number).unwrap_or(Cell::Empty);
        }
    }

    let abbr_col = source
        .state_abbreviation_column
        .as_ref()
        .map(|c| table.column_index(c))
        .transpose()?;
    let name_col = source
        .state_name_column
        .as_ref()
        .map(|c| table.column_index(c))
        .transpose()?;
    let muni_col = table.column_index(&source.municipality_column)?;
    let payload = source
        .payload
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = keys.to_vec();
    columns.extend(source.payload.iter().cloned());
    let mut out = Table::new(source.name.clone(), columns);

    for row in 0..table.len() {
        let abbr = match (abbr_col, name_col) {
            (Some(c), _) => {
                let raw_abbr = table.text(row, c).trim().to_uppercase();
                registry.abbreviation_to_name(&raw_abbr)?;
                raw_abbr
            }
            (None, Some(c)) => registry.name_to_abbreviation(&table.text(row, c))?.to_string(),
            (None, None) => {
                return Err(PipelineError::ConfigValidation(format!(
                    "source '{}': no state column configured",
                    source.name
                )))
            }
        };
        let state_name = registry.abbreviation_to_name(&abbr)?.to_string();

        let mut name = clean_name(&table.text(row, muni_col));
        if source.strip_state_suffix {
            name = strip_state_suffix(&name).to_string();
        }

        let mut cells = vec![Cell::text(abbr), Cell::text(state_name), Cell::text(name)];
        cells.extend(payload.iter().map(|&i| table.rows[row][i].clone()));
        out.push_row(cells);
    }

    log::info!("{}: {} rows prepared ({} raw)", out.name, out.len(), raw.len());
    Ok(out)
}

/// Trim and upper-case a municipality name.
pub fn clean_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// "NATAL - RN" -> "NATAL". Names without the suffix are returned as is.
pub fn strip_state_suffix(name: &str) -> &str {
    let t = name.trim_end();
    let bytes = t.as_bytes();
    if bytes.len() < 3 || !bytes[bytes.len() - 2..].iter().all(u8::is_ascii_uppercase) {
        return t;
    }
    match t[..t.len() - 2].trim_end().strip_suffix('-') {
        Some(rest) => rest.trim_end(),
        None => t,
    }
}

/// Replace every cell of `column` with its parsed number; empty stays empty.
pub fn parse_numeric_column(
    table: &mut Table,
    column: &str,
    decimal: DecimalSeparator,
) -> Result<(), PipelineError> {
    let col = table.column_index(column)?;
    for row in 0..table.len() {
        let cell = &table.rows[row][col];
        let parsed = match cell {
            Cell::Empty | Cell::Number(_) => continue,
            Cell::Text(s) if s.trim().is_empty() => Cell::Empty,
            Cell::Text(s) => match parse_number(s, decimal) {
                Some(n) => Cell::number(n),
                None => {
                    return Err(PipelineError::ValueParse {
                        table: table.name.clone(),
                        column: column.to_string(),
                        row,
                        value: s.clone(),
                    })
                }
            },
        };
        table.rows[row][col] = parsed;
    }
    Ok(())
}

/// Parse a number as written in Brazilian government spreadsheets:
/// - Strip `R$` and whitespace
/// - `(123,45)` → `-123.45`
/// - Thousands separator is whichever of `.`/`,` is not the decimal mark
pub fn parse_number(s: &str, decimal: DecimalSeparator) -> Option<f64> {
    let mut t: String = s.trim().replace("R$", "").chars().filter(|c| !c.is_whitespace()).collect();
    let negative = t.starts_with('(') && t.ends_with(')');
    if negative {
        t = t[1..t.len() - 1].to_string();
    }
    let t = match decimal {
        DecimalSeparator::Point => t.replace(',', ""),
        DecimalSeparator::Comma => t.replace('.', "").replace(',', "."),
    };
    if t.is_empty() {
        return None;
    }
    let v: f64 = t.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(if negative { -v } else { v })
}

//! Bidirectional state name ↔ abbreviation lookup.
//!
//! Built once per run from the state source table and passed by reference
//! to every stage that needs it. Immutable after construction.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::StatesConfig;
use crate::dedup::deduplicate;
use crate::error::PipelineError;
use crate::normalize::strip_diacritics;
use crate::table::{Cell, Table};

/// Number of Brazilian federative units (26 states + Distrito Federal).
pub const BRAZILIAN_STATES: usize = 27;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRecord {
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone)]
pub struct StateRegistry {
    records: Vec<StateRecord>,
    by_name: BTreeMap<String, usize>,
    by_abbreviation: BTreeMap<String, usize>,
}

impl StateRegistry {
    /// Build from the raw state source: strip the country prefix from codes,
    /// upper-case, drop duplicate rows, then require exactly `expected`
    /// unique names and unique abbreviations.
    pub fn build(source: &Table, config: &StatesConfig, expected: usize) -> Result<Self, PipelineError> {
        if source.is_empty() {
            return Err(PipelineError::SourceUnavailable {
                source: source.name.clone(),
                reason: "state table has no rows".into(),
            });
        }
        let name_col = source.column_index(&config.name_column)?;
        let code_col = source.column_index(&config.code_column)?;

        let mut cleaned = Table::new(
            source.name.clone(),
            vec![config.name_column.clone(), config.code_column.clone()],
        );
        for row in 0..source.len() {
            let name = source.text(row, name_col).trim().to_uppercase();
            let raw_code = source.text(row, code_col);
            let code = raw_code.trim();
            let code = code.strip_prefix(config.code_prefix.as_str()).unwrap_or(code);
            cleaned.push_row(vec![Cell::text(name), Cell::text(code.trim().to_uppercase())]);
        }
        let (cleaned, _) = deduplicate(cleaned);

        let records = cleaned
            .rows
            .iter()
            .map(|r| StateRecord {
                name: r[0].to_string(),
                abbreviation: r[1].to_string(),
            })
            .collect();
        Self::from_records(records, expected)
    }

    /// Build from already-clean records, enforcing the count invariant.
    pub fn from_records(records: Vec<StateRecord>, expected: usize) -> Result<Self, PipelineError> {
        let unique_names: HashSet<String> = records.iter().map(|r| fold(&r.name)).collect();
        let unique_abbrs: HashSet<&str> = records.iter().map(|r| r.abbreviation.as_str()).collect();

        if records.len() != expected
            || unique_names.len() != expected
            || unique_abbrs.len() != expected
        {
            return Err(PipelineError::InvariantViolation {
                subject: "state registry".into(),
                detail: format!(
                    "expected {expected} states, found {} rows, {} unique names, {} unique abbreviations",
                    records.len(),
                    unique_names.len(),
                    unique_abbrs.len()
                ),
            });
        }

        let mut by_name = BTreeMap::new();
        let mut by_abbreviation = BTreeMap::new();
        for (i, r) in records.iter().enumerate() {
            by_name.insert(fold(&r.name), i);
            by_abbreviation.insert(r.abbreviation.clone(), i);
        }

        log::info!("state registry built with {} states", records.len());
        Ok(Self {
            records,
            by_name,
            by_abbreviation,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StateRecord] {
        &self.records
    }

    /// Lookup ignores case, surrounding whitespace and accents.
    pub fn name_to_abbreviation(&self, name: &str) -> Result<&str, PipelineError> {
        self.by_name
            .get(&fold(name))
            .map(|&i| self.records[i].abbreviation.as_str())
            .ok_or_else(|| PipelineError::UnknownState(name.to_string()))
    }

    pub fn abbreviation_to_name(&self, abbreviation: &str) -> Result<&str, PipelineError> {
        self.by_abbreviation
            .get(abbreviation.trim().to_uppercase().as_str())
            .map(|&i| self.records[i].name.as_str())
            .ok_or_else(|| PipelineError::UnknownState(abbreviation.to_string()))
    }

    pub fn is_abbreviation(&self, value: &str) -> bool {
        self.by_abbreviation.contains_key(value)
    }
}

fn fold(name: &str) -> String {
    strip_diacritics(name.trim()).to_uppercase()
}

use std::fmt;

use crate::model::{DivergenceEntry, PositionalDivergence};

#[derive(Debug)]
pub enum PipelineError {
    /// An upstream collaborator could not supply a table.
    SourceUnavailable { source: String, reason: String },
    /// A structural invariant on a foundational dataset failed.
    InvariantViolation { subject: String, detail: String },
    /// Datasets expected to share row order diverge at one or more indices.
    PositionalMisalignment(Vec<PositionalDivergence>),
    /// Municipality names left unresolved after fuzzy + containment matching.
    UnresolvedReconciliation { dataset: String, divergences: Vec<DivergenceEntry> },
    /// State name or abbreviation not present in the registry.
    UnknownState(String),
    /// Missing required column in a table.
    MissingColumn { table: String, column: String },
    /// Cell could not be parsed as a number.
    ValueParse { table: String, column: String, row: usize, value: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad reference period, alias chain, etc.).
    ConfigValidation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable { source, reason } => {
                write!(f, "source '{source}' unavailable: {reason}")
            }
            Self::InvariantViolation { subject, detail } => {
                write!(f, "invariant violated for {subject}: {detail}")
            }
            Self::PositionalMisalignment(divergences) => {
                writeln!(f, "positional misalignment at {} position(s):", divergences.len())?;
                for d in divergences {
                    writeln!(f, "  {d}")?;
                }
                Ok(())
            }
            Self::UnresolvedReconciliation { dataset, divergences } => {
                writeln!(
                    f,
                    "{} unresolved municipality divergence(s) in '{dataset}':",
                    divergences.len()
                )?;
                for d in divergences {
                    writeln!(f, "  {d}")?;
                }
                Ok(())
            }
            Self::UnknownState(state) => write!(f, "unknown state: '{state}'"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::ValueParse { table, column, row, value } => {
                write!(f, "table '{table}', row {row}, column '{column}': cannot parse number '{value}'")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

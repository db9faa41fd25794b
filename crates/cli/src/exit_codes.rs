//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | pipeline         | Reconciliation pipeline failures         |
//! | 10-19   | output           | Writing merged tables and reports        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`pipeline_exit_code`] or the command's error handling

use munimerge_recon::PipelineError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure (report serialization).
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Pipeline (3-9)
// =============================================================================

/// A required dataset could not be read or was empty.
pub const EXIT_SOURCE_UNAVAILABLE: u8 = 3;

/// A structural invariant failed (state count, unique municipalities,
/// state headers in a period sheet).
pub const EXIT_INVARIANT: u8 = 4;

/// Datasets assumed co-ordered disagree at one or more positions.
pub const EXIT_MISALIGNED: u8 = 5;

/// Municipality names left unresolved after reconciliation.
pub const EXIT_UNRESOLVED: u8 = 6;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 7;

/// Data could not be interpreted: unknown state, missing column, bad number.
pub const EXIT_BAD_DATA: u8 = 8;

// =============================================================================
// Output (10-19)
// =============================================================================

/// Cannot write the merged table or the JSON report.
pub const EXIT_OUTPUT_WRITE: u8 = 10;

// =============================================================================
// Pipeline Error Types
// =============================================================================

/// Map a PipelineError to its exit code.
pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::SourceUnavailable { .. } => EXIT_SOURCE_UNAVAILABLE,
        PipelineError::InvariantViolation { .. } => EXIT_INVARIANT,
        PipelineError::PositionalMisalignment(_) => EXIT_MISALIGNED,
        PipelineError::UnresolvedReconciliation { .. } => EXIT_UNRESOLVED,
        PipelineError::ConfigParse(_) | PipelineError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        PipelineError::UnknownState(_) | PipelineError::MissingColumn { .. } | PipelineError::ValueParse { .. } => {
            EXIT_BAD_DATA
        }
    }
}

/// Structured error output for `--json` runs.
#[derive(Debug, serde::Serialize)]
pub struct PipelineErrorOutput {
    pub error: &'static str,
    /// First line of the error; multi-line errors put the rest in `details`.
    pub message: String,
    /// Offending rows or positions, one line each.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub exit_code: u8,
}

impl PipelineErrorOutput {
    pub fn from_pipeline_error(err: &PipelineError) -> Self {
        let (error, details) = match err {
            PipelineError::SourceUnavailable { .. } => ("source_unavailable", Vec::new()),
            PipelineError::InvariantViolation { .. } => ("invariant_violation", Vec::new()),
            PipelineError::PositionalMisalignment(d) => {
                ("positional_misalignment", d.iter().map(ToString::to_string).collect())
            }
            PipelineError::UnresolvedReconciliation { divergences, .. } => {
                ("unresolved_reconciliation", divergences.iter().map(ToString::to_string).collect())
            }
            PipelineError::UnknownState(_) => ("unknown_state", Vec::new()),
            PipelineError::MissingColumn { .. } => ("missing_column", Vec::new()),
            PipelineError::ValueParse { .. } => ("value_parse", Vec::new()),
            PipelineError::ConfigParse(_) => ("config_parse", Vec::new()),
            PipelineError::ConfigValidation(_) => ("config_validation", Vec::new()),
        };
        Self {
            error,
            message: err.to_string().lines().next().unwrap_or_default().to_string(),
            details,
            exit_code: pipeline_exit_code(err),
        }
    }

    /// Print as one JSON line to stderr.
    pub fn print_json(&self) {
        if let Ok(output) = serde_json::to_string(self) {
            eprintln!("{}", output);
        }
    }
}

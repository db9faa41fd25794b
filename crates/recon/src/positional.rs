//! Positional alignment checks for datasets assumed co-ordered rather than
//! keyed. Divergences are reported, never corrected.

use crate::error::PipelineError;
use crate::model::PositionalDivergence;
use crate::table::Table;

/// Compare every table's `key_column`, position by position, against the
/// table named `reference`. Results are ordered by table then position.
pub fn validate_positional_alignment(
    tables: &[Table],
    key_column: &str,
    reference: &str,
) -> Result<Vec<PositionalDivergence>, PipelineError> {
    let reference_table = tables.iter().find(|t| t.name == reference).ok_or_else(|| {
        PipelineError::ConfigValidation(format!(
            "reference table '{reference}' is not among the {} table(s) given",
            tables.len()
        ))
    })?;
    let expected = reference_table.column_values(key_column)?;

    let mut divergences = Vec::new();
    for table in tables.iter().filter(|t| t.name != reference) {
        let found = table.column_values(key_column)?;
        divergences.extend(compare_columns(&table.name, &expected, &found));
    }

    if divergences.is_empty() {
        log::debug!("{} table(s) aligned on '{key_column}' against {reference}", tables.len());
    }
    Ok(divergences)
}

/// Like [`validate_positional_alignment`] but any divergence is fatal.
pub fn ensure_aligned(tables: &[Table], key_column: &str, reference: &str) -> Result<(), PipelineError> {
    let divergences = validate_positional_alignment(tables, key_column, reference)?;
    if divergences.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::PositionalMisalignment(divergences))
    }
}

/// Index-wise difference of two value sequences. Positions past the end of
/// the shorter side diverge with `None` on that side.
pub fn compare_columns(table_id: &str, expected: &[String], found: &[String]) -> Vec<PositionalDivergence> {
    let len = expected.len().max(found.len());
    (0..len)
        .filter_map(|i| {
            let e = expected.get(i);
            let f = found.get(i);
            if e == f {
                None
            } else {
                Some(PositionalDivergence {
                    table_id: table_id.to_string(),
                    position: i,
                    expected: e.cloned(),
                    found: f.cloned(),
                })
            }
        })
        .collect()
}

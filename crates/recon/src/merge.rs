use std::collections::HashMap;

use crate::error::PipelineError;
use crate::table::{Cell, Table};

/// Full outer join on `key_columns`.
///
/// Output columns are the keys, then the left payload, then the right
/// payload; a payload name present on both sides gets `_x` / `_y` suffixes.
/// Duplicate keys join pairwise. Rows are ordered by key. No name correction
/// happens here: both sides must already be reconciled.
pub fn merge(left: &Table, right: &Table, key_columns: &[String]) -> Result<Table, PipelineError> {
    let left_keys = key_indices(left, key_columns)?;
    let right_keys = key_indices(right, key_columns)?;
    let left_payload = payload_indices(left, &left_keys);
    let right_payload = payload_indices(right, &right_keys);

    let mut columns = key_columns.to_vec();
    for &i in &left_payload {
        let name = &left.columns[i];
        columns.push(if right_payload.iter().any(|&j| &right.columns[j] == name) {
            format!("{name}_x")
        } else {
            name.clone()
        });
    }
    for &j in &right_payload {
        let name = &right.columns[j];
        columns.push(if left_payload.iter().any(|&i| &left.columns[i] == name) {
            format!("{name}_y")
        } else {
            name.clone()
        });
    }

    let mut right_index: HashMap<Vec<Cell>, Vec<usize>> = HashMap::new();
    for (r, row) in right.rows.iter().enumerate() {
        right_index.entry(pick(row, &right_keys)).or_default().push(r);
    }

    let mut out = Table::new(format!("{}+{}", left.name, right.name), columns);
    let mut right_used = vec![false; right.len()];
    let empty_left = vec![Cell::Empty; left_payload.len()];
    let empty_right = vec![Cell::Empty; right_payload.len()];

    for row in &left.rows {
        let key = pick(row, &left_keys);
        let lp = pick(row, &left_payload);
        match right_index.get(&key) {
            Some(matches) => {
                for &r in matches {
                    right_used[r] = true;
                    let rp = pick(&right.rows[r], &right_payload);
                    out.rows.push(concat(&key, &lp, &rp));
                }
            }
            None => out.rows.push(concat(&key, &lp, &empty_right)),
        }
    }
    for (r, row) in right.rows.iter().enumerate() {
        if !right_used[r] {
            let key = pick(row, &right_keys);
            let rp = pick(row, &right_payload);
            out.rows.push(concat(&key, &empty_left, &rp));
        }
    }

    let key_refs: Vec<&str> = key_columns.iter().map(String::as_str).collect();
    out.sort_by_columns(&key_refs)?;

    log::info!(
        "merged {} ({} rows) with {} ({} rows): {} rows",
        left.name,
        left.len(),
        right.name,
        right.len(),
        out.len()
    );
    Ok(out)
}

fn key_indices(table: &Table, key_columns: &[String]) -> Result<Vec<usize>, PipelineError> {
    key_columns.iter().map(|c| table.column_index(c)).collect()
}

fn payload_indices(table: &Table, keys: &[usize]) -> Vec<usize> {
    (0..table.columns.len()).filter(|i| !keys.contains(i)).collect()
}

fn pick(row: &[Cell], indices: &[usize]) -> Vec<Cell> {
    indices.iter().map(|&i| row[i].clone()).collect()
}

fn concat(key: &[Cell], left: &[Cell], right: &[Cell]) -> Vec<Cell> {
    let mut row = Vec::with_capacity(key.len() + left.len() + right.len());
    row.extend_from_slice(key);
    row.extend_from_slice(left);
    row.extend_from_slice(right);
    row
}

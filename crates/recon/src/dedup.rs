use std::collections::HashSet;

use crate::table::{Cell, Table};

/// Drop rows that are exact structural duplicates of an earlier row, keeping
/// first occurrences in order. Returns the table and the number removed.
pub fn deduplicate(table: Table) -> (Table, usize) {
    let Table { name, columns, rows } = table;
    let before = rows.len();
    let mut seen: HashSet<Vec<Cell>> = HashSet::with_capacity(before);
    let mut kept = Vec::with_capacity(before);
    for row in rows {
        if seen.insert(row.clone()) {
            kept.push(row);
        }
    }
    let removed = before - kept.len();
    if removed > 0 {
        log::warn!("{name}: removed {removed} duplicate row(s)");
    } else {
        log::debug!("{name}: no duplicate rows");
    }
    (Table { name, columns, rows: kept }, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[Vec<&str>]) -> Table {
        Table::from_text_rows("t", &["uf", "municipality"], rows)
    }

    #[test]
    fn keeps_first_occurrence_in_order() {
        let t = table(&[
            vec!["RN", "NATAL"],
            vec!["RN", "ACU"],
            vec!["RN", "NATAL"],
            vec!["PB", "PATOS"],
            vec!["RN", "ACU"],
        ]);
        let (out, removed) = deduplicate(t);
        assert_eq!(removed, 2);
        assert_eq!(
            out.column_values("municipality").unwrap(),
            vec!["NATAL", "ACU", "PATOS"]
        );
    }

    #[test]
    fn partial_duplicates_are_kept() {
        let t = table(&[vec!["RN", "NATAL"], vec!["PB", "NATAL"]]);
        let (out, removed) = deduplicate(t);
        assert_eq!(removed, 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn numbers_compare_structurally() {
        let mut t = Table::new("t", vec!["k".into(), "v".into()]);
        t.push_row(vec![Cell::text("a"), Cell::number(1.5)]);
        t.push_row(vec![Cell::text("a"), Cell::number(1.5)]);
        t.push_row(vec![Cell::text("a"), Cell::text("1.5")]);
        let (out, removed) = deduplicate(t);
        assert_eq!(removed, 1);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn second_pass_removes_nothing() {
        let t = table(&[vec!["RN", "NATAL"], vec!["RN", "NATAL"]]);
        let (once, _) = deduplicate(t);
        let (twice, removed) = deduplicate(once.clone());
        assert_eq!(removed, 0);
        assert_eq!(once, twice);
    }
}

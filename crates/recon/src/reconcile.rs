//! Municipality-name reconciliation of a comparison dataset against the
//! master registry.
//!
//! Rows whose (abbreviation, state name, municipality) triple appears on both
//! sides are already reconciled. The rest are paired greedily: master-side
//! entries in table order, and for each, same-state comparison-side entries
//! in table order; the first candidate clearing the ratio threshold (or, when
//! enabled, a perfect containment match) wins and both leave the pool. This is
//! first-fit, not a globally optimal assignment.
//!
//! The master is never modified. The comparison is returned as a corrected
//! copy alongside the resolutions applied and any divergences left over.

use std::collections::HashSet;

use crate::config::MatchingConfig;
use crate::error::PipelineError;
use crate::model::{DivergenceEntry, KeyColumns, MatchRule, MunicipalityRecord, Origin, Resolution};
use crate::similarity;
use crate::table::{Cell, Table};

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The comparison dataset with accepted names rewritten to the master
    /// spelling.
    pub table: Table,
    pub resolutions: Vec<Resolution>,
    /// Unresolved entries, master side first. Empty on success.
    pub divergences: Vec<DivergenceEntry>,
}

impl Reconciliation {
    pub fn is_reconciled(&self) -> bool {
        self.divergences.is_empty()
    }

    /// Success only when nothing is left unresolved.
    pub fn into_result(self) -> Result<(Table, Vec<Resolution>), PipelineError> {
        if self.divergences.is_empty() {
            Ok((self.table, self.resolutions))
        } else {
            Err(PipelineError::UnresolvedReconciliation {
                dataset: self.table.name,
                divergences: self.divergences,
            })
        }
    }
}

pub fn reconcile(
    master: &Table,
    comparison: &Table,
    keys: &KeyColumns,
    policy: &MatchingConfig,
) -> Result<Reconciliation, PipelineError> {
    let master_recs = MunicipalityRecord::from_table(master, keys)?;
    let comp_recs = MunicipalityRecord::from_table(comparison, keys)?;
    let muni_col = comparison.column_index(&keys.municipality)?;

    let (mut master_side, mut comp_side) = symmetric_difference(&master_recs, &comp_recs);
    log::debug!(
        "{}: {} master-only and {} comparison-only rows before matching",
        comparison.name,
        master_side.len(),
        comp_side.len()
    );

    let mut table = comparison.clone();
    let mut resolutions = Vec::new();

    for m in master_side.iter_mut() {
        for c in comp_side.iter_mut() {
            if c.resolved || c.state_abbreviation != m.state_abbreviation {
                continue;
            }
            let score = similarity::ratio(&m.municipality_name, &c.municipality_name);
            let rule = if score >= policy.ratio_threshold {
                MatchRule::Ratio
            } else if policy.containment
                && similarity::contains(&m.municipality_name, &c.municipality_name)
            {
                MatchRule::Containment
            } else {
                continue;
            };

            m.resolved = true;
            c.resolved = true;
            table.set(c.row_index, muni_col, Cell::text(m.municipality_name.clone()));
            log::debug!(
                "{}: {} {:?} -> {:?} ({rule:?}, score {score})",
                comparison.name,
                m.state_abbreviation,
                c.municipality_name,
                m.municipality_name
            );
            resolutions.push(Resolution {
                state_abbreviation: m.state_abbreviation.clone(),
                master_name: m.municipality_name.clone(),
                comparison_name: c.municipality_name.clone(),
                master_row: m.row_index,
                comparison_row: c.row_index,
                rule,
                score,
            });
            break;
        }
    }

    let divergences: Vec<DivergenceEntry> = master_side
        .into_iter()
        .chain(comp_side)
        .filter(|d| !d.resolved)
        .collect();

    if divergences.is_empty() {
        log::info!("{}: reconciled, {} name(s) corrected", comparison.name, resolutions.len());
    } else {
        log::warn!(
            "{}: {} divergence(s) left unresolved after {} correction(s)",
            comparison.name,
            divergences.len(),
            resolutions.len()
        );
    }

    Ok(Reconciliation {
        table,
        resolutions,
        divergences,
    })
}

/// Rows present on exactly one side, compared on the full key triple.
fn symmetric_difference(
    master: &[MunicipalityRecord],
    comparison: &[MunicipalityRecord],
) -> (Vec<DivergenceEntry>, Vec<DivergenceEntry>) {
    let master_set: HashSet<&MunicipalityRecord> = master.iter().collect();
    let comp_set: HashSet<&MunicipalityRecord> = comparison.iter().collect();

    let side = |recs: &[MunicipalityRecord], other: &HashSet<&MunicipalityRecord>, origin: Origin| {
        recs.iter()
            .enumerate()
            .filter(|(_, r)| !other.contains(r))
            .map(|(row_index, r)| DivergenceEntry {
                origin,
                state_abbreviation: r.state_abbreviation.clone(),
                state_name: r.state_name.clone(),
                municipality_name: r.municipality_name.clone(),
                row_index,
                resolved: false,
            })
            .collect::<Vec<_>>()
    };

    (
        side(master, &comp_set, Origin::Master),
        side(comparison, &master_set, Origin::Comparison),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLS: [&str; 4] = ["state_abbreviation", "state_name", "municipality", "amount"];

    fn master(rows: &[(&str, &str)]) -> Table {
        let rows: Vec<Vec<&str>> = rows.iter().map(|(uf, m)| vec![*uf, state(uf), *m]).collect();
        Table::from_text_rows("master", &COLS[..3], &rows)
    }

    fn comparison(rows: &[(&str, &str)]) -> Table {
        let rows: Vec<Vec<&str>> = rows.iter().map(|(uf, m)| vec![*uf, state(uf), *m, "1"]).collect();
        Table::from_text_rows("tax", &COLS, &rows)
    }

    fn state(uf: &str) -> &'static str {
        match uf {
            "RN" => "RIO GRANDE DO NORTE",
            "PB" => "PARAIBA",
            _ => "OUTRO",
        }
    }

    fn run(m: &Table, c: &Table) -> Reconciliation {
        reconcile(m, c, &KeyColumns::default(), &MatchingConfig::default()).unwrap()
    }

    fn names(t: &Table) -> Vec<String> {
        t.column_values("municipality").unwrap()
    }

    #[test]
    fn identical_sets_need_no_work() {
        let m = master(&[("RN", "NATAL"), ("RN", "MOSSORO")]);
        let c = comparison(&[("RN", "MOSSORO"), ("RN", "NATAL")]);
        let r = run(&m, &c);
        assert!(r.is_reconciled());
        assert!(r.resolutions.is_empty());
        assert_eq!(r.table, c);
    }

    #[test]
    fn ratio_of_83_is_accepted() {
        let m = master(&[("RN", "ABCDEF")]);
        let c = comparison(&[("RN", "ABCDEX")]);
        let r = run(&m, &c);
        assert!(r.is_reconciled());
        assert_eq!(names(&r.table), vec!["ABCDEF"]);
        assert_eq!(r.resolutions[0].score, 83);
        assert_eq!(r.resolutions[0].rule, MatchRule::Ratio);
    }

    #[test]
    fn ratio_of_82_without_containment_is_reported() {
        let m = master(&[("RN", "ABCDEFGHI")]);
        let c = comparison(&[("RN", "ABCDEFGX")]);
        let r = run(&m, &c);
        assert!(!r.is_reconciled());
        assert_eq!(r.divergences.len(), 2);
        assert_eq!(r.divergences[0].origin, Origin::Master);
        assert_eq!(r.divergences[0].municipality_name, "ABCDEFGHI");
        assert_eq!(r.divergences[1].origin, Origin::Comparison);
        assert_eq!(r.divergences[1].municipality_name, "ABCDEFGX");
        assert!(r.divergences.iter().all(|d| !d.resolved));
        assert_eq!(names(&r.table), vec!["ABCDEFGX"]);
    }

    #[test]
    fn containment_rescues_low_ratio() {
        let m = master(&[("RN", "SERRA NEGRA DE NORTE")]);
        let c = comparison(&[("RN", "SERRA NEGRA")]);
        let r = run(&m, &c);
        assert!(r.is_reconciled());
        assert_eq!(r.resolutions[0].rule, MatchRule::Containment);
        assert_eq!(names(&r.table), vec!["SERRA NEGRA DE NORTE"]);
    }

    #[test]
    fn containment_can_be_disabled() {
        let m = master(&[("RN", "SERRA NEGRA DE NORTE")]);
        let c = comparison(&[("RN", "SERRA NEGRA")]);
        let policy = MatchingConfig { containment: false, ..MatchingConfig::default() };
        let r = reconcile(&m, &c, &KeyColumns::default(), &policy).unwrap();
        assert_eq!(r.divergences.len(), 2);
    }

    #[test]
    fn candidates_must_share_state() {
        let m = master(&[("RN", "SANTA LUZIA")]);
        let c = comparison(&[("PB", "SANTA LUZIA"), ("RN", "SANTA LUZIA")]);
        let r = run(&m, &c);
        // RN row is exact; the PB row has no PB master counterpart.
        assert_eq!(r.divergences.len(), 1);
        assert_eq!(r.divergences[0].state_abbreviation, "PB");
        assert_eq!(r.divergences[0].row_index, 0);
    }

    #[test]
    fn first_fit_in_table_order() {
        let m = master(&[("RN", "SAO BENTO"), ("RN", "SAO BENTO DE NORTE")]);
        let c = comparison(&[("RN", "SAO BENTO DE NORTE X"), ("RN", "SAO BENTO X")]);
        let r = run(&m, &c);
        // "SAO BENTO" is contained in the first candidate, which is taken even
        // though the second is a closer spelling.
        assert_eq!(r.resolutions[0].comparison_row, 0);
        assert_eq!(r.resolutions[0].master_name, "SAO BENTO");
        assert_eq!(names(&r.table)[0], "SAO BENTO");
    }

    #[test]
    fn master_is_untouched_and_payload_kept() {
        let m = master(&[("RN", "MOSSORO")]);
        let c = comparison(&[("RN", "MOSORO")]);
        let before = m.clone();
        let r = run(&m, &c);
        assert_eq!(m, before);
        assert_eq!(r.table.rows[0][3], Cell::text("1"));
    }

    #[test]
    fn into_result_surfaces_divergences() {
        let m = master(&[("RN", "ACU")]);
        let c = comparison(&[("RN", "ASSU")]);
        let err = run(&m, &c).into_result().unwrap_err();
        match err {
            PipelineError::UnresolvedReconciliation { dataset, divergences } => {
                assert_eq!(dataset, "tax");
                assert_eq!(divergences.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let m = master(&[("RN", "CAICO"), ("RN", "CURRAIS NOVOS"), ("RN", "PARELHAS")]);
        let c = comparison(&[("RN", "PARELHA"), ("RN", "CAICÓ"), ("RN", "CURRAIS NOVO")]);
        let a = run(&m, &c);
        let b = run(&m, &c);
        assert_eq!(a.resolutions, b.resolutions);
        assert_eq!(a.divergences, b.divergences);
        assert_eq!(a.table, b.table);
    }
}

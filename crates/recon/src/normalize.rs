//! Canonical form for municipality names.
//!
//! Input is expected upper-cased; case is never changed here. Steps, in
//! order: strip diacritics, hyphens to spaces, contract `DA|DO|DAS|DOS`
//! between spaces to `DE`, then apply the alias table.

use deunicode::deunicode;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::PipelineError;
use crate::model::KeyColumns;
use crate::table::{Cell, Table};

/// A known historical rename. `state: None` applies in every state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Alias {
    #[serde(default)]
    pub state: Option<String>,
    pub from: String,
    pub to: String,
}

impl Alias {
    pub fn new(state: Option<&str>, from: &str, to: &str) -> Self {
        Self {
            state: state.map(str::to_string),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn applies(&self, state: Option<&str>, name: &str) -> bool {
        if self.from != name {
            return false;
        }
        match (&self.state, state) {
            (None, _) => true,
            (Some(s), Some(st)) => s == st,
            (Some(_), None) => false,
        }
    }
}

/// The corrections observed between source vintages.
pub fn default_aliases() -> Vec<Alias> {
    vec![
        Alias::new(Some("RN"), "ASSU", "ACU"),
        Alias::new(Some("RN"), "BOA SAUDE", "JANUARIO CICCO"),
        Alias::new(Some("AC"), "PASSO DE CAMARAGIBE", "SANTA ROSA DE PURUS"),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: Vec<Alias>,
}

impl Normalizer {
    pub fn new(aliases: Vec<Alias>) -> Self {
        Self { aliases }
    }

    /// Normalize without state context: only state-less aliases apply.
    pub fn normalize(&self, name: &str) -> String {
        self.apply_aliases(None, normalize_text(name))
    }

    /// Normalize a name known to belong to `state` (abbreviation).
    pub fn normalize_in_state(&self, state: &str, name: &str) -> String {
        self.apply_aliases(Some(state), normalize_text(name))
    }

    /// Rewrite the municipality column of a keyed table in place, scoping
    /// aliases by each row's state abbreviation. Returns the number of
    /// names changed.
    pub fn normalize_table(&self, table: &mut Table, keys: &KeyColumns) -> Result<usize, PipelineError> {
        let abbr_col = table.column_index(&keys.state_abbreviation)?;
        let muni_col = table.column_index(&keys.municipality)?;
        let mut changed = 0;
        for row in &mut table.rows {
            let current = row[muni_col].to_string();
            let normal = self.normalize_in_state(&row[abbr_col].to_string(), &current);
            if normal != current {
                row[muni_col] = Cell::text(normal);
                changed += 1;
            }
        }
        log::debug!("{}: normalized {changed} municipality name(s)", table.name);
        Ok(changed)
    }

    fn apply_aliases(&self, state: Option<&str>, name: String) -> String {
        match self.aliases.iter().find(|a| a.applies(state, &name)) {
            Some(alias) => alias.to.clone(),
            None => name,
        }
    }
}

/// Steps 1-3 of normalization. Pure and total.
pub fn normalize_text(name: &str) -> String {
    let stripped = strip_diacritics(name).replace('-', " ");
    contract_articles(&stripped)
}

/// Drop combining marks, then transliterate whatever is left to ASCII
/// (dash and prime variants, ordinal indicators, ligatures, stroked letters).
pub fn strip_diacritics(s: &str) -> String {
    let bare: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    deunicode(&bare)
}

/// Replace every `DA|DO|DAS|DOS` token that has a space on both sides with
/// `DE`. Token-wise, so adjacent articles ("A DA DO B") all contract.
fn contract_articles(s: &str) -> String {
    let parts: Vec<&str> = s.split(' ').collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let inner = i > 0 && i < last;
            if inner && matches!(*part, "DA" | "DO" | "DAS" | "DOS") {
                "DE"
            } else {
                *part
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_cedilla() {
        assert_eq!(normalize_text("AÇU"), "ACU");
        assert_eq!(normalize_text("SÃO JOÃO DO PIAUÍ"), "SAO JOAO DE PIAUI");
        assert_eq!(normalize_text("GOIÂNIA"), "GOIANIA");
    }

    #[test]
    fn hyphen_becomes_space() {
        assert_eq!(normalize_text("PAU-D'ARCO"), "PAU D'ARCO");
        assert_eq!(normalize_text("OLHO-D'ÁGUA DO BORGES"), "OLHO D'AGUA DE BORGES");
    }

    #[test]
    fn articles_contract_only_between_spaces() {
        assert_eq!(normalize_text("BARRA DOS COQUEIROS"), "BARRA DE COQUEIROS");
        assert_eq!(normalize_text("DOS SANTOS"), "DOS SANTOS");
        assert_eq!(normalize_text("SANTANA DO"), "SANTANA DO");
        assert_eq!(normalize_text("SERRA DA SAUDADE"), "SERRA DE SAUDADE");
        assert_eq!(normalize_text("DOMINGOS"), "DOMINGOS");
    }

    #[test]
    fn consecutive_articles_all_contract() {
        assert_eq!(normalize_text("A DA DO B"), "A DE DE B");
    }

    #[test]
    fn article_after_hyphen_contracts() {
        assert_eq!(normalize_text("ESPIGAO-DO-OESTE"), "ESPIGAO DE OESTE");
    }

    #[test]
    fn case_is_preserved() {
        assert_eq!(normalize_text("São Paulo"), "Sao Paulo");
    }

    #[test]
    fn empty_input_is_fine() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(Normalizer::default().normalize(""), "");
    }

    #[test]
    fn alias_applies_after_text_steps() {
        let n = Normalizer::new(default_aliases());
        assert_eq!(n.normalize_in_state("RN", "AÇU"), "ACU");
        assert_eq!(n.normalize_in_state("RN", "ASSU"), "ACU");
        assert_eq!(n.normalize_in_state("RN", "BOA SAÚDE"), "JANUARIO CICCO");
    }

    #[test]
    fn state_scoped_alias_ignores_other_states() {
        let n = Normalizer::new(default_aliases());
        assert_eq!(n.normalize_in_state("AL", "PASSO DE CAMARAGIBE"), "PASSO DE CAMARAGIBE");
        assert_eq!(n.normalize_in_state("AC", "PASSO DE CAMARAGIBE"), "SANTA ROSA DE PURUS");
        assert_eq!(n.normalize("ASSU"), "ASSU");
    }

    #[test]
    fn stateless_alias_applies_everywhere() {
        let n = Normalizer::new(vec![Alias::new(None, "ASSU", "ACU")]);
        assert_eq!(n.normalize("ASSU"), "ACU");
        assert_eq!(n.normalize_in_state("CE", "ASSU"), "ACU");
    }

    #[test]
    fn table_rows_use_their_own_state() {
        let mut t = Table::from_text_rows(
            "tax",
            &["state_abbreviation", "state_name", "municipality"],
            &[
                vec!["RN", "RIO GRANDE DO NORTE", "ASSU"],
                vec!["CE", "CEARA", "ASSU"],
                vec!["RN", "RIO GRANDE DO NORTE", "NATAL"],
            ],
        );
        let n = Normalizer::new(default_aliases());
        let changed = n.normalize_table(&mut t, &KeyColumns::default()).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(t.column_values("municipality").unwrap(), vec!["ACU", "ASSU", "NATAL"]);
    }

    #[test]
    fn non_decomposable_letters_fall_back() {
        assert_eq!(strip_diacritics("ØRSTED"), "ORSTED");
        assert_eq!(strip_diacritics("ŁÓDŹ"), "LODZ");
    }

    #[test]
    fn unicode_dashes_split_like_hyphens() {
        assert_eq!(normalize_text("OLHO\u{2010}D'AGUA"), "OLHO D'AGUA");
        assert_eq!(normalize_text("OLHO\u{2013}D'ÁGUA DO BORGES"), "OLHO D'AGUA DE BORGES");
    }

    #[test]
    fn typographic_marks_become_ascii() {
        assert_eq!(normalize_text("PAU D\u{2019}ARCO"), "PAU D'ARCO");
        for raw in ["VILA Nº 1", "SANTA RITA D\u{2032}OESTE", "SÃO JOÃO D\u{00B4}ALIANÇA"] {
            let out = normalize_text(raw);
            assert!(out.is_ascii(), "{raw:?} -> {out:?}");
        }
    }
}

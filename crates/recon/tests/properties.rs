// Property-based tests for normalization, dedup, similarity and merge.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;

use proptest::prelude::*;
use munimerge_recon::config::MatchingConfig;
use munimerge_recon::dedup::deduplicate;
use munimerge_recon::merge::merge;
use munimerge_recon::model::KeyColumns;
use munimerge_recon::normalize::{default_aliases, normalize_text, Normalizer};
use munimerge_recon::reconcile::reconcile;
use munimerge_recon::similarity::{contains, ratio};
use munimerge_recon::{Cell, Table};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Upper-case municipality-like names: words, articles, hyphens, apostrophes
/// and Portuguese accented letters.
fn arb_name() -> impl Strategy<Value = String> {
    let word = prop_oneof![
        3 => r"[A-ZÁÂÃÉÊÍÓÔÕÚÇ]{1,8}",
        2 => prop::sample::select(vec!["DA", "DO", "DAS", "DOS", "DE", "D'ÁGUA", "ASSU", "BOA"]).prop_map(String::from),
    ];
    (
        proptest::collection::vec(word, 1..5),
        proptest::collection::vec(prop::sample::select(vec![" ", "-", "  "]), 4),
    )
        .prop_map(|(words, seps)| {
            let mut out = String::new();
            for (i, w) in words.iter().enumerate() {
                if i > 0 {
                    out.push_str(seps[i - 1]);
                }
                out.push_str(w);
            }
            out
        })
}

fn accent(c: char) -> char {
    match c {
        'A' => 'Ã',
        'E' => 'É',
        'I' => 'Í',
        'O' => 'Ô',
        'U' => 'Ú',
        'C' => 'Ç',
        other => other,
    }
}

fn arb_table(max_rows: usize) -> impl Strategy<Value = Table> {
    let row = (prop::sample::select(vec!["RN", "PB", "AC"]), r"[A-Z]{1,3}", prop::option::of(0u8..4));
    proptest::collection::vec(row, 0..max_rows).prop_map(|rows| {
        let mut t = Table::new("t", vec!["uf".into(), "municipality".into(), "n".into()]);
        for (uf, name, n) in rows {
            t.push_row(vec![
                Cell::text(uf),
                Cell::text(name),
                n.map(|v| Cell::number(f64::from(v))).unwrap_or(Cell::Empty),
            ]);
        }
        t
    })
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_is_idempotent(name in arb_name(), state in prop::sample::select(vec!["RN", "AC", "SP"])) {
        let n = Normalizer::new(default_aliases());
        let once = n.normalize_in_state(state, &name);
        let twice = n.normalize_in_state(state, &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalize_ignores_accents(name in r"[A-Z]{1,6}( [A-Z]{1,6}){0,3}") {
        let accented: String = name.chars().map(accent).collect();
        prop_assert_eq!(normalize_text(&accented), normalize_text(&name));
    }

    #[test]
    fn normalized_text_has_no_hyphens_or_inner_articles(name in arb_name()) {
        let out = normalize_text(&name);
        prop_assert!(!out.contains('-'));
        let parts: Vec<&str> = out.split(' ').collect();
        if parts.len() > 2 {
            for part in &parts[1..parts.len() - 1] {
                prop_assert!(!matches!(*part, "DA" | "DO" | "DAS" | "DOS"));
            }
        }
        prop_assert!(out.is_ascii());
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn dedup_is_idempotent_and_order_preserving(table in arb_table(40)) {
        let before = table.rows.clone();
        let (once, removed) = deduplicate(table);
        prop_assert_eq!(once.len() + removed, before.len());

        let unique: HashSet<&Vec<Cell>> = once.rows.iter().collect();
        prop_assert_eq!(unique.len(), once.len());

        // kept rows are the first occurrences, in input order
        let mut seen = HashSet::new();
        let firsts: Vec<Vec<Cell>> = before.into_iter().filter(|r| seen.insert(r.clone())).collect();
        prop_assert_eq!(&once.rows, &firsts);

        let (twice, removed_again) = deduplicate(once.clone());
        prop_assert_eq!(removed_again, 0);
        prop_assert_eq!(twice, once);
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn ratio_is_bounded_and_symmetric(a in r"[A-Z ]{0,20}", b in r"[A-Z ]{0,20}") {
        let r = ratio(&a, &b);
        prop_assert!(r <= 100);
        prop_assert_eq!(r, ratio(&b, &a));
        prop_assert_eq!(ratio(&a, &a), 100);
    }

    #[test]
    fn substring_is_contained(a in r"[A-Z]{1,10}", pre in r"[A-Z ]{0,5}", post in r"[A-Z ]{0,5}") {
        let longer = format!("{pre}{a}{post}");
        prop_assert!(contains(&a, &longer));
        prop_assert!(contains(&longer, &a));
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Same name with accents added, spaces turned into hyphens and `DE`
/// spelled as another article.
fn respell(name: &str) -> String {
    name.split(' ')
        .map(|w| if w == "DE" { "DOS".to_string() } else { w.chars().map(accent).collect() })
        .collect::<Vec<_>>()
        .join("-")
}

fn keyed(name: &str, names: &[String]) -> Table {
    let mut t = Table::new(name, vec!["state_abbreviation".into(), "state_name".into(), "municipality".into()]);
    for n in names {
        t.push_row(vec![Cell::text("RN"), Cell::text("RIO GRANDE DO NORTE"), Cell::text(n.as_str())]);
    }
    t
}

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn spelling_variants_reconcile_without_divergence(
        words in proptest::collection::vec(
            proptest::collection::vec(prop_oneof![3 => r"[A-Z]{2,6}", 1 => Just("DE".to_string())], 2..4),
            1..8,
        )
    ) {
        // Articles only between words, so the master spelling is canonical
        let canonical: Vec<String> = words
            .iter()
            .map(|w| {
                let mut w = w.clone();
                if w[0] == "DE" { w[0] = "SAO".into(); }
                let last = w.len() - 1;
                if w[last] == "DE" { w[last] = "NORTE".into(); }
                w.join(" ")
            })
            .collect();
        let variants: Vec<String> = canonical.iter().map(|n| respell(n)).collect();

        let keys = KeyColumns::default();
        let normalizer = Normalizer::new(default_aliases());
        let mut master = keyed("master", &canonical);
        let mut comparison = keyed("variant", &variants);
        normalizer.normalize_table(&mut master, &keys).unwrap();
        normalizer.normalize_table(&mut comparison, &keys).unwrap();

        let r = reconcile(&master, &comparison, &keys, &MatchingConfig::default()).unwrap();
        prop_assert!(r.divergences.is_empty());
        prop_assert_eq!(r.table.column_values("municipality").unwrap(), master.column_values("municipality").unwrap());
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn merge_of_disjoint_keys_keeps_every_row(
        left_names in proptest::collection::hash_set(r"L[A-Z]{1,4}", 0..15),
        right_names in proptest::collection::hash_set(r"R[A-Z]{1,4}", 0..15),
    ) {
        let mut left = Table::new("left", vec!["uf".into(), "municipality".into(), "a".into()]);
        for name in &left_names {
            left.push_row(vec![Cell::text("RN"), Cell::text(name.as_str()), Cell::number(1.0)]);
        }
        let mut right = Table::new("right", vec!["uf".into(), "municipality".into(), "b".into()]);
        for name in &right_names {
            right.push_row(vec![Cell::text("RN"), Cell::text(name.as_str()), Cell::number(2.0)]);
        }
        let keys = vec!["uf".to_string(), "municipality".to_string()];
        let out = merge(&left, &right, &keys).unwrap();
        prop_assert_eq!(out.len(), left_names.len() + right_names.len());
        for row in &out.rows {
            // exactly one side's payload is filled
            prop_assert!(row[2].is_empty() != row[3].is_empty());
        }
    }

    #[test]
    fn merge_of_identical_keys_fills_every_row(names in proptest::collection::hash_set(r"[A-Z]{1,6}", 1..15)) {
        let mut left = Table::new("left", vec!["uf".into(), "municipality".into(), "a".into()]);
        let mut right = Table::new("right", vec!["uf".into(), "municipality".into(), "b".into()]);
        for name in &names {
            left.push_row(vec![Cell::text("PB"), Cell::text(name.as_str()), Cell::number(1.0)]);
            right.push_row(vec![Cell::text("PB"), Cell::text(name.as_str()), Cell::number(2.0)]);
        }
        let keys = vec!["uf".to_string(), "municipality".to_string()];
        let out = merge(&left, &right, &keys).unwrap();
        prop_assert_eq!(out.len(), names.len());
        prop_assert!(out.rows.iter().all(|r| r.iter().all(|c| !c.is_empty())));
    }
}

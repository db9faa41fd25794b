use std::collections::HashSet;

use crate::config::{PipelineConfig, SourceConfig, MASTER_TABLE};
use crate::dedup::deduplicate;
use crate::delinquency::consolidate;
use crate::error::PipelineError;
use crate::merge::merge;
use crate::model::{KeyColumns, PipelineInput, PipelineResult, RunMeta, SourceData, SourceReport};
use crate::normalize::Normalizer;
use crate::positional::ensure_aligned;
use crate::prepare::{prepare_master, prepare_source};
use crate::reconcile::reconcile;
use crate::states::StateRegistry;
use crate::table::Table;

/// Run the whole pipeline per config: build the state registry, prepare the
/// master, bring every source into key + payload shape, reconcile each
/// against the master and join them all. Any unresolved divergence aborts.
pub fn run(config: &PipelineConfig, input: &PipelineInput) -> Result<PipelineResult, PipelineError> {
    let keys = &config.keys;
    let registry = StateRegistry::build(&input.states, &config.states, config.validation.expected_states)?;
    let normalizer = Normalizer::new(config.aliases.clone());

    let master = build_master(config, input, &registry, &normalizer)?;

    let mut reconciled = Vec::with_capacity(config.sources.len());
    let mut reports = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let data = input.sources.get(&source.name).ok_or_else(|| PipelineError::SourceUnavailable {
            source: source.name.clone(),
            reason: "no data was loaded".into(),
        })?;
        let prepared = prepare(config, source, data, &registry)?;
        let (mut table, duplicates_removed) = deduplicate(prepared);
        normalizer.normalize_table(&mut table, keys)?;

        let (table, resolutions) = reconcile(&master, &table, keys, &config.matching)?.into_result()?;

        reports.push(SourceReport {
            name: source.name.clone(),
            rows_in: data.row_count(),
            duplicates_removed,
            rows_out: table.len(),
            resolutions,
        });
        reconciled.push(table);
    }

    if config.validation.cross_dataset_alignment {
        check_cross_dataset_alignment(&master, &reconciled, keys)?;
    }

    let key_columns = keys.to_vec();
    let mut merged = master.clone();
    for table in &reconciled {
        merged = merge(&merged, table, &key_columns)?;
    }

    log::info!(
        "{}: {} municipalities, {} merged rows from {} source(s)",
        config.name,
        master.len(),
        merged.len(),
        reconciled.len()
    );

    Ok(PipelineResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        municipalities: master,
        merged,
        sources: reports,
    })
}

fn build_master(
    config: &PipelineConfig,
    input: &PipelineInput,
    registry: &StateRegistry,
    normalizer: &Normalizer,
) -> Result<Table, PipelineError> {
    if input.master.is_empty() {
        return Err(PipelineError::SourceUnavailable {
            source: MASTER_TABLE.into(),
            reason: "master registry has no rows".into(),
        });
    }
    let mut prepared = prepare_master(&input.master, &config.master, &config.keys, registry)?;
    prepared.name = MASTER_TABLE.into();
    let (mut master, _) = deduplicate(prepared);
    normalizer.normalize_table(&mut master, &config.keys)?;
    ensure_unique_municipalities(&master, &config.keys)?;
    Ok(master)
}

fn prepare(
    config: &PipelineConfig,
    source: &SourceConfig,
    data: &SourceData,
    registry: &StateRegistry,
) -> Result<Table, PipelineError> {
    match (data, source.is_periodic()) {
        (SourceData::Table(raw), false) => prepare_source(raw, source, &config.keys, registry),
        (SourceData::Periods(periods), true) => consolidate(
            periods,
            source,
            &config.keys,
            registry,
            config.validation.expected_states,
        ),
        _ => Err(PipelineError::ConfigValidation(format!(
            "source '{}': loaded data does not match its configuration",
            source.name
        ))),
    }
}

/// (state_abbreviation, municipality) must identify one master row.
fn ensure_unique_municipalities(master: &Table, keys: &KeyColumns) -> Result<(), PipelineError> {
    let abbr = master.column_index(&keys.state_abbreviation)?;
    let muni = master.column_index(&keys.municipality)?;
    let mut seen = HashSet::with_capacity(master.len());
    for row in &master.rows {
        if !seen.insert((&row[abbr], &row[muni])) {
            return Err(PipelineError::InvariantViolation {
                subject: master.name.clone(),
                detail: format!("municipality {} / {} appears more than once", row[abbr], row[muni]),
            });
        }
    }
    Ok(())
}

/// Every reconciled source, ordered by key, must list the same municipalities
/// in the same order as the ordered master.
fn check_cross_dataset_alignment(master: &Table, sources: &[Table], keys: &KeyColumns) -> Result<(), PipelineError> {
    let key_columns = keys.to_vec();
    let order = [keys.state_abbreviation.as_str(), keys.municipality.as_str()];

    let mut tables = Vec::with_capacity(sources.len() + 1);
    for table in std::iter::once(master).chain(sources) {
        let mut sorted = table.select(&key_columns)?;
        sorted.name = table.name.clone();
        sorted.sort_by_columns(&order)?;
        tables.push(sorted);
    }
    ensure_aligned(&tables, &keys.municipality, MASTER_TABLE)
}

// Loading every table a pipeline config names

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use munimerge_recon::config::MASTER_TABLE;
use munimerge_recon::{PipelineConfig, PipelineError, PipelineInput, SourceData};

use crate::csv::read_table;

/// Resolve `file` against `base_dir` unless it is already absolute.
pub fn resolve(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Read the states table, the master registry and every source. Relative
/// paths in the config are taken from `base_dir`. Period tables are named by
/// their period id.
pub fn load_input(config: &PipelineConfig, base_dir: &Path) -> Result<PipelineInput, PipelineError> {
    let states = read_table(&resolve(base_dir, &config.states.file), "states")?;
    let master = read_table(&resolve(base_dir, &config.master.file), MASTER_TABLE)?;

    let mut sources = HashMap::with_capacity(config.sources.len());
    for source in &config.sources {
        let data = match &source.file {
            Some(file) => SourceData::Table(read_table(&resolve(base_dir, file), &source.name)?),
            None => {
                let mut periods = Vec::with_capacity(source.periods.len());
                for period in &source.periods {
                    periods.push(read_table(&resolve(base_dir, &period.file), &period.id)?);
                }
                SourceData::Periods(periods)
            }
        };
        log::debug!("{}: loaded {} row(s)", source.name, data.row_count());
        sources.insert(source.name.clone(), data);
    }

    Ok(PipelineInput { states, master, sources })
}

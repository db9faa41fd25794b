//! `munimerge run` and `munimerge validate`: config-driven municipality merge.

use std::path::{Path, PathBuf};

use munimerge_recon::{PipelineConfig, PipelineError, PipelineResult};

use crate::exit_codes::{pipeline_exit_code, PipelineErrorOutput, EXIT_ERROR, EXIT_OUTPUT_WRITE, EXIT_USAGE};
use crate::CliError;

fn pipeline_err(err: &PipelineError, json: bool) -> CliError {
    let output = PipelineErrorOutput::from_pipeline_error(err);
    if json {
        // The structured form replaces the plain "error:" line
        output.print_json();
        return CliError { code: output.exit_code, message: String::new(), hint: None };
    }
    let hint = match err {
        PipelineError::UnresolvedReconciliation { .. } => {
            Some("add an [[aliases]] entry for historical renames, or lower matching.ratio_threshold".to_string())
        }
        PipelineError::PositionalMisalignment(_) => {
            Some("the reported table is not ordered like its reference".to_string())
        }
        _ => None,
    };
    CliError { code: pipeline_exit_code(err), message: err.to_string().trim_end().to_string(), hint }
}

fn output_err(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError { code: EXIT_OUTPUT_WRITE, message: format!("cannot write {}: {e}", path.display()), hint: None }
}

fn read_config(config_path: &Path, json: bool) -> Result<PipelineConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {e}", config_path.display()),
        hint: None,
    })?;
    PipelineConfig::from_toml(&config_str).map_err(|e| pipeline_err(&e, json))
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    report_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = read_config(&config_path, json_output)?;
    let base = base_dir(&config_path);

    let input = munimerge_io::load_input(&config, base).map_err(|e| pipeline_err(&e, json_output))?;
    let result = munimerge_recon::run(&config, &input).map_err(|e| pipeline_err(&e, json_output))?;

    // Flags override paths from [output]; config paths are relative to the config file
    let merged_path = output_file.or_else(|| config.output.merged.as_deref().map(|p| munimerge_io::load::resolve(base, p)));
    let report_path = report_file.or_else(|| config.output.report.as_deref().map(|p| munimerge_io::load::resolve(base, p)));

    if let Some(ref path) = merged_path {
        munimerge_io::write_table(&result.merged, path).map_err(|e| output_err(path, e))?;
        eprintln!("wrote {}", path.display());
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError { code: EXIT_ERROR, message: format!("JSON serialization error: {e}"), hint: None })?;

    if let Some(ref path) = report_path {
        std::fs::write(path, &json_str).map_err(|e| output_err(path, e))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &PipelineResult) {
    eprintln!(
        "{}: {} municipalities, {} merged rows, {} source(s)",
        result.meta.config_name,
        result.municipalities.len(),
        result.merged.len(),
        result.sources.len(),
    );
    for source in &result.sources {
        eprintln!(
            "  {}: {} rows in, {} duplicates removed, {} rows out, {} names resolved",
            source.name,
            source.rows_in,
            source.duplicates_removed,
            source.rows_out,
            source.resolutions.len(),
        );
        for r in &source.resolutions {
            eprintln!(
                "    {} {:?} -> {:?} ({:?}, {})",
                r.state_abbreviation, r.comparison_name, r.master_name, r.rule, r.score
            );
        }
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path, false)?;
    let periods: usize = config.sources.iter().map(|s| s.periods.len()).sum();
    eprintln!(
        "config OK: \"{}\" ({} source(s), {} period file(s), {} alias(es))",
        config.name,
        config.sources.len(),
        periods,
        config.aliases.len(),
    );
    Ok(())
}

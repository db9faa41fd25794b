use std::collections::HashSet;

use serde::Deserialize;

use crate::error::PipelineError;
use crate::model::KeyColumns;
use crate::normalize::{default_aliases, normalize_text, Alias};
use crate::states::BRAZILIAN_STATES;

/// Table name of the prepared master registry; no source may use it.
pub const MASTER_TABLE: &str = "master";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub keys: KeyColumns,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default = "default_aliases")]
    pub aliases: Vec<Alias>,
    pub states: StatesConfig,
    pub master: MasterConfig,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Matching + Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Minimum whole-string ratio (0..=100) accepted as the same name.
    #[serde(default = "default_ratio_threshold")]
    pub ratio_threshold: u8,
    /// Fall back to exact substring containment below the threshold.
    #[serde(default = "default_true")]
    pub containment: bool,
}

fn default_ratio_threshold() -> u8 {
    83
}

fn default_true() -> bool {
    true
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: default_ratio_threshold(),
            containment: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_expected_states")]
    pub expected_states: usize,
    /// After reconciliation, require every source sorted by key to line up
    /// with the sorted master.
    #[serde(default = "default_true")]
    pub cross_dataset_alignment: bool,
}

fn default_expected_states() -> usize {
    BRAZILIAN_STATES
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            expected_states: default_expected_states(),
            cross_dataset_alignment: true,
        }
    }
}

// ---------------------------------------------------------------------------
// States + Master
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StatesConfig {
    pub file: String,
    pub name_column: String,
    pub code_column: String,
    /// Country prefix stripped from codes ("BR-RN" -> "RN").
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
}

fn default_code_prefix() -> String {
    "BR-".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    pub file: String,
    pub state_column: String,
    pub municipality_column: String,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A comparison dataset: either one `file`, or a list of same-shaped
/// `periods` consolidated into one table.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub periods: Vec<PeriodConfig>,
    #[serde(default)]
    pub reference_period: Option<String>,
    #[serde(default)]
    pub state_abbreviation_column: Option<String>,
    #[serde(default)]
    pub state_name_column: Option<String>,
    pub municipality_column: String,
    /// Numeric columns carried into the merge (after transforms).
    #[serde(default)]
    pub payload: Vec<String>,
    #[serde(default)]
    pub filter: Option<RowFilter>,
    /// Drop a trailing " - XX" state suffix from municipality names.
    #[serde(default)]
    pub strip_state_suffix: bool,
    #[serde(default)]
    pub scale: Option<ScaleTransform>,
    #[serde(default)]
    pub totals: Vec<TotalSpec>,
    #[serde(default)]
    pub decimal: DecimalSeparator,
    #[serde(default)]
    pub delinquency: DelinquencyConfig,
}

impl SourceConfig {
    pub fn is_periodic(&self) -> bool {
        !self.periods.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodConfig {
    pub id: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleTransform {
    pub columns: Vec<String>,
    pub factor: f64,
}

/// Sum `columns` into a new column `into`.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalSpec {
    pub into: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    #[default]
    Point,
    Comma,
}

/// Column handling for periodic delinquency sheets.
#[derive(Debug, Clone, Deserialize)]
pub struct DelinquencyConfig {
    /// Input column whose name contains this is the paid count ("DAS 01/2020").
    #[serde(default = "default_paid_match")]
    pub paid_match: String,
    /// Input column whose name contains this is the opted-in count.
    #[serde(default = "default_opted_match")]
    pub opted_match: String,
    #[serde(default = "default_paid_column")]
    pub paid_column: String,
    #[serde(default = "default_opted_column")]
    pub opted_column: String,
    #[serde(default = "default_ratio_column")]
    pub ratio_column: String,
}

fn default_paid_match() -> String {
    "DAS".into()
}

fn default_opted_match() -> String {
    "Optantes".into()
}

fn default_paid_column() -> String {
    "paid".into()
}

fn default_opted_column() -> String {
    "opted".into()
}

fn default_ratio_column() -> String {
    "delinquency_ratio".into()
}

impl Default for DelinquencyConfig {
    fn default() -> Self {
        Self {
            paid_match: default_paid_match(),
            opted_match: default_opted_match(),
            paid_column: default_paid_column(),
            opted_column: default_opted_column(),
            ratio_column: default_ratio_column(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub merged: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.matching.ratio_threshold > 100 {
            return Err(PipelineError::ConfigValidation(format!(
                "ratio_threshold must be within 0..=100, got {}",
                self.matching.ratio_threshold
            )));
        }

        if self.validation.expected_states == 0 {
            return Err(PipelineError::ConfigValidation(
                "expected_states must be positive".into(),
            ));
        }

        self.validate_aliases()?;

        if self.sources.is_empty() {
            return Err(PipelineError::ConfigValidation(
                "at least 1 source is required".into(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name == MASTER_TABLE {
                return Err(PipelineError::ConfigValidation(format!(
                    "source name '{MASTER_TABLE}' is reserved"
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(PipelineError::ConfigValidation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            validate_source(source)?;
        }

        Ok(())
    }

    /// Targets must be normalization fixed points and must not feed another
    /// alias, so normalizing twice changes nothing.
    fn validate_aliases(&self) -> Result<(), PipelineError> {
        for alias in &self.aliases {
            for (label, value) in [("from", &alias.from), ("to", &alias.to)] {
                let normal = normalize_text(value);
                if &normal != value {
                    return Err(PipelineError::ConfigValidation(format!(
                        "alias {label} '{value}' is not in normalized form (expected '{normal}')"
                    )));
                }
            }
            if let Some(next) = self.aliases.iter().find(|a| a.from == alias.to) {
                return Err(PipelineError::ConfigValidation(format!(
                    "alias '{}' -> '{}' chains into '{}' -> '{}'",
                    alias.from, alias.to, next.from, next.to
                )));
            }
        }
        Ok(())
    }
}

fn validate_source(source: &SourceConfig) -> Result<(), PipelineError> {
    let name = &source.name;
    match (&source.file, source.is_periodic()) {
        (Some(_), true) => {
            return Err(PipelineError::ConfigValidation(format!(
                "source '{name}': set either file or periods, not both"
            )))
        }
        (None, false) => {
            return Err(PipelineError::ConfigValidation(format!(
                "source '{name}': one of file or periods is required"
            )))
        }
        _ => {}
    }

    if source.is_periodic() {
        let Some(reference) = &source.reference_period else {
            return Err(PipelineError::ConfigValidation(format!(
                "source '{name}': periodic sources need a reference_period"
            )));
        };
        if !source.periods.iter().any(|p| &p.id == reference) {
            return Err(PipelineError::ConfigValidation(format!(
                "source '{name}': reference_period '{reference}' is not one of its periods"
            )));
        }
        let mut ids = HashSet::new();
        for p in &source.periods {
            if !ids.insert(p.id.as_str()) {
                return Err(PipelineError::ConfigValidation(format!(
                    "source '{name}': duplicate period '{}'",
                    p.id
                )));
            }
        }
    } else if source.state_abbreviation_column.is_none() && source.state_name_column.is_none() {
        return Err(PipelineError::ConfigValidation(format!(
            "source '{name}': needs state_abbreviation_column or state_name_column"
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

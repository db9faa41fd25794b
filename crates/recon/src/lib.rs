//! `munimerge-recon`: Brazilian municipality dataset reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, normalizes and reconciles
//! municipality names against a master registry, and returns the merged
//! result or a typed error. No CLI or IO dependencies.

pub mod config;
pub mod dedup;
pub mod delinquency;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod positional;
pub mod prepare;
pub mod reconcile;
pub mod similarity;
pub mod states;
pub mod table;

pub use config::PipelineConfig;
pub use engine::run;
pub use error::PipelineError;
pub use model::{PipelineInput, PipelineResult, SourceData};
pub use table::{Cell, Table};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::loader::ReadOptions;
use crate::data::writer::{OutputFormat, WriteMode};
use crate::error::{Result, SpectrumError};
use crate::transform::{check_redshift, ErrorMode, GridSpec, UniformGrid};

/// Everything a batch run needs. Loadable from JSON; the CLI overrides
/// individual fields.
///
/// ```json
/// {
///   "input": "spectra/**/enhanced/*.tbl",
///   "name_filter": "SPITZER_S5",
///   "output_dir": "resampled",
///   "grid": { "start": 5.0, "end": 35.0, "num": 600 },
///   "catalog": "targets.csv",
///   "format": "ipac"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Input file, directory or glob pattern.
    pub input: PathBuf,
    /// Keep only inputs whose file name contains this substring.
    #[serde(default)]
    pub name_filter: Option<String>,
    pub output_dir: PathBuf,
    pub grid: GridSpec,
    /// Catalog file (CSV or JSON) mapping keys to redshifts.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Fixed redshift applied to every object when no catalog is given.
    #[serde(default)]
    pub redshift: Option<f64>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub error_mode: ErrorMode,
    #[serde(default)]
    pub read: ReadOptions,
}

impl PipelineConfig {
    pub fn new(input: PathBuf, output_dir: PathBuf, grid: GridSpec) -> Self {
        Self {
            input,
            name_filter: None,
            output_dir,
            grid,
            catalog: None,
            redshift: None,
            format: OutputFormat::default(),
            overwrite: false,
            error_mode: ErrorMode::default(),
            read: ReadOptions::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_mode(&self) -> WriteMode {
        WriteMode::from_overwrite(self.overwrite)
    }

    /// Reject settings that would fail for every input.
    pub fn validate(&self) -> Result<()> {
        UniformGrid::new(self.grid.start, self.grid.end, self.grid.num.unwrap_or(2))?;
        if let Some(z) = self.redshift {
            check_redshift(z)?;
        }
        if self.read.id_keyword.trim().is_empty() {
            return Err(SpectrumError::MissingMetadata {
                keyword: "id_keyword".to_string(),
            });
        }
        Ok(())
    }
}

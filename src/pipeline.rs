use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::RedshiftSource;
use crate::config::PipelineConfig;
use crate::data::discover::discover_inputs;
use crate::data::loader::ReaderRegistry;
use crate::data::model::{ResampledSpectrum, SpectrumRecord};
use crate::data::writer::{output_path, store};
use crate::error::{Result, SpectrumError};
use crate::transform::{deredshift_record, ErrorMode, GridSpec, Resampler};

/// `(record, z) -> resampled spectrum`: deredshift, build the grid, then
/// interpolate flux and propagate error onto it.
pub fn transform(
    record: &SpectrumRecord,
    z: f64,
    grid: &GridSpec,
    error_mode: ErrorMode,
) -> Result<ResampledSpectrum> {
    let rest = deredshift_record(record, z)?;
    let grid = grid.resolve(rest.sample_count())?;
    Resampler::new(grid)
        .with_error_mode(error_mode)
        .resample(&rest)
}

#[derive(Debug)]
pub struct WrittenOutput {
    pub source: PathBuf,
    pub id: String,
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: SpectrumError,
}

/// Outcome of a batch run; failures never stop sibling inputs.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<WrittenOutput>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, source: PathBuf, error: SpectrumError) {
        warn!("{}: {error}", source.display());
        self.failures.push(BatchFailure { source, error });
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            written: self
                .written
                .iter()
                .map(|w| WrittenEntry {
                    source: w.source.display().to_string(),
                    id: w.id.clone(),
                    output: w.output.display().to_string(),
                })
                .collect(),
            failed: self
                .failures
                .iter()
                .map(|f| FailedEntry {
                    source: f.source.display().to_string(),
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WrittenEntry {
    pub source: String,
    pub id: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct FailedEntry {
    pub source: String,
    pub kind: &'static str,
    pub message: String,
}

/// Serializable view of a [`BatchReport`].
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub written: Vec<WrittenEntry>,
    pub failed: Vec<FailedEntry>,
}

/// Per-file `load → resolve_redshift → transform → store`, run in parallel.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    redshifts: &'a dyn RedshiftSource,
    readers: ReaderRegistry,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, redshifts: &'a dyn RedshiftSource) -> Self {
        Self {
            config,
            redshifts,
            readers: ReaderRegistry::default(),
        }
    }

    pub fn with_readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    /// Everything up to, but not including, the write.
    pub fn prepare(&self, path: &Path) -> Result<ResampledSpectrum> {
        let record = self.readers.load(path, &self.config.read)?;
        let z = self.redshifts.resolve_redshift(record.id())?;
        debug!(
            "{}: id={} z={z} samples={}",
            path.display(),
            record.id(),
            record.sample_count()
        );
        transform(&record, z, &self.config.grid, self.config.error_mode)
    }

    /// Process every discovered input.
    ///
    /// Only discovery and configuration problems fail the whole run; each
    /// per-file error lands in the report. Outputs are keyed on the record
    /// identifier; when two inputs share one, the first in path order wins
    /// and the rest are reported as duplicates.
    pub fn run(&self) -> Result<BatchReport> {
        self.config.validate()?;
        let inputs = discover_inputs(
            &self.config.input,
            self.config.name_filter.as_deref(),
            &self.readers.extensions(),
        )?;
        info!("resampling {} inputs", inputs.len());

        let prepared: Vec<(PathBuf, Result<ResampledSpectrum>)> = inputs
            .into_par_iter()
            .map(|path| {
                let result = self.prepare(&path);
                (path, result)
            })
            .collect();

        let mut report = BatchReport::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let mut jobs = Vec::new();
        for (path, result) in prepared {
            match result {
                Ok(spectrum) => {
                    if let Some(first) = claimed.get(spectrum.id()) {
                        let error = SpectrumError::DuplicateIdentifier {
                            id: spectrum.id().to_string(),
                            first: first.clone(),
                        };
                        report.fail(path, error);
                    } else {
                        claimed.insert(spectrum.id().to_string(), path.clone());
                        jobs.push((path, spectrum));
                    }
                }
                Err(error) => report.fail(path, error),
            }
        }

        let format = self.config.format;
        let mode = self.config.write_mode();
        let dir = &self.config.output_dir;
        let stored: Vec<(PathBuf, String, Result<PathBuf>)> = jobs
            .into_par_iter()
            .map(|(path, spectrum)| {
                let result = output_path(dir, spectrum.id(), format)
                    .and_then(|out| store(&out, &spectrum, format, mode).map(|_| out));
                (path, spectrum.id().to_string(), result)
            })
            .collect();

        for (source, id, result) in stored {
            match result {
                Ok(output) => {
                    debug!("wrote {}", output.display());
                    report.written.push(WrittenOutput { source, id, output });
                }
                Err(error) => report.fail(source, error),
            }
        }
        report.failures.sort_by(|a, b| a.source.cmp(&b.source));

        info!(
            "{} written, {} failed",
            report.written.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

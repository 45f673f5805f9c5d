use std::path::PathBuf;

use thiserror::Error;

/// Every failure the library can report.
///
/// Variants are deterministic given their inputs; nothing in the crate
/// retries or recovers on its own. The batch driver is the only place that
/// catches them, and it does so per input file.
#[derive(Debug, Error)]
pub enum SpectrumError {
    // -- source tables --
    #[error("missing metadata keyword '{keyword}'")]
    MissingMetadata { keyword: String },

    #[error("expected column '{column}' not found")]
    SchemaMismatch { column: String },

    #[error("parse error ({context}): {message}")]
    Parse { context: String, message: String },

    #[error("unsupported table format: {0}")]
    UnsupportedFormat(String),

    // -- record invariants --
    #[error("column lengths differ: wavelength={wavelength}, flux={flux}, error={error}")]
    LengthMismatch {
        wavelength: usize,
        flux: usize,
        error: usize,
    },

    #[error("at least 2 samples are required, found {found}")]
    InsufficientSamples { found: usize },

    #[error("non-finite value in '{column}' at index {index}")]
    NonFinite { column: &'static str, index: usize },

    #[error("negative error value at index {index}")]
    NegativeError { index: usize },

    // -- redshift resolution --
    #[error("no catalog redshift for key '{key}'")]
    RedshiftLookup { key: String },

    #[error("key '{key}' matches {matches} catalog entries")]
    AmbiguousRedshift { key: String, matches: usize },

    #[error("invalid redshift z={z}: must be finite and greater than -1")]
    InvalidRedshift { z: f64 },

    // -- transform --
    #[error("wavelength is not strictly increasing at index {index}")]
    NonMonotonicWavelength { index: usize },

    #[error("invalid resample grid: {0}")]
    InvalidGrid(String),

    // -- batch / output --
    #[error("no input files matched '{pattern}'")]
    EmptyInput { pattern: String },

    #[error("output {} already exists (pass --overwrite to replace it)", path.display())]
    OutputExists { path: PathBuf },

    #[error("identifier '{id}' cannot name an output file")]
    InvalidIdentifier { id: String },

    #[error("identifier '{id}' was already produced by {}", first.display())]
    DuplicateIdentifier { id: String, first: PathBuf },

    // -- wrapped --
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, SpectrumError>;

impl SpectrumError {
    /// Short stable label for reports.
    pub fn kind(&self) -> &'static str {
        use SpectrumError::*;
        match self {
            MissingMetadata { .. } => "missing-metadata",
            SchemaMismatch { .. } => "schema-mismatch",
            Parse { .. } => "parse",
            UnsupportedFormat(_) => "unsupported-format",
            LengthMismatch { .. } => "length-mismatch",
            InsufficientSamples { .. } => "insufficient-samples",
            NonFinite { .. } => "non-finite",
            NegativeError { .. } => "negative-error",
            RedshiftLookup { .. } => "redshift-lookup",
            AmbiguousRedshift { .. } => "ambiguous-redshift",
            InvalidRedshift { .. } => "invalid-redshift",
            NonMonotonicWavelength { .. } => "non-monotonic-wavelength",
            InvalidGrid(_) => "invalid-grid",
            EmptyInput { .. } => "empty-input",
            OutputExists { .. } => "output-exists",
            InvalidIdentifier { .. } => "invalid-identifier",
            DuplicateIdentifier { .. } => "duplicate-identifier",
            Io(_) => "io",
            Csv(_) => "csv",
            Json(_) => "json",
            Arrow(_) => "arrow",
            Parquet(_) => "parquet",
            Pattern(_) | Glob(_) | Walk(_) => "discovery",
        }
    }

    pub(crate) fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        SpectrumError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumError};
use crate::transform::interp::ensure_strictly_increasing;

// ---------------------------------------------------------------------------
// MetadataValue – a single header keyword value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value, as found in table keyword blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Infer the narrowest type for a raw keyword value.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        match s {
            "T" | "true" => MetadataValue::Bool(true),
            "F" | "false" => MetadataValue::Bool(false),
            _ => MetadataValue::String(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// SpectrumRecord – one observed spectrum
// ---------------------------------------------------------------------------

/// Parallel wavelength / flux / error columns for one object.
///
/// Construction enforces the invariants the interpolation relies on:
/// equal lengths, at least two samples, finite values, non-negative errors
/// and strictly increasing wavelength. Fields are private; every transform
/// returns a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRecord {
    id: String,
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    error: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl SpectrumRecord {
    pub fn new(
        id: impl Into<String>,
        wavelength: Vec<f64>,
        flux: Vec<f64>,
        error: Vec<f64>,
    ) -> Result<Self> {
        validate_columns(&wavelength, &flux, &error)?;
        Ok(Self {
            id: id.into(),
            wavelength,
            flux,
            error,
            metadata: BTreeMap::new(),
        })
    }

    /// Sort samples by wavelength (keeping flux/error paired) before
    /// validating. Duplicate wavelengths are still rejected.
    pub fn from_unsorted(
        id: impl Into<String>,
        wavelength: Vec<f64>,
        flux: Vec<f64>,
        error: Vec<f64>,
    ) -> Result<Self> {
        check_lengths(&wavelength, &flux, &error)?;
        let mut rows: Vec<(f64, f64, f64)> = wavelength
            .into_iter()
            .zip(flux)
            .zip(error)
            .map(|((w, f), e)| (w, f, e))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut wavelength = Vec::with_capacity(rows.len());
        let mut flux = Vec::with_capacity(rows.len());
        let mut error = Vec::with_capacity(rows.len());
        for (w, f, e) in rows {
            wavelength.push(w);
            flux.push(f);
            error.push(e);
        }
        Self::new(id, wavelength, flux, error)
    }

    /// Attach header keywords.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, MetadataValue>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same flux, error, id and metadata over a new wavelength axis.
    pub(crate) fn with_wavelength(&self, wavelength: Vec<f64>) -> Result<Self> {
        validate_columns(&wavelength, &self.flux, &self.error)?;
        Ok(Self {
            id: self.id.clone(),
            wavelength,
            flux: self.flux.clone(),
            error: self.error.clone(),
            metadata: self.metadata.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn error(&self) -> &[f64] {
        &self.error
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    /// Number of samples (always >= 2).
    pub fn sample_count(&self) -> usize {
        self.wavelength.len()
    }

    /// `(min, max)` wavelength.
    pub fn wavelength_range(&self) -> (f64, f64) {
        // Non-empty and sorted by construction.
        (self.wavelength[0], self.wavelength[self.wavelength.len() - 1])
    }
}

fn check_lengths(wavelength: &[f64], flux: &[f64], error: &[f64]) -> Result<()> {
    if wavelength.len() != flux.len() || wavelength.len() != error.len() {
        return Err(SpectrumError::LengthMismatch {
            wavelength: wavelength.len(),
            flux: flux.len(),
            error: error.len(),
        });
    }
    if wavelength.len() < 2 {
        return Err(SpectrumError::InsufficientSamples {
            found: wavelength.len(),
        });
    }
    Ok(())
}

fn validate_columns(wavelength: &[f64], flux: &[f64], error: &[f64]) -> Result<()> {
    check_lengths(wavelength, flux, error)?;
    for (column, values) in [("wavelength", wavelength), ("flux", flux), ("error", error)] {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SpectrumError::NonFinite { column, index });
        }
    }
    if let Some(index) = error.iter().position(|&e| e < 0.0) {
        return Err(SpectrumError::NegativeError { index });
    }
    ensure_strictly_increasing(wavelength)
}

// ---------------------------------------------------------------------------
// ResampledSpectrum – output of the transform core
// ---------------------------------------------------------------------------

/// A spectrum on a uniform grid. Built only by the resampler.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSpectrum {
    id: String,
    grid: Vec<f64>,
    flux: Vec<f64>,
    error: Vec<f64>,
}

impl ResampledSpectrum {
    pub(crate) fn new(id: String, grid: Vec<f64>, flux: Vec<f64>, error: Vec<f64>) -> Self {
        debug_assert!(grid.len() == flux.len() && grid.len() == error.len());
        Self {
            id,
            grid,
            flux,
            error,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn error(&self) -> &[f64] {
        &self.error
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// `(wavelength, flux, error)` per grid point.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.grid
            .iter()
            .zip(&self.flux)
            .zip(&self.error)
            .map(|((&w, &f), &e)| (w, f, e))
    }
}

// ---------------------------------------------------------------------------
// TargetRecord – one catalog row
// ---------------------------------------------------------------------------

/// Catalog entry mapping an observation key to a redshift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "redshift")]
    pub z: f64,
}

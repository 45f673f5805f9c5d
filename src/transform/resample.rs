use super::grid::UniformGrid;
use super::interp::LinearInterpolator;
use super::propagate::{ErrorMode, ErrorPropagator};
use crate::data::model::{ResampledSpectrum, SpectrumRecord};
use crate::error::Result;

/// Puts flux and error onto a fixed uniform grid.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    grid: UniformGrid,
    errors: ErrorPropagator,
}

impl Resampler {
    pub fn new(grid: UniformGrid) -> Self {
        Self {
            grid,
            errors: ErrorPropagator::default(),
        }
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.errors = ErrorPropagator::new(mode);
        self
    }

    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    /// Interpolate flux only.
    pub fn resample_flux(&self, wavelength: &[f64], flux: &[f64]) -> Result<Vec<f64>> {
        Ok(LinearInterpolator::new(wavelength, flux)?.eval_sorted(&self.grid.points()))
    }

    /// Interpolate flux and propagate error from raw columns.
    pub fn resample_columns(
        &self,
        id: impl Into<String>,
        wavelength: &[f64],
        flux: &[f64],
        error: &[f64],
    ) -> Result<ResampledSpectrum> {
        let flux_out = self.resample_flux(wavelength, flux)?;
        let error_out = self.errors.propagate(wavelength, flux, error, &self.grid)?;
        Ok(ResampledSpectrum::new(
            id.into(),
            self.grid.points(),
            flux_out,
            error_out,
        ))
    }

    pub fn resample(&self, record: &SpectrumRecord) -> Result<ResampledSpectrum> {
        self.resample_columns(
            record.id(),
            record.wavelength(),
            record.flux(),
            record.error(),
        )
    }
}

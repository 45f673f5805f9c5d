use serde::{Deserialize, Serialize};

use super::grid::UniformGrid;
use super::interp::LinearInterpolator;
use crate::error::{Result, SpectrumError};

/// How resampled error bars are derived.
///
/// Linear interpolation is linear in the values, so both modes agree to
/// within rounding; `Offset` reproduces the upper-envelope formulation
/// `interp(flux + error) - interp(flux)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Interpolate the error column directly.
    #[default]
    Direct,
    /// Interpolate `flux + error`, then subtract the interpolated flux.
    Offset,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPropagator {
    mode: ErrorMode,
}

impl ErrorPropagator {
    pub fn new(mode: ErrorMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Resampled errors on `grid` for the source columns.
    ///
    /// Rejects exactly what the flux resampler rejects: mismatched lengths,
    /// fewer than two samples, or a wavelength axis that is not strictly
    /// increasing.
    pub fn propagate(
        &self,
        wavelength: &[f64],
        flux: &[f64],
        error: &[f64],
        grid: &UniformGrid,
    ) -> Result<Vec<f64>> {
        if flux.len() != wavelength.len() || error.len() != wavelength.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelength: wavelength.len(),
                flux: flux.len(),
                error: error.len(),
            });
        }
        let points = grid.points();
        match self.mode {
            ErrorMode::Direct => {
                // the flux interpolant is built only for its validation
                LinearInterpolator::new(wavelength, flux)?;
                Ok(LinearInterpolator::new(wavelength, error)?.eval_sorted(&points))
            }
            ErrorMode::Offset => {
                let upper: Vec<f64> = flux.iter().zip(error).map(|(f, e)| f + e).collect();
                let flux_out = LinearInterpolator::new(wavelength, flux)?.eval_sorted(&points);
                let upper_out = LinearInterpolator::new(wavelength, &upper)?.eval_sorted(&points);
                Ok(upper_out
                    .into_iter()
                    .zip(flux_out)
                    .map(|(u, f)| u - f)
                    .collect())
            }
        }
    }
}

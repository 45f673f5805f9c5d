//! Numeric core: rest-frame mapping, uniform grids and interpolation.
//!
//! ```text
//!  SpectrumRecord (observed frame)
//!        │  deredshift: λ / (1 + z)
//!        ▼
//!  SpectrumRecord (rest frame)
//!        │  Resampler: flux  ─┐
//!        │  ErrorPropagator: ─┤ same grid, same interpolant rule
//!        ▼                    ▼
//!  ResampledSpectrum
//! ```
//!
//! Everything here is pure and allocation-bounded; no I/O.

pub mod deredshift;
pub mod grid;
pub mod interp;
pub mod propagate;
pub mod resample;

pub use deredshift::{check_redshift, deredshift, deredshift_record};
pub use grid::{GridSpec, UniformGrid};
pub use interp::{ensure_strictly_increasing, LinearInterpolator};
pub use propagate::{ErrorMode, ErrorPropagator};
pub use resample::Resampler;

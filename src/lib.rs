//! Deredshift infrared spectra and resample them onto a shared rest-frame
//! wavelength grid.
//!
//! ```text
//!  input tables ──► ReaderRegistry ──► SpectrumRecord
//!                                         │  RedshiftSource (catalog / fixed)
//!                                         ▼
//!                              deredshift → UniformGrid → Resampler
//!                                         │
//!                                         ▼
//!                              ResampledSpectrum ──► writer (atomic)
//! ```
//!
//! [`pipeline::Pipeline`] drives the batch; the pieces are usable on their
//! own through [`pipeline::transform`] and the [`transform`] module.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod transform;

pub use catalog::{FixedRedshift, RedshiftSource, TargetCatalog};
pub use config::PipelineConfig;
pub use data::model::{ResampledSpectrum, SpectrumRecord, TargetRecord};
pub use error::{Result, SpectrumError};
pub use pipeline::{transform as transform_spectrum, BatchReport, Pipeline};

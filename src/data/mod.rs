//! Data layer: records, table formats, discovery and aggregation.
//!
//! Architecture:
//! ```text
//!  .tbl / .ipac / .ascii / .txt / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  ReaderRegistry → SpectrumReader → SpectrumRecord
//!   └──────────┘
//!        │   (transform core)
//!        ▼
//!   ┌──────────┐
//!   │  writer   │  ResampledSpectrum → tab / space / ipac / parquet
//!   └──────────┘
//!
//!  *_output.ipac ──► amplitude ──► one CSV row per object
//! ```

pub mod amplitude;
pub mod discover;
pub mod ipac;
pub mod loader;
pub mod model;
pub mod writer;

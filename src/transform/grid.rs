use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumError};

/// `num` equally spaced points over `[start, end]`, both ends included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformGrid {
    start: f64,
    end: f64,
    num: usize,
}

impl UniformGrid {
    pub fn new(start: f64, end: f64, num: usize) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SpectrumError::InvalidGrid(format!(
                "bounds must be finite (start={start}, end={end})"
            )));
        }
        if num < 2 {
            return Err(SpectrumError::InvalidGrid(format!(
                "at least 2 points are required, got {num}"
            )));
        }
        if end <= start {
            return Err(SpectrumError::InvalidGrid(format!(
                "end ({end}) must be greater than start ({start})"
            )));
        }
        Ok(Self { start, end, num })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn step(&self) -> f64 {
        (self.end - self.start) / (self.num - 1) as f64
    }

    /// Materialize the grid. The last point is pinned to `end`.
    pub fn points(&self) -> Vec<f64> {
        let step = self.step();
        (0..self.num)
            .map(|i| {
                if i == self.num - 1 {
                    self.end
                } else {
                    self.start + i as f64 * step
                }
            })
            .collect()
    }
}

/// Grid as configured for a batch: the sample count may be left open, in
/// which case each record is resampled onto as many points as it has.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub num: Option<usize>,
}

impl GridSpec {
    pub fn resolve(&self, sample_count: usize) -> Result<UniformGrid> {
        UniformGrid::new(self.start, self.end, self.num.unwrap_or(sample_count))
    }
}

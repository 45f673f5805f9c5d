use std::cmp::Ordering;

use crate::error::{Result, SpectrumError};

/// Fail with the first index `i` where `xs[i] <= xs[i - 1]`.
///
/// NaN compares as a violation.
pub fn ensure_strictly_increasing(xs: &[f64]) -> Result<()> {
    match xs
        .windows(2)
        .position(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
    {
        Some(i) => Err(SpectrumError::NonMonotonicWavelength { index: i + 1 }),
        None => Ok(()),
    }
}

/// Piecewise-linear interpolant over validated sample points.
///
/// Queries below the first node return the first value and queries above
/// the last node return the last value (flat extrapolation). A query that
/// lands on a node returns that node's value exactly.
#[derive(Debug, Clone, Copy)]
pub struct LinearInterpolator<'a> {
    xp: &'a [f64],
    fp: &'a [f64],
}

impl<'a> LinearInterpolator<'a> {
    pub fn new(xp: &'a [f64], fp: &'a [f64]) -> Result<Self> {
        if xp.len() != fp.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelength: xp.len(),
                flux: fp.len(),
                error: fp.len(),
            });
        }
        if xp.len() < 2 {
            return Err(SpectrumError::InsufficientSamples { found: xp.len() });
        }
        ensure_strictly_increasing(xp)?;
        Ok(Self { xp, fp })
    }

    /// Evaluate a single point (binary search).
    pub fn eval(&self, x: f64) -> f64 {
        let last = self.xp.len() - 1;
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= self.xp[0] {
            return self.fp[0];
        }
        if x >= self.xp[last] {
            return self.fp[last];
        }
        let j = self.xp.partition_point(|&v| v <= x) - 1;
        self.segment(j, x)
    }

    /// Evaluate an ascending sequence of points in O(len(xp) + len(xs)).
    pub fn eval_sorted(&self, xs: &[f64]) -> Vec<f64> {
        let last = self.xp.len() - 1;
        let mut j = 0;
        xs.iter()
            .map(|&x| {
                if x.is_nan() {
                    return f64::NAN;
                }
                if x <= self.xp[0] {
                    return self.fp[0];
                }
                if x >= self.xp[last] {
                    return self.fp[last];
                }
                if x < self.xp[j] {
                    // query went backwards; re-seek
                    j = self.xp.partition_point(|&v| v <= x) - 1;
                }
                while self.xp[j + 1] <= x {
                    j += 1;
                }
                self.segment(j, x)
            })
            .collect()
    }

    /// Interpolate inside `[xp[j], xp[j + 1])`.
    fn segment(&self, j: usize, x: f64) -> f64 {
        let x0 = self.xp[j];
        if x == x0 {
            return self.fp[j];
        }
        let slope = (self.fp[j + 1] - self.fp[j]) / (self.xp[j + 1] - x0);
        slope * (x - x0) + self.fp[j]
    }
}

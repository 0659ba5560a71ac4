//! Scalar binning strategies for field values.
use crate::error::{GeomError, Result};
use serde::{Deserialize, Serialize};

/// Where a value falls relative to a set of bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinSlot {
    Underflow,
    Bin(usize),
    Overflow,
}

/// Maps scalar values to bin indices and back to representative values.
pub trait Binning: Send + Sync {
    fn n_bins(&self) -> usize;

    /// Raw (possibly out-of-range) bin index of `value`.
    fn raw_index(&self, value: f64) -> i64;

    /// Representative value of bin `index`.
    fn midpoint(&self, index: usize) -> f64;

    fn slot(&self, value: f64) -> BinSlot {
        let i = self.raw_index(value);
        if i < 0 {
            BinSlot::Underflow
        } else if i as usize >= self.n_bins() {
            BinSlot::Overflow
        } else {
            BinSlot::Bin(i as usize)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    pub min: f64,
    pub max: f64,
    pub n_bins: usize,
    #[serde(default)]
    pub log_scale: bool,
}

impl BinningConfig {
    pub fn linear(min: f64, max: f64, n_bins: usize) -> Self {
        Self {
            min,
            max,
            n_bins,
            log_scale: false,
        }
    }

    pub fn log(min: f64, max: f64, n_bins: usize) -> Self {
        Self {
            min,
            max,
            n_bins,
            log_scale: true,
        }
    }
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self::linear(297.5, 597.5, 60)
    }
}

/// Picks the binning strategy described by `config`.
pub fn build_binning(config: &BinningConfig) -> Result<Box<dyn Binning>> {
    if config.log_scale {
        Ok(Box::new(LogBinning::new(config.min, config.max, config.n_bins)?))
    } else {
        Ok(Box::new(LinearBinning::new(config.min, config.max, config.n_bins)?))
    }
}

/// Equal-width bins over `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBinning {
    min: f64,
    width: f64,
    n_bins: usize,
}

impl LinearBinning {
    pub fn new(min: f64, max: f64, n_bins: usize) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(GeomError::Config(format!(
                "binning range must satisfy min < max, got [{min}, {max}]"
            )));
        }
        if n_bins == 0 {
            return Err(GeomError::Config("number of bins must be positive".into()));
        }
        Ok(Self {
            min,
            width: (max - min) / n_bins as f64,
            n_bins,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }
}

impl Binning for LinearBinning {
    fn n_bins(&self) -> usize {
        self.n_bins
    }

    fn raw_index(&self, value: f64) -> i64 {
        ((value - self.min) / self.width).floor() as i64
    }

    fn midpoint(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.width
    }
}

/// Bins evenly spaced in `log10` within each decade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogBinning {
    pow_min: i32,
    n_minor: usize,
    n_bins: usize,
}

impl LogBinning {
    pub fn new(min: f64, max: f64, n_bins: usize) -> Result<Self> {
        if !(min > 0. && max.is_finite()) || max <= min {
            return Err(GeomError::Config(format!(
                "log binning needs 0 < min < max, got [{min}, {max}]"
            )));
        }
        let pow_min = min.log10().floor() as i32;
        let pow_max = max.log10().ceil() as i32;
        let n_decades = (pow_max - pow_min).max(1) as usize;
        if n_bins == 0 || n_bins % n_decades != 0 {
            return Err(GeomError::Config(format!(
                "log binning needs a positive multiple of {n_decades} bins, got {n_bins}"
            )));
        }
        Ok(Self {
            pow_min,
            n_minor: n_bins / n_decades,
            n_bins,
        })
    }

    pub fn bins_per_decade(&self) -> usize {
        self.n_minor
    }
}

impl Binning for LogBinning {
    fn n_bins(&self) -> usize {
        self.n_bins
    }

    fn raw_index(&self, value: f64) -> i64 {
        if value <= 0. {
            return -1;
        }
        let p = value.log10();
        let major = p.floor() as i64 - self.pow_min as i64;
        let minor = ((p - p.floor()) * self.n_minor as f64).floor() as i64;
        self.n_minor as i64 * major + minor
    }

    fn midpoint(&self, index: usize) -> f64 {
        10f64.powf(self.pow_min as f64 + (index as f64 + 0.5) / self.n_minor as f64)
    }
}

/// Linear bins of relative density over the symmetric range
/// `[1 - range, 1 + range]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeDensityBinning {
    range: f64,
    bins: LinearBinning,
}

impl RelativeDensityBinning {
    pub fn new(range: f64, n_bins: usize) -> Result<Self> {
        if !(range > 0. && range < 1.) {
            return Err(GeomError::Config(format!(
                "relative density range must be in (0, 1), got {range}"
            )));
        }
        Ok(Self {
            range,
            bins: LinearBinning::new(1. - range, 1. + range, n_bins)?,
        })
    }

    pub fn min(&self) -> f64 {
        1. - self.range
    }

    pub fn max(&self) -> f64 {
        1. + self.range
    }
}

impl Binning for RelativeDensityBinning {
    fn n_bins(&self) -> usize {
        self.bins.n_bins()
    }

    fn raw_index(&self, value: f64) -> i64 {
        // The upper edge belongs to the last bin
        if value == self.max() {
            return self.bins.n_bins() as i64 - 1;
        }
        self.bins.raw_index(value)
    }

    fn midpoint(&self, index: usize) -> f64 {
        self.bins.midpoint(index)
    }
}

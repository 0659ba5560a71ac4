use crate::boundary::BoundaryCondition;
use crate::derive::binning::{BinningConfig, RelativeDensityBinning, build_binning};
use crate::error::{GeomError, Result};
use crate::materials::MaterialSpec;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Binning of element densities relative to each material's reference density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    pub variable: String,
    /// Half-width of the relative range `[1 - range, 1 + range]`.
    pub range: f64,
    pub n_bins: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Stl,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Stl => "stl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// Files are named `<output_base>_<n>.<ext>`.
    pub output_base: String,
    /// Maximum number of files written.
    pub n_output: usize,
    /// Updates skipped between two snapshots.
    pub n_skip: usize,
    pub format: SnapshotFormat,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_base: "moab_surfs".to_string(),
            n_output: 10,
            n_skip: 0,
            format: SnapshotFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriverConfig {
    /// Factor applied to mesh coordinates when building the geometry.
    pub length_scale: f64,

    // Binning
    pub temperature_variable: String,
    pub temperature_bins: BinningConfig,
    pub density: Option<DensityConfig>,

    // Model
    pub materials: Vec<MaterialSpec>,
    pub boundary_conditions: Vec<BoundaryCondition>,

    // Tolerances
    pub faceting_tol: f64,
    pub geometry_resabs: f64,
    /// Barycentric tolerance used when locating points in elements.
    pub locator_tol: f64,

    // Output
    pub snapshots: SnapshotConfig,
}

impl DeriverConfig {
    pub fn new() -> Self {
        Self {
            length_scale: 1.,
            temperature_variable: "temperature".to_string(),
            temperature_bins: BinningConfig::default(),
            density: None,
            materials: Vec::new(),
            boundary_conditions: Vec::new(),
            faceting_tol: 1e-4,
            geometry_resabs: 1e-6,
            locator_tol: 1e-9,
            snapshots: SnapshotConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse deriver config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Checks settings that do not depend on the mesh.
    pub fn validate(&self) -> Result<()> {
        if !(self.length_scale > 0. && self.length_scale.is_finite()) {
            return Err(GeomError::Config(format!(
                "length_scale must be positive, got {}",
                self.length_scale
            )));
        }
        if self.temperature_variable.is_empty() {
            return Err(GeomError::Config("temperature_variable is empty".into()));
        }
        if self.materials.is_empty() {
            return Err(GeomError::Config("no materials given".into()));
        }
        build_binning(&self.temperature_bins)?;
        if let Some(den) = &self.density {
            RelativeDensityBinning::new(den.range, den.n_bins)?;
            if den.variable.is_empty() {
                return Err(GeomError::Config("density variable is empty".into()));
            }
            if let Some(m) = self.materials.iter().find(|m| m.density.is_none_or(|d| d <= 0.)) {
                return Err(GeomError::Config(format!(
                    "material '{}' needs a positive reference density for density binning",
                    m.name
                )));
            }
        }
        if self.faceting_tol <= 0. || self.geometry_resabs <= 0. || self.locator_tol < 0. {
            return Err(GeomError::Config("tolerances must be positive".into()));
        }
        for bc in &self.boundary_conditions {
            bc.validate()?;
        }
        Ok(())
    }
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Classification of mesh elements into (material, density, temperature) bins.
use crate::derive::binning::{BinSlot, Binning, RelativeDensityBinning};
use crate::error::{GeomError, Result};
use crate::fem::comm::Communicator;
use crate::fem::locator::FieldSampler;
use crate::fem::mesh::{ElemId, FeMesh};
use crate::materials::MaterialPartition;
use std::collections::BTreeSet;

/// Shape of the flat bin array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinLayout {
    pub n_materials: usize,
    pub n_density: usize,
    pub n_temperature: usize,
}

impl BinLayout {
    pub fn n_bins(&self) -> usize {
        self.n_materials * self.n_density * self.n_temperature
    }

    pub fn index(&self, material: usize, density: usize, temperature: usize) -> usize {
        temperature + self.n_temperature * (density + self.n_density * material)
    }

    /// Inverse of [`BinLayout::index`]: `(material, density, temperature)`.
    pub fn split(&self, index: usize) -> (usize, usize, usize) {
        let temperature = index % self.n_temperature;
        let rest = index / self.n_temperature;
        (rest / self.n_density, rest % self.n_density, temperature)
    }
}

/// Elements sorted into bins, identical on every rank.
#[derive(Debug, Clone)]
pub struct BinnedElements {
    pub layout: BinLayout,
    pub bins: Vec<BTreeSet<ElemId>>,
    pub underflow: BTreeSet<ElemId>,
    pub overflow: BTreeSet<ElemId>,
}

impl BinnedElements {
    pub fn n_sorted(&self) -> usize {
        self.bins.iter().map(BTreeSet::len).sum::<usize>() + self.underflow.len() + self.overflow.len()
    }
}

/// Field read for density binning, relative to each material's reference density.
pub struct DensityInput<'a> {
    pub sampler: FieldSampler<'a>,
    pub binning: &'a RelativeDensityBinning,
}

/// Sorts the locally owned elements and merges the bins across ranks.
///
/// Temperatures outside the binning range go to the underflow and overflow
/// sets. A relative density outside its range fails the sort on every rank.
pub fn sort_elements(
    mesh: &FeMesh,
    comm: &dyn Communicator,
    partition: &MaterialPartition,
    temperature: &FieldSampler<'_>,
    temperature_bins: &dyn Binning,
    density: Option<&DensityInput<'_>>,
) -> Result<BinnedElements> {
    let layout = BinLayout {
        n_materials: partition.n_materials(),
        n_density: density.map_or(1, |d| d.binning.n_bins()),
        n_temperature: temperature_bins.n_bins(),
    };
    let n_bins = layout.n_bins();

    // Bins followed by the underflow and overflow sets
    let local = sort_local(mesh, comm.rank(), partition, temperature, temperature_bins, density, layout);
    if !comm.all_true(local.is_ok()) {
        return Err(local.err().unwrap_or(GeomError::RemoteFailure("element sorting")));
    }
    let mut sets = local?;
    comm.union_sets(&mut sets);

    let overflow = sets.pop().unwrap_or_default();
    let underflow = sets.pop().unwrap_or_default();
    debug_assert_eq!(sets.len(), n_bins);

    if !underflow.is_empty() {
        log::warn!(
            "{} elements have {} below the binning range",
            underflow.len(),
            temperature.variable()
        );
    }
    if !overflow.is_empty() {
        log::warn!(
            "{} elements have {} above the binning range",
            overflow.len(),
            temperature.variable()
        );
    }
    log::debug!(
        "Sorted elements into {} of {} bins",
        sets.iter().filter(|s| !s.is_empty()).count(),
        n_bins
    );

    Ok(BinnedElements {
        layout,
        bins: sets,
        underflow,
        overflow,
    })
}

fn sort_local(
    mesh: &FeMesh,
    rank: usize,
    partition: &MaterialPartition,
    temperature: &FieldSampler<'_>,
    temperature_bins: &dyn Binning,
    density: Option<&DensityInput<'_>>,
    layout: BinLayout,
) -> Result<Vec<BTreeSet<ElemId>>> {
    let mut sets = vec![BTreeSet::new(); layout.n_bins() + 2];
    let underflow = layout.n_bins();
    let overflow = underflow + 1;

    for elem in mesh.local_elements(rank) {
        let block = mesh.element(elem)?.block;
        let mat = partition.material_of(block).ok_or_else(|| {
            GeomError::MaterialPartition(format!("block {block} of element {elem} has no material"))
        })?;

        let den = match density {
            Some(d) => density_bin(elem, mat, partition, d)?,
            None => 0,
        };

        let target = match temperature_bins.slot(temperature.element_value(elem)?) {
            BinSlot::Bin(i) => layout.index(mat, den, i),
            BinSlot::Underflow => underflow,
            BinSlot::Overflow => overflow,
        };
        sets[target].insert(elem);
    }
    Ok(sets)
}

fn density_bin(
    elem: ElemId,
    mat: usize,
    partition: &MaterialPartition,
    density: &DensityInput<'_>,
) -> Result<usize> {
    let spec = partition
        .material(mat)
        .ok_or_else(|| GeomError::MaterialPartition(format!("no material {mat}")))?;
    let reference = spec.density.ok_or_else(|| {
        GeomError::Config(format!("material '{}' has no reference density", spec.name))
    })?;
    let value = density.sampler.element_value(elem)? / reference;
    match density.binning.slot(value) {
        BinSlot::Bin(i) => Ok(i),
        _ => Err(GeomError::DensityOutOfRange {
            elem,
            value,
            min: density.binning.min(),
            max: density.binning.max(),
        }),
    }
}

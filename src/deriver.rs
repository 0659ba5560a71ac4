//! Top-level geometry derivation: turns the binned mesh into groups,
//! volumes and surfaces on every `update`.
use crate::boundary::apply_boundary_conditions;
use crate::bridge::{ElementHandleMap, WriteOptions, set_solution};
use crate::config::DeriverConfig;
use crate::db::{GeomDb, Sense, SetHandle, VertexHandle};
use crate::derive::binning::{Binning, RelativeDensityBinning, build_binning};
use crate::derive::graveyard::build_graveyard;
use crate::derive::regions::group_regions;
use crate::derive::skin::find_skin;
use crate::derive::sorter::{BinnedElements, DensityInput, sort_elements};
use crate::derive::surfaces::resolve_faces;
use crate::derive::topology::Topology;
use crate::error::{GeomError, Result};
use crate::fem::comm::Communicator;
use crate::fem::field::FieldSystem;
use crate::fem::locator::FieldSampler;
use crate::fem::mesh::FeMesh;
use crate::geom::bboxes::BoundingBox;
use crate::io::snapshot::SnapshotWriter;
use crate::materials::{GRAVEYARD, MaterialLibrary, MaterialPartition, group_name};
use std::collections::HashMap;

/// What a volume stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInfo {
    pub material: String,
    /// Binned density, when binning by density.
    pub density: Option<f64>,
    /// Representative temperature. `None` for the graveyard.
    pub temperature: Option<f64>,
}

/// Counts reported by one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub n_groups: usize,
    pub n_volumes: usize,
    pub n_surfaces: usize,
    pub n_triangles: usize,
    pub n_underflow: usize,
    pub n_overflow: usize,
}

pub struct GeometryDeriver {
    config: DeriverConfig,
    temperature_bins: Box<dyn Binning>,
    density_bins: Option<RelativeDensityBinning>,
    partition: Option<MaterialPartition>,

    db: GeomDb,
    topology: Topology,
    handles: ElementHandleMap,
    node_handles: Vec<VertexHandle>,
    volumes: HashMap<SetHandle, VolumeInfo>,
    bounding_box: Option<BoundingBox>,
    valid: bool,

    snapshots: SnapshotWriter,
}

impl GeometryDeriver {
    pub fn new(config: DeriverConfig) -> Result<Self> {
        config.validate()?;
        let temperature_bins = build_binning(&config.temperature_bins)?;
        let density_bins = config
            .density
            .as_ref()
            .map(|d| RelativeDensityBinning::new(d.range, d.n_bins))
            .transpose()?;
        let mut db = GeomDb::new();
        db.set_tolerances(config.faceting_tol, config.geometry_resabs);
        let snapshots = SnapshotWriter::new(config.snapshots.clone());

        Ok(Self {
            config,
            temperature_bins,
            density_bins,
            partition: None,
            db,
            topology: Topology::new(),
            handles: ElementHandleMap::new(0),
            node_handles: Vec::new(),
            volumes: HashMap::new(),
            bounding_box: None,
            valid: false,
            snapshots,
        })
    }

    pub fn config(&self) -> &DeriverConfig {
        &self.config
    }

    /// Checks the mesh and builds the material partition of its blocks.
    pub fn init(&mut self, mesh: &FeMesh) -> Result<()> {
        mesh.check_tetrahedral()?;
        let partition = MaterialPartition::new(&self.config.materials, &mesh.blocks())?;
        log::info!(
            "Geometry deriver ready: {} elements, {} materials, {} temperature bins",
            mesh.n_elements(),
            partition.n_materials(),
            self.temperature_bins.n_bins()
        );
        self.partition = Some(partition);
        Ok(())
    }

    /// Rebuilds the whole geometry from the current mesh positions and
    /// field values. Must be called collectively on every rank.
    ///
    /// On failure the geometry is left unusable until the next successful
    /// update or [`GeometryDeriver::reset`].
    pub fn update(
        &mut self,
        mesh: &FeMesh,
        fields: &FieldSystem,
        comm: &dyn Communicator,
    ) -> Result<UpdateSummary> {
        let partition = self.partition.take().ok_or(GeomError::NotInitialised)?;
        let result = self.derive(mesh, fields, comm, &partition);
        self.partition = Some(partition);
        self.valid = result.is_ok();

        let summary = result?;
        log::info!(
            "Derived {} volumes, {} surfaces and {} facets in {} groups",
            summary.n_volumes,
            summary.n_surfaces,
            summary.n_triangles,
            summary.n_groups
        );

        if comm.rank() == 0 {
            // A failed snapshot does not invalidate the geometry
            if let Err(err) = self.snapshots.maybe_write(&self.db) {
                log::warn!("Geometry snapshot failed: {err:#}");
            }
        }
        Ok(summary)
    }

    fn derive(
        &mut self,
        mesh: &FeMesh,
        fields: &FieldSystem,
        comm: &dyn Communicator,
        partition: &MaterialPartition,
    ) -> Result<UpdateSummary> {
        self.clear();
        self.copy_mesh(mesh)?;

        let binned = self.sort(mesh, fields, comm, partition)?;
        self.build_volumes(mesh, &binned, partition)?;

        let bbox = mesh
            .bounding_box()
            .ok_or_else(|| GeomError::InvalidMesh("mesh has no nodes".into()))?;
        let ls = self.config.length_scale;
        let bbox = BoundingBox::new(bbox.min.scale(ls), bbox.max.scale(ls));
        let graveyard_id = graveyard_group_id(partition, self.density_bins.as_ref());
        let graveyard = build_graveyard(&mut self.db, &mut self.topology, &bbox, graveyard_id)?;
        self.volumes.insert(
            graveyard,
            VolumeInfo {
                material: GRAVEYARD.to_string(),
                density: None,
                temperature: None,
            },
        );
        self.bounding_box = Some(bbox);

        apply_boundary_conditions(
            &mut self.db,
            &mut self.topology,
            mesh,
            &self.node_handles,
            &self.config.boundary_conditions,
            graveyard_id + 1,
        )?;

        self.topology.check_invariants(&self.db)?;

        Ok(UpdateSummary {
            n_groups: self.topology.groups().len(),
            n_volumes: self.topology.volumes().len(),
            n_surfaces: self.topology.surfaces().len(),
            n_triangles: self.db.n_triangles(),
            n_underflow: binned.underflow.len(),
            n_overflow: binned.overflow.len(),
        })
    }

    /// Copies nodes (scaled) and the linear tetrahedra of every element.
    fn copy_mesh(&mut self, mesh: &FeMesh) -> Result<()> {
        let ls = self.config.length_scale;
        self.node_handles = mesh
            .nodes()
            .map(|p| self.db.create_vertex(p.scale(ls)))
            .collect();

        self.handles = ElementHandleMap::new(mesh.n_elements());
        for (elem, element) in mesh.elements().iter().enumerate() {
            for tet in element.linear_tets() {
                let h = self.db.create_tet(tet.map(|n| self.node_handles[n]));
                self.handles.insert(elem, h)?;
            }
        }
        log::debug!(
            "Copied {} nodes and {} tetrahedra",
            self.db.n_vertices(),
            self.db.n_tets()
        );
        Ok(())
    }

    fn sort(
        &self,
        mesh: &FeMesh,
        fields: &FieldSystem,
        comm: &dyn Communicator,
        partition: &MaterialPartition,
    ) -> Result<BinnedElements> {
        let tol = self.config.locator_tol;
        let temperature =
            FieldSampler::new(mesh, fields, &self.config.temperature_variable, tol)?;
        let density = match (&self.config.density, &self.density_bins) {
            (Some(cfg), Some(binning)) => Some(DensityInput {
                sampler: FieldSampler::new(mesh, fields, &cfg.variable, tol)?,
                binning,
            }),
            _ => None,
        };
        sort_elements(
            mesh,
            comm,
            partition,
            &temperature,
            self.temperature_bins.as_ref(),
            density.as_ref(),
        )
    }

    fn build_volumes(
        &mut self,
        mesh: &FeMesh,
        binned: &BinnedElements,
        partition: &MaterialPartition,
    ) -> Result<()> {
        let layout = binned.layout;
        let mut groups: HashMap<usize, SetHandle> = HashMap::new();

        for (index, elems) in binned.bins.iter().enumerate() {
            if elems.is_empty() {
                continue;
            }
            let (mat, den, temp) = layout.split(index);
            let spec = partition
                .material(mat)
                .ok_or_else(|| GeomError::MaterialPartition(format!("no material {mat}")))?;
            let density_bin = self.density_bins.as_ref().map(|_| den);
            let density = match (&self.density_bins, spec.density) {
                (Some(bins), Some(reference)) => Some(bins.midpoint(den) * reference),
                _ => None,
            };
            let temperature = self.temperature_bins.midpoint(temp);

            let slot = mat * layout.n_density + den;
            let group = match groups.get(&slot) {
                Some(&g) => g,
                None => {
                    let g = self.topology.create_group(
                        &mut self.db,
                        slot as u32 + 1,
                        &group_name(&spec.name, density_bin),
                    );
                    groups.insert(slot, g);
                    g
                }
            };

            for region in group_regions(mesh, elems, &self.handles) {
                let volume = self.topology.create_volume(&mut self.db, group)?;
                self.volumes.insert(
                    volume,
                    VolumeInfo {
                        material: spec.name.clone(),
                        density,
                        temperature: Some(temperature),
                    },
                );

                let skin = find_skin(&mut self.db, &region)?;
                resolve_faces(
                    &mut self.db,
                    &mut self.topology,
                    skin.forward,
                    volume,
                    Sense::Forward,
                )?;
                resolve_faces(
                    &mut self.db,
                    &mut self.topology,
                    skin.reverse,
                    volume,
                    Sense::Reverse,
                )?;
            }
        }
        log::debug!(
            "Built {} volumes in {} material groups",
            self.topology.volumes().len(),
            groups.len()
        );
        Ok(())
    }

    fn clear(&mut self) {
        self.db.clear();
        self.topology = Topology::new();
        self.handles.clear();
        self.node_handles.clear();
        self.volumes.clear();
        self.bounding_box = None;
        self.valid = false;
    }

    /// Drops all derived geometry.
    pub fn reset(&mut self) {
        self.clear();
        log::debug!("Geometry database reset");
    }

    /// Whether the last update succeeded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(GeomError::NotInitialised)
        }
    }

    pub fn db(&self) -> &GeomDb {
        &self.db
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn handles(&self) -> &ElementHandleMap {
        &self.handles
    }

    pub fn graveyard(&self) -> Result<SetHandle> {
        self.ensure_valid()?;
        self.topology.graveyard().ok_or(GeomError::NotInitialised)
    }

    /// Scaled bounding box of the mesh the graveyard was built around.
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        self.ensure_valid()?;
        self.bounding_box.ok_or(GeomError::NotInitialised)
    }

    pub fn volume_info(&self, volume: SetHandle) -> Result<&VolumeInfo> {
        self.ensure_valid()?;
        self.volumes
            .get(&volume)
            .ok_or(GeomError::UnknownSet(volume.index()))
    }

    /// Representative temperature of a volume. Fails for the graveyard.
    pub fn temperature(&self, volume: SetHandle) -> Result<f64> {
        self.volume_info(volume)?
            .temperature
            .ok_or(GeomError::NoTemperature(volume.index()))
    }

    /// Transport material id of a volume.
    ///
    /// The material name is the one recorded when the volume was created.
    /// It is the same name its parent group carries as
    /// `mat:<material>[_<density bin>]`, without parsing it back out of
    /// the group name.
    pub fn material_id(&self, volume: SetHandle, library: &MaterialLibrary) -> Result<i32> {
        let info = self.volume_info(volume)?;
        library.resolve(&info.material, info.density)
    }

    /// Writes per-tetrahedron results into `variable`. See [`set_solution`].
    pub fn set_solution(
        &self,
        mesh: &FeMesh,
        fields: &mut FieldSystem,
        comm: &dyn Communicator,
        variable: &str,
        results: &[f64],
        opts: WriteOptions,
    ) -> Result<bool> {
        self.ensure_valid()?;
        set_solution(mesh, fields, &self.handles, comm, variable, results, opts)
    }
}

/// Id of the graveyard group, after every possible material group.
fn graveyard_group_id(partition: &MaterialPartition, density: Option<&RelativeDensityBinning>) -> u32 {
    let n_density = density.map_or(1, |d| d.n_bins());
    (partition.n_materials() * n_density) as u32 + 1
}

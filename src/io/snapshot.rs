//! JSON snapshots of the derived geometry and their write cadence.
use crate::config::{SnapshotConfig, SnapshotFormat};
use crate::db::{GeomDb, Sense, SetHandle, SetTags, TriHandle, VertexHandle};
use crate::geom::point::Point;
use crate::io::stl::{StlFormat, write_surfaces_stl};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Entity set with its relations expressed as indices into the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub tags: SetTags,
    pub triangles: Vec<usize>,
    pub children: Vec<usize>,
    /// `(volume set index, sense)`
    pub senses: Vec<(usize, Sense)>,
}

/// Serializable image of the facet geometry. Tetrahedra are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub faceting_tol: f64,
    pub geometry_resabs: f64,
    pub vertices: Vec<Point>,
    pub triangles: Vec<[usize; 3]>,
    pub sets: Vec<SnapshotSet>,
}

impl GeometrySnapshot {
    pub fn from_db(db: &GeomDb) -> Result<Self> {
        let vertices = (0..db.n_vertices()).map(|i| db.vertex(VertexHandle(i))).collect();
        let triangles = (0..db.n_triangles())
            .map(|i| db.triangle(TriHandle(i)).map(|v| v.index()))
            .collect();

        let mut sets = Vec::with_capacity(db.n_sets());
        for i in 0..db.n_sets() {
            let set = db.set(SetHandle(i))?;
            sets.push(SnapshotSet {
                tags: set.tags().clone(),
                triangles: set.triangles().iter().map(|t| t.index()).collect(),
                children: set.children().iter().map(|c| c.index()).collect(),
                senses: set.senses().iter().map(|(v, s)| (v.index(), *s)).collect(),
            });
        }

        Ok(Self {
            faceting_tol: db.faceting_tol(),
            geometry_resabs: db.geometry_resabs(),
            vertices,
            triangles,
            sets,
        })
    }

    /// Rebuilds a database. Handles keep the indices of the snapshot.
    pub fn to_db(&self) -> Result<GeomDb> {
        let mut db = GeomDb::new();
        db.set_tolerances(self.faceting_tol, self.geometry_resabs);
        for &p in &self.vertices {
            db.create_vertex(p);
        }

        let n_vertices = self.vertices.len();
        for (i, tri) in self.triangles.iter().enumerate() {
            ensure!(
                tri.iter().all(|&v| v < n_vertices),
                "Triangle {i} references a missing vertex"
            );
            let (_, created) = db.find_or_create_triangle(tri.map(VertexHandle));
            ensure!(created, "Triangle {i} is a duplicate");
        }

        for set in &self.sets {
            db.create_set(set.tags.clone());
        }
        let n_triangles = self.triangles.len();
        for (i, set) in self.sets.iter().enumerate() {
            let h = SetHandle(i);
            ensure!(
                set.triangles.iter().all(|&t| t < n_triangles),
                "Set {i} references a missing triangle"
            );
            db.add_triangles(h, set.triangles.iter().map(|&t| TriHandle(t)))?;
            for &child in &set.children {
                db.add_parent_child(h, SetHandle(child))
                    .with_context(|| format!("Set {i} has an invalid child"))?;
            }
            for &(vol, sense) in &set.senses {
                db.set_sense(h, SetHandle(vol), sense)
                    .with_context(|| format!("Set {i} has an invalid sense"))?;
            }
        }
        Ok(db)
    }
}

pub fn write_snapshot(path: &Path, db: &GeomDb) -> Result<()> {
    let snapshot = GeometrySnapshot::from_db(db)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &snapshot)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<GeomDb> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let snapshot: GeometrySnapshot = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;
    snapshot
        .to_db()
        .with_context(|| format!("Inconsistent snapshot: {}", path.display()))
}

/// Writes the geometry every `n_skip + 1` updates, up to `n_output` files.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    config: SnapshotConfig,
    n_write: usize,
    n_its: usize,
}

impl SnapshotWriter {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            n_write: 0,
            n_its: 0,
        }
    }

    pub fn n_written(&self) -> usize {
        self.n_write
    }

    pub fn path_for(&self, n: usize) -> PathBuf {
        PathBuf::from(format!(
            "{}_{}.{}",
            self.config.output_base,
            n,
            self.config.format.extension()
        ))
    }

    /// Called once per update. Returns the path written, if any.
    pub fn maybe_write(&mut self, db: &GeomDb) -> Result<Option<PathBuf>> {
        if !self.config.enabled || self.n_write >= self.config.n_output {
            return Ok(None);
        }
        let due = self.n_its % (self.config.n_skip + 1) == 0;
        self.n_its += 1;
        if !due {
            return Ok(None);
        }

        let path = self.path_for(self.n_write);
        match self.config.format {
            SnapshotFormat::Json => write_snapshot(&path, db)?,
            SnapshotFormat::Stl => write_surfaces_stl(&path, db, StlFormat::Ascii)?,
        }
        self.n_write += 1;
        log::info!("Wrote geometry snapshot {}", path.display());
        Ok(Some(path))
    }
}

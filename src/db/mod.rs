//! In-memory geometry database: vertices, tetrahedra, triangle facets and
//! tagged entity sets linked by parent/child and sense relations.
pub mod handles;
pub mod tags;

use crate::error::{GeomError, Result};
use crate::geom::point::Point;
use crate::geom::triangles::{sorted_face_key, triangle_area};
use std::collections::{BTreeSet, HashMap};

pub use handles::{SetHandle, TetHandle, TriHandle, VertexHandle};
pub use tags::{Category, Sense, SetTags};

#[derive(Debug, Clone)]
pub struct EntitySet {
    tags: SetTags,
    triangles: BTreeSet<TriHandle>,
    parents: Vec<SetHandle>,
    children: Vec<SetHandle>,
    senses: Vec<(SetHandle, Sense)>,
}

impl EntitySet {
    fn new(tags: SetTags) -> Self {
        Self {
            tags,
            triangles: BTreeSet::new(),
            parents: Vec::new(),
            children: Vec::new(),
            senses: Vec::new(),
        }
    }

    pub fn tags(&self) -> &SetTags {
        &self.tags
    }

    pub fn category(&self) -> Category {
        self.tags.category
    }

    pub fn global_id(&self) -> u32 {
        self.tags.global_id
    }

    pub fn name(&self) -> Option<&str> {
        self.tags.name.as_deref()
    }

    pub fn triangles(&self) -> &BTreeSet<TriHandle> {
        &self.triangles
    }

    pub fn parents(&self) -> &[SetHandle] {
        &self.parents
    }

    pub fn children(&self) -> &[SetHandle] {
        &self.children
    }

    /// Senses of a surface relative to its parent volumes.
    pub fn senses(&self) -> &[(SetHandle, Sense)] {
        &self.senses
    }

    pub fn sense_for(&self, volume: SetHandle) -> Option<Sense> {
        self.senses
            .iter()
            .find(|(v, _)| *v == volume)
            .map(|(_, s)| *s)
    }
}

#[derive(Debug, Clone)]
pub struct GeomDb {
    vertices: Vec<Point>,
    tets: Vec<[VertexHandle; 4]>,
    triangles: Vec<[VertexHandle; 3]>,
    triangle_index: HashMap<[VertexHandle; 3], TriHandle>,
    sets: Vec<EntitySet>,
    faceting_tol: f64,
    geometry_resabs: f64,
}

impl Default for GeomDb {
    fn default() -> Self {
        Self::new()
    }
}

impl GeomDb {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            tets: Vec::new(),
            triangles: Vec::new(),
            triangle_index: HashMap::new(),
            sets: Vec::new(),
            faceting_tol: 1e-4,
            geometry_resabs: 1e-6,
        }
    }

    /// Removes every entity. Tolerances are kept.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.tets.clear();
        self.triangles.clear();
        self.triangle_index.clear();
        self.sets.clear();
    }

    pub fn set_tolerances(&mut self, faceting_tol: f64, geometry_resabs: f64) {
        self.faceting_tol = faceting_tol;
        self.geometry_resabs = geometry_resabs;
    }

    pub fn faceting_tol(&self) -> f64 {
        self.faceting_tol
    }

    pub fn geometry_resabs(&self) -> f64 {
        self.geometry_resabs
    }

    pub fn create_vertex(&mut self, p: Point) -> VertexHandle {
        self.vertices.push(p);
        VertexHandle(self.vertices.len() - 1)
    }

    pub fn vertex(&self, h: VertexHandle) -> Point {
        self.vertices[h.0]
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn create_tet(&mut self, conn: [VertexHandle; 4]) -> TetHandle {
        self.tets.push(conn);
        TetHandle(self.tets.len() - 1)
    }

    pub fn tet(&self, h: TetHandle) -> [VertexHandle; 4] {
        self.tets[h.0]
    }

    pub fn tet_points(&self, h: TetHandle) -> [Point; 4] {
        self.tets[h.0].map(|v| self.vertex(v))
    }

    pub fn n_tets(&self) -> usize {
        self.tets.len()
    }

    /// Returns the facet on the vertices of `conn`, creating it with the
    /// winding of `conn` if it does not exist yet. The flag is true when
    /// the facet was created by this call.
    pub fn find_or_create_triangle(&mut self, conn: [VertexHandle; 3]) -> (TriHandle, bool) {
        let key = sorted_face_key(conn);
        if let Some(&h) = self.triangle_index.get(&key) {
            return (h, false);
        }
        self.triangles.push(conn);
        let h = TriHandle(self.triangles.len() - 1);
        self.triangle_index.insert(key, h);
        (h, true)
    }

    /// Looks up a facet by its vertices, in any order.
    pub fn find_triangle(&self, conn: [VertexHandle; 3]) -> Option<TriHandle> {
        self.triangle_index.get(&sorted_face_key(conn)).copied()
    }

    /// Vertices of a facet, in the winding it was created with.
    pub fn triangle(&self, h: TriHandle) -> [VertexHandle; 3] {
        self.triangles[h.0]
    }

    pub fn triangle_points(&self, h: TriHandle) -> [Point; 3] {
        self.triangles[h.0].map(|v| self.vertex(v))
    }

    pub fn n_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn create_set(&mut self, tags: SetTags) -> SetHandle {
        self.sets.push(EntitySet::new(tags));
        SetHandle(self.sets.len() - 1)
    }

    pub fn set(&self, h: SetHandle) -> Result<&EntitySet> {
        self.sets.get(h.0).ok_or(GeomError::UnknownSet(h.0))
    }

    pub fn n_sets(&self) -> usize {
        self.sets.len()
    }

    fn set_mut(&mut self, h: SetHandle) -> Result<&mut EntitySet> {
        self.sets.get_mut(h.0).ok_or(GeomError::UnknownSet(h.0))
    }

    /// Handles of all sets of a category, in creation order.
    pub fn sets(&self, category: Category) -> Vec<SetHandle> {
        self.sets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.category() == category)
            .map(|(i, _)| SetHandle(i))
            .collect()
    }

    pub fn find_set(&self, category: Category, global_id: u32) -> Option<SetHandle> {
        self.sets
            .iter()
            .position(|s| s.category() == category && s.global_id() == global_id)
            .map(SetHandle)
    }

    pub fn add_parent_child(&mut self, parent: SetHandle, child: SetHandle) -> Result<()> {
        self.set(child)?;
        let p = self.set_mut(parent)?;
        if !p.children.contains(&child) {
            p.children.push(child);
        }
        let c = self.set_mut(child)?;
        if !c.parents.contains(&parent) {
            c.parents.push(parent);
        }
        Ok(())
    }

    pub fn add_triangles(
        &mut self,
        set: SetHandle,
        tris: impl IntoIterator<Item = TriHandle>,
    ) -> Result<()> {
        self.set_mut(set)?.triangles.extend(tris);
        Ok(())
    }

    pub fn remove_triangles(&mut self, set: SetHandle, tris: &BTreeSet<TriHandle>) -> Result<()> {
        let s = self.set_mut(set)?;
        s.triangles.retain(|t| !tris.contains(t));
        Ok(())
    }

    /// Records the sense of `surface` relative to `volume`, replacing any
    /// earlier value.
    pub fn set_sense(&mut self, surface: SetHandle, volume: SetHandle, sense: Sense) -> Result<()> {
        self.set(volume)?;
        let s = self.set_mut(surface)?;
        match s.senses.iter_mut().find(|(v, _)| *v == volume) {
            Some(entry) => entry.1 = sense,
            None => s.senses.push((volume, sense)),
        }
        Ok(())
    }

    /// Child surfaces of a volume together with their sense relative to it.
    pub fn volume_surfaces(&self, volume: SetHandle) -> Result<Vec<(SetHandle, Sense)>> {
        let vol = self.set(volume)?;
        let mut out = Vec::with_capacity(vol.children.len());
        for &surf in &vol.children {
            let sense = self.set(surf)?.sense_for(volume).ok_or_else(|| {
                GeomError::Topology(format!("surface {surf} has no sense for volume {volume}"))
            })?;
            out.push((surf, sense));
        }
        Ok(out)
    }

    pub fn surface_area(&self, surface: SetHandle) -> Result<f64> {
        Ok(self
            .set(surface)?
            .triangles
            .iter()
            .map(|&t| {
                let [a, b, c] = self.triangle_points(t);
                triangle_area(a, b, c)
            })
            .sum())
    }
}

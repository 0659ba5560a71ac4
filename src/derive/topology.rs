//! Creation and bookkeeping of groups, volumes and surfaces.
use crate::db::{Category, GeomDb, Sense, SetHandle, SetTags, TriHandle};
use crate::error::{GeomError, Result};
use crate::materials::{GRAVEYARD, group_name};
use std::collections::{BTreeSet, HashSet};

/// Entity sets created during one update, with the id counters.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    last_volume_id: u32,
    last_surface_id: u32,
    groups: Vec<SetHandle>,
    volumes: Vec<SetHandle>,
    surfaces: Vec<SetHandle>,
    graveyard: Option<SetHandle>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[SetHandle] {
        &self.groups
    }

    pub fn volumes(&self) -> &[SetHandle] {
        &self.volumes
    }

    /// Surfaces in creation order.
    pub fn surfaces(&self) -> &[SetHandle] {
        &self.surfaces
    }

    pub fn graveyard(&self) -> Option<SetHandle> {
        self.graveyard
    }

    pub(crate) fn set_graveyard(&mut self, volume: SetHandle) {
        self.graveyard = Some(volume);
    }

    pub fn create_group(&mut self, db: &mut GeomDb, id: u32, name: &str) -> SetHandle {
        let group = db.create_set(SetTags::new(Category::Group, id).with_name(name));
        self.groups.push(group);
        group
    }

    /// New volume with the next id, placed in `group`.
    pub fn create_volume(&mut self, db: &mut GeomDb, group: SetHandle) -> Result<SetHandle> {
        self.last_volume_id += 1;
        let volume = db.create_set(SetTags::new(Category::Volume, self.last_volume_id));
        db.add_parent_child(group, volume)?;
        self.volumes.push(volume);
        Ok(volume)
    }

    /// New surface with the next id, holding `tris` and bounding every
    /// `(volume, sense)` in `parents`.
    pub fn create_surface(
        &mut self,
        db: &mut GeomDb,
        tris: BTreeSet<TriHandle>,
        parents: &[(SetHandle, Sense)],
    ) -> Result<SetHandle> {
        self.last_surface_id += 1;
        let surface = db.create_set(SetTags::new(Category::Surface, self.last_surface_id));
        db.add_triangles(surface, tris)?;
        for &(volume, sense) in parents {
            self.add_surface_parent(db, surface, volume, sense)?;
        }
        self.surfaces.push(surface);
        Ok(surface)
    }

    pub fn add_surface_parent(
        &mut self,
        db: &mut GeomDb,
        surface: SetHandle,
        volume: SetHandle,
        sense: Sense,
    ) -> Result<()> {
        db.add_parent_child(volume, surface)?;
        db.set_sense(surface, volume, sense)
    }

    /// Verifies the structural rules of a derived model:
    /// - every volume is in exactly one group and has at least one surface;
    /// - every surface is non-empty and bounds one volume, or two with
    ///   opposite senses;
    /// - every facet is in exactly one surface;
    /// - there is exactly one graveyard volume.
    pub fn check_invariants(&self, db: &GeomDb) -> Result<()> {
        for &vol in &self.volumes {
            let set = db.set(vol)?;
            let n_groups = set
                .parents()
                .iter()
                .filter(|&&p| db.set(p).is_ok_and(|s| s.category() == Category::Group))
                .count();
            if n_groups != 1 {
                return Err(GeomError::Topology(format!(
                    "volume {} is in {n_groups} groups",
                    set.global_id()
                )));
            }
            if set.children().is_empty() {
                return Err(GeomError::Topology(format!(
                    "volume {} has no surfaces",
                    set.global_id()
                )));
            }
        }

        let mut seen: HashSet<TriHandle> = HashSet::new();
        for &surf in &self.surfaces {
            let set = db.set(surf)?;
            let id = set.global_id();
            if set.triangles().is_empty() {
                return Err(GeomError::Topology(format!("surface {id} is empty")));
            }
            match set.senses() {
                [_] => {}
                [(_, a), (_, b)] if a != b => {}
                senses => {
                    return Err(GeomError::Topology(format!(
                        "surface {id} has invalid parent senses {senses:?}"
                    )));
                }
            }
            // Boundary groups are parents too; only volumes carry a sense
            let n_volumes = set
                .parents()
                .iter()
                .filter(|&&p| db.set(p).is_ok_and(|s| s.category() == Category::Volume))
                .count();
            if n_volumes != set.senses().len() {
                return Err(GeomError::Topology(format!(
                    "surface {id} has {n_volumes} parent volumes but {} senses",
                    set.senses().len()
                )));
            }
            for &tri in set.triangles() {
                if !seen.insert(tri) {
                    return Err(GeomError::Topology(format!(
                        "facet {tri} is in more than one surface"
                    )));
                }
            }
        }
        if seen.len() != db.n_triangles() {
            return Err(GeomError::Topology(format!(
                "{} of {} facets belong to no surface",
                db.n_triangles() - seen.len(),
                db.n_triangles()
            )));
        }

        let graveyard_name = group_name(GRAVEYARD, None);
        let graveyard_groups: Vec<&SetHandle> = self
            .groups
            .iter()
            .filter(|&&g| db.set(g).is_ok_and(|s| s.name() == Some(graveyard_name.as_str())))
            .collect();
        let graveyard_ok = match (graveyard_groups.as_slice(), self.graveyard) {
            ([g], Some(vol)) => db.set(**g)?.children() == [vol],
            _ => false,
        };
        if !graveyard_ok {
            return Err(GeomError::Topology("expected exactly one graveyard volume".into()));
        }
        Ok(())
    }
}

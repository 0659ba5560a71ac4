//! Merging of oriented skin faces into the shared surface catalogue.
use crate::db::{GeomDb, Sense, SetHandle, TriHandle};
use crate::derive::topology::Topology;
use crate::error::Result;
use std::collections::BTreeSet;

/// Adds `faces`, bounding `volume` with `sense`, to the surfaces.
///
/// Existing surfaces are visited in creation order. A surface fully
/// covered by `faces` gains `volume` as a parent; a partially covered one
/// gives up the covered facets to a new surface that keeps its parents and
/// adds `volume`. Facets not found in any surface form one new surface.
pub fn resolve_faces(
    db: &mut GeomDb,
    topo: &mut Topology,
    faces: BTreeSet<TriHandle>,
    volume: SetHandle,
    sense: Sense,
) -> Result<()> {
    let mut remaining = faces;
    if remaining.is_empty() {
        return Ok(());
    }

    // Surfaces created below are not revisited
    let existing: Vec<SetHandle> = topo.surfaces().to_vec();
    for surf in existing {
        let tris = db.set(surf)?.triangles();
        let overlap: BTreeSet<TriHandle> = remaining.intersection(tris).copied().collect();
        if overlap.is_empty() {
            continue;
        }

        if overlap.len() == tris.len() {
            topo.add_surface_parent(db, surf, volume, sense)?;
        } else {
            let mut parents = db.set(surf)?.senses().to_vec();
            parents.push((volume, sense));
            db.remove_triangles(surf, &overlap)?;
            topo.create_surface(db, overlap.clone(), &parents)?;
        }

        remaining.retain(|t| !overlap.contains(t));
        if remaining.is_empty() {
            break;
        }
    }

    if !remaining.is_empty() {
        topo.create_surface(db, remaining, &[(volume, sense)])?;
    }
    Ok(())
}

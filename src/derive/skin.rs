//! Boundary faces of a region of tetrahedra.
use crate::db::{GeomDb, TetHandle, TriHandle, VertexHandle};
use crate::error::{GeomError, Result};
use crate::fem::mesh::TET_SIDES;
use crate::geom::tetrahedron::signed_volume;
use crate::geom::triangles::{flipped, same_winding, sorted_face_key};
use std::collections::{BTreeSet, HashMap};

/// Boundary facets of a region, split by how the stored facet is wound
/// relative to the region's outward normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub forward: BTreeSet<TriHandle>,
    pub reverse: BTreeSet<TriHandle>,
}

impl Skin {
    pub fn len(&self) -> usize {
        self.forward.len() + self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Faces of a tetrahedron wound so that their normals point outwards.
fn outward_faces(db: &GeomDb, tet: TetHandle) -> [[VertexHandle; 3]; 4] {
    let v = db.tet(tet);
    let [p0, p1, p2, p3] = db.tet_points(tet);
    let faces = TET_SIDES.map(|side| side.map(|i| v[i]));
    if signed_volume(p0, p1, p2, p3) < 0. {
        faces.map(flipped)
    } else {
        faces
    }
}

/// Extracts the skin of `region`, creating facets that do not exist yet.
///
/// A new facet takes the region's outward winding and is classed forward.
/// An existing facet is forward if its winding matches the outward one and
/// reverse otherwise.
pub fn find_skin(db: &mut GeomDb, region: &BTreeSet<TetHandle>) -> Result<Skin> {
    let mut counts: HashMap<[VertexHandle; 3], usize> = HashMap::new();
    let mut faces = Vec::with_capacity(4 * region.len());
    for &tet in region {
        for face in outward_faces(db, tet) {
            *counts.entry(sorted_face_key(face)).or_default() += 1;
            faces.push(face);
        }
    }
    if let Some(key) = counts
        .iter()
        .filter(|&(_, &n)| n > 2)
        .map(|(k, _)| *k)
        .min()
    {
        return Err(GeomError::NonManifoldFace(key.map(|v| v.0)));
    }

    let mut skin = Skin::default();
    for face in faces {
        if counts.get(&sorted_face_key(face)) != Some(&1) {
            continue;
        }
        let (tri, created) = db.find_or_create_triangle(face);
        if created || same_winding(db.triangle(tri), face) == Some(true) {
            skin.forward.insert(tri);
        } else {
            skin.reverse.insert(tri);
        }
    }

    if skin.is_empty() {
        return Err(GeomError::EmptySkin {
            n_tets: region.len(),
        });
    }
    Ok(skin)
}

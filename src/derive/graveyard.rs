//! Enclosing void shell around the model.
use crate::db::{GeomDb, Sense, SetHandle};
use crate::derive::topology::Topology;
use crate::error::Result;
use crate::geom::bboxes::BoundingBox;
use crate::materials::{GRAVEYARD, group_name};
use std::collections::BTreeSet;

/// Scale of the inner graveyard box relative to the model bounding box.
pub const INNER_SCALE: f64 = 1.01;
/// Scale of the outer graveyard box.
pub const OUTER_SCALE: f64 = 1.10;

/// Box corners (see [`BoundingBox::corners`]) with their three edge
/// neighbours. Together they cover all six box faces.
const OPEN_CORNERS: [(usize, [usize; 3]); 4] = [
    (0, [1, 2, 4]),
    (3, [2, 1, 7]),
    (6, [4, 2, 7]),
    (5, [1, 4, 7]),
];

/// Twelve triangles covering a box, as corner indices, with normals
/// pointing out of the box when `outward` is set and into it otherwise.
pub fn box_triangles(outward: bool) -> Vec<[usize; 3]> {
    let mut tris = Vec::with_capacity(12);
    for (corner, nbs) in OPEN_CORNERS {
        for k in 0..3 {
            let (a, b) = (nbs[k], nbs[(k + 1) % 3]);
            tris.push(if outward { [corner, b, a] } else { [corner, a, b] });
        }
    }
    tris
}

/// Builds the graveyard group, volume and its two box surfaces around `bbox`.
pub fn build_graveyard(
    db: &mut GeomDb,
    topo: &mut Topology,
    bbox: &BoundingBox,
    group_id: u32,
) -> Result<SetHandle> {
    let group = topo.create_group(db, group_id, &group_name(GRAVEYARD, None));
    let volume = topo.create_volume(db, group)?;

    for (scale, outward) in [(INNER_SCALE, true), (OUTER_SCALE, false)] {
        let verts = bbox.scaled(scale).corners().map(|p| db.create_vertex(p));
        let tris: BTreeSet<_> = box_triangles(outward)
            .into_iter()
            .map(|t| db.find_or_create_triangle(t.map(|i| verts[i])).0)
            .collect();
        topo.create_surface(db, tris, &[(volume, Sense::Forward)])?;
    }

    topo.set_graveyard(volume);
    log::debug!("Graveyard volume {volume} built around {:?}", bbox);
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;
    use crate::geom::triangles::triangle_normal;
    use std::collections::HashMap;

    #[test]
    fn test_box_triangles_orientation() {
        let bbox = BoundingBox::new(Point::new(-1., 0., 2.), Point::new(3., 1., 4.));
        let corners = bbox.corners();
        let center = bbox.center();
        for outward in [true, false] {
            let tris = box_triangles(outward);
            assert_eq!(tris.len(), 12);
            for [a, b, c] in tris {
                let n = triangle_normal(corners[a], corners[b], corners[c]);
                let away = n.dot(corners[a] - center) > 0.;
                assert_eq!(away, outward);
            }
        }
    }

    #[test]
    fn test_box_is_closed() {
        // Every directed edge must be matched by its reverse exactly once
        let mut edges: HashMap<(usize, usize), i32> = HashMap::new();
        for [a, b, c] in box_triangles(true) {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                *edges.entry((p, q)).or_default() += 1;
            }
        }
        assert_eq!(edges.len(), 36);
        for (&(p, q), &n) in &edges {
            assert_eq!(n, 1);
            assert_eq!(edges.get(&(q, p)), Some(&1));
        }
    }

    #[test]
    fn test_build_graveyard() {
        let mut db = GeomDb::new();
        let mut topo = Topology::new();
        let bbox = BoundingBox::new(Point::new(0., 0., 0.), Point::new(1., 1., 1.));
        let vol = build_graveyard(&mut db, &mut topo, &bbox, 3).unwrap();
        assert_eq!(topo.graveyard(), Some(vol));
        let group = db.set(topo.groups()[0]).unwrap();
        assert_eq!(group.name(), Some("mat:Graveyard"));
        assert_eq!(group.global_id(), 3);
        let surfs = db.volume_surfaces(vol).unwrap();
        assert_eq!(surfs.len(), 2);
        assert!(surfs.iter().all(|(_, s)| *s == Sense::Forward));
        assert_eq!(db.n_triangles(), 24);
        assert_eq!(db.n_vertices(), 16);
        topo.check_invariants(&db).unwrap();
        // Inner box encloses the model
        let inner = db.set(surfs[0].0).unwrap();
        for &t in inner.triangles() {
            for p in db.triangle_points(t) {
                assert!(!bbox.contains(p, 1e-3));
            }
        }
    }

    #[test]
    fn test_graveyard_extents_and_normals() {
        let mut db = GeomDb::new();
        let mut topo = Topology::new();
        let bbox = BoundingBox::new(Point::new(-2., 1., 0.), Point::new(4., 3., 5.));
        let center = bbox.center();
        let vol = build_graveyard(&mut db, &mut topo, &bbox, 1).unwrap();
        let surfs = db.volume_surfaces(vol).unwrap();

        for ((surf, _), (scale, outward)) in surfs.iter().zip([(INNER_SCALE, true), (OUTER_SCALE, false)]) {
            let tris = db.set(*surf).unwrap().triangles();
            assert_eq!(tris.len(), 12);
            let pts: Vec<Point> = tris.iter().flat_map(|&t| db.triangle_points(t)).collect();
            let extents = BoundingBox::from_points(&pts).unwrap();
            let expected = bbox.scaled(scale);
            assert!(extents.min.is_close(&expected.min));
            assert!(extents.max.is_close(&expected.max));

            for &t in tris {
                let [a, b, c] = db.triangle_points(t);
                let centroid = a + ((b - a) + (c - a)) * (1. / 3.);
                let n = triangle_normal(a, b, c);
                assert_eq!(n.dot(centroid - center) > 0., outward);
            }
        }
    }
}

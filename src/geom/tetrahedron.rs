use crate::geom::point::Point;

/// Signed volume of the tetrahedron `(pt0, pt1, pt2, pt3)`.
///
/// Positive when `pt3` lies on the side of the triangle `(pt0, pt1, pt2)`
/// that its right-hand normal points to.
pub fn signed_volume(pt0: Point, pt1: Point, pt2: Point, pt3: Point) -> f64 {
    let a = pt1 - pt0;
    let b = pt2 - pt0;
    let c = pt3 - pt0;
    a.dot(b.cross(c)) / 6.
}

pub fn tetrahedron_volume(pt0: Point, pt1: Point, pt2: Point, pt3: Point) -> f64 {
    signed_volume(pt0, pt1, pt2, pt3).abs()
}

/// Returns tetrahedron centroid (i.e. average of each vertices)
pub fn tetrahedron_centroid(pt0: Point, pt1: Point, pt2: Point, pt3: Point) -> Point {
    let x = (pt0.x + pt1.x + pt2.x + pt3.x) / 4.;
    let y = (pt0.y + pt1.y + pt2.y + pt3.y) / 4.;
    let z = (pt0.z + pt1.z + pt2.z + pt3.z) / 4.;
    Point::new(x, y, z)
}

/// Barycentric coordinates of `p` with respect to the tetrahedron.
///
/// Returns `None` for a degenerate tetrahedron.
pub fn barycentric(p: Point, pts: [Point; 4]) -> Option<[f64; 4]> {
    let vol = signed_volume(pts[0], pts[1], pts[2], pts[3]);
    if vol.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let l0 = signed_volume(p, pts[1], pts[2], pts[3]) / vol;
    let l1 = signed_volume(pts[0], p, pts[2], pts[3]) / vol;
    let l2 = signed_volume(pts[0], pts[1], p, pts[3]) / vol;
    let l3 = 1. - l0 - l1 - l2;
    Some([l0, l1, l2, l3])
}

/// Checks whether `p` lies inside the tetrahedron, with barycentric tolerance `tol`.
pub fn contains_point(p: Point, pts: [Point; 4], tol: f64) -> bool {
    match barycentric(p, pts) {
        Some(l) => l.iter().all(|&li| li >= -tol),
        None => false,
    }
}

use crate::geom::point::Point;
use crate::geom::vector::Vector;

/// Vertex indices of a triangle in whatever index space the caller uses.
pub type TriangleIndex<T> = [T; 3];

/// Orientation-independent key for a triangle: its indices in ascending order.
pub fn sorted_face_key<T: Ord + Copy>(mut face: TriangleIndex<T>) -> TriangleIndex<T> {
    face.sort_unstable();
    face
}

/// Compares the winding of two triangles built on the same vertices.
///
/// Returns `Some(true)` when `b` is a cyclic rotation of `a`, `Some(false)`
/// when it is a rotation of `a` reversed, and `None` when the vertex sets differ.
pub fn same_winding<T: Eq + Copy>(a: TriangleIndex<T>, b: TriangleIndex<T>) -> Option<bool> {
    let rotations = |t: TriangleIndex<T>| [t, [t[1], t[2], t[0]], [t[2], t[0], t[1]]];
    if rotations(a).contains(&b) {
        return Some(true);
    }
    if rotations([a[0], a[2], a[1]]).contains(&b) {
        return Some(false);
    }
    None
}

/// Same vertices, opposite winding.
pub fn flipped<T: Copy>(t: TriangleIndex<T>) -> TriangleIndex<T> {
    [t[0], t[2], t[1]]
}

pub fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    0.5 * (b - a).cross(c - a).length()
}

/// Non-normalized right-hand normal of `(a, b, c)`.
pub fn triangle_normal(a: Point, b: Point, c: Point) -> Vector {
    (b - a).cross(c - a)
}

//! Geometric primitives shared by the finite-element mesh and the derived
//! surface representation.
pub mod bboxes;
pub mod point;
pub mod tetrahedron;
pub mod triangles;
pub mod vector;

/// Geometric precision
pub const EPS: f64 = 1e-13;

pub trait IsClose {
    fn is_close(&self, other: f64) -> bool;
}

impl IsClose for f64 {
    fn is_close(&self, other: f64) -> bool {
        (self - other).abs() < EPS
    }
}

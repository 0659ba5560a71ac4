use crate::geom::point::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Smallest box holding all points `pts`. Returns `None` for an empty slice.
    pub fn from_points(pts: &[Point]) -> Option<Self> {
        let (first, rest) = pts.split_first()?;
        let mut bbox = Self::new(*first, *first);
        for p in rest {
            bbox.expand(*p);
        }
        Some(bbox)
    }

    /// Grows the box so that it contains `p`.
    pub fn expand(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(&self.max)
    }

    /// Box with the same centre and the half-diagonal multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        let c = self.center();
        let half = (self.max - c) * factor;
        Self::new(c + half * -1., c + half)
    }

    /// Corner points indexed by `4*iz + 2*iy + ix`, where 0 selects the
    /// minimum and 1 the maximum along each axis.
    pub fn corners(&self) -> [Point; 8] {
        let mut out = [self.min; 8];
        for (i, corner) in out.iter_mut().enumerate() {
            let x = if i & 1 == 0 { self.min.x } else { self.max.x };
            let y = if i & 2 == 0 { self.min.y } else { self.max.y };
            let z = if i & 4 == 0 { self.min.z } else { self.max.z };
            *corner = Point::new(x, y, z);
        }
        out
    }

    /// Checks whether a point is inside the box, boundary included.
    pub fn contains(&self, p: Point, tol: f64) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
            && p.z >= self.min.z - tol
            && p.z <= self.max.z + tol
    }
}

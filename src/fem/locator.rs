//! Point location and field sampling on tetrahedral meshes.
use crate::error::{GeomError, Result};
use crate::fem::field::FieldSystem;
use crate::fem::mesh::{ElemId, FeMesh};
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::tetrahedron::contains_point;
use std::collections::{BTreeSet, HashMap};

/// Uniform voxel grid of element ids, keyed by the cells their bounding
/// boxes overlap.
pub struct PointLocator {
    grid: HashMap<(i32, i32, i32), Vec<ElemId>>,
    bbox: Option<BoundingBox>,
    step: f64,
    tol: f64,
}

impl PointLocator {
    /// Builds the grid over the current element positions.
    ///
    /// `tol` is the barycentric tolerance used for containment tests.
    pub fn new(mesh: &FeMesh, tol: f64) -> Result<Self> {
        let mut grid: HashMap<(i32, i32, i32), Vec<ElemId>> = HashMap::new();
        let Some(bbox) = mesh.bounding_box() else {
            return Ok(Self {
                grid,
                bbox: None,
                step: 1.,
                tol,
            });
        };

        // Roughly one element per cell
        let ext = bbox.max - bbox.min;
        let extent = ext.dx.max(ext.dy).max(ext.dz);
        let n = mesh.n_elements().max(1) as f64;
        let step = (extent / n.cbrt()).max(f64::EPSILON * extent.max(1.));

        for id in 0..mesh.n_elements() {
            let eb = mesh.element_bbox(id)?;
            let (i0, j0, k0) = cell_of(eb.min, step);
            let (i1, j1, k1) = cell_of(eb.max, step);
            for i in i0..=i1 {
                for j in j0..=j1 {
                    for k in k0..=k1 {
                        grid.entry((i, j, k)).or_default().push(id);
                    }
                }
            }
        }

        Ok(Self {
            grid,
            bbox: Some(bbox),
            step,
            tol,
        })
    }

    /// Element ids from the cell containing `pos` plus its 26 neighbours.
    pub fn find_nearby(&self, pos: Point) -> BTreeSet<ElemId> {
        let (ci, cj, ck) = cell_of(pos, self.step);
        let mut result = BTreeSet::new();
        for di in -1..=1 {
            for dj in -1..=1 {
                for dk in -1..=1 {
                    if let Some(ids) = self.grid.get(&(ci + di, cj + dj, ck + dk)) {
                        result.extend(ids);
                    }
                }
            }
        }
        result
    }

    /// Finds a tetrahedral element containing `pos`, trying `hint` first.
    /// Ties are resolved towards the lowest element id.
    pub fn locate(&self, mesh: &FeMesh, pos: Point, hint: Option<ElemId>) -> Option<ElemId> {
        let inside = |id: ElemId| {
            mesh.tet_points(id)
                .is_some_and(|pts| contains_point(pos, pts, self.tol))
        };
        if let Some(h) = hint
            && inside(h)
        {
            return Some(h);
        }
        let bbox = self.bbox?;
        if !bbox.contains(pos, self.tol * self.step) {
            return None;
        }
        self.find_nearby(pos).into_iter().find(|&id| inside(id))
    }
}

fn cell_of(p: Point, step: f64) -> (i32, i32, i32) {
    (
        (p.x / step).floor() as i32,
        (p.y / step).floor() as i32,
        (p.z / step).floor() as i32,
    )
}

/// Reads one variable of a [`FieldSystem`] at element centroids or at
/// arbitrary points.
pub struct FieldSampler<'a> {
    mesh: &'a FeMesh,
    fields: &'a FieldSystem,
    variable: String,
    var: usize,
    locator: PointLocator,
}

impl<'a> FieldSampler<'a> {
    pub fn new(mesh: &'a FeMesh, fields: &'a FieldSystem, variable: &str, tol: f64) -> Result<Self> {
        let var = fields.variable_number(variable)?;
        Ok(Self {
            mesh,
            fields,
            variable: variable.to_string(),
            var,
            locator: PointLocator::new(mesh, tol)?,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Value at the centroid of `elem`.
    ///
    /// Elements are located through their own centroid, so a
    /// piecewise-constant field returns the element's own value.
    pub fn element_value(&self, elem: ElemId) -> Result<f64> {
        let c = self.mesh.centroid(elem)?;
        let owner = self.locator.locate(self.mesh, c, Some(elem)).unwrap_or(elem);
        self.checked(owner)
    }

    /// Value at an arbitrary point.
    pub fn value_at(&self, pos: Point) -> Result<f64> {
        let elem = self
            .locator
            .locate(self.mesh, pos, None)
            .ok_or_else(|| GeomError::PointNotLocated(format!("{pos:.6}")))?;
        self.checked(elem)
    }

    fn checked(&self, elem: ElemId) -> Result<f64> {
        let value = self.fields.value(elem, self.var)?;
        if !value.is_finite() {
            return Err(GeomError::NonFiniteField {
                elem,
                variable: self.variable.clone(),
                value,
            });
        }
        Ok(value)
    }
}

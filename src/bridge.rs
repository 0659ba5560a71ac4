//! Transfer of per-tetrahedron results back into element degrees of freedom.
use crate::db::TetHandle;
use crate::error::{GeomError, Result};
use crate::fem::comm::Communicator;
use crate::fem::field::FieldSystem;
use crate::fem::mesh::{ElemId, FeMesh};
use std::collections::HashSet;

/// Joules per electronvolt.
pub const EV_TO_JOULE: f64 = 1.602_176_634e-19;

/// Correspondence between mesh elements and the tetrahedra created for them
/// during one update. Tetrahedron handles are contiguous from `offset`.
#[derive(Debug, Clone, Default)]
pub struct ElementHandleMap {
    elem_tets: Vec<Vec<TetHandle>>,
    tet_elem: Vec<ElemId>,
    offset: Option<TetHandle>,
}

impl ElementHandleMap {
    pub fn new(n_elements: usize) -> Self {
        Self {
            elem_tets: vec![Vec::new(); n_elements],
            tet_elem: Vec::new(),
            offset: None,
        }
    }

    /// Records that `tet` was created for `elem`. Handles must be inserted
    /// in creation order without gaps.
    pub fn insert(&mut self, elem: ElemId, tet: TetHandle) -> Result<()> {
        let offset = *self.offset.get_or_insert(tet);
        if tet.0 != offset.0 + self.tet_elem.len() {
            return Err(GeomError::UnresolvedHandle(tet.0));
        }
        self.elem_tets
            .get_mut(elem)
            .ok_or(GeomError::UnknownElement(elem))?
            .push(tet);
        self.tet_elem.push(elem);
        Ok(())
    }

    pub fn tets(&self, elem: ElemId) -> &[TetHandle] {
        self.elem_tets.get(elem).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn element_of(&self, tet: TetHandle) -> Option<ElemId> {
        let offset = self.offset?;
        let i = tet.0.checked_sub(offset.0)?;
        self.tet_elem.get(i).copied()
    }

    /// First tetrahedron handle; result arrays are indexed by `handle - offset`.
    pub fn offset(&self) -> Option<TetHandle> {
        self.offset
    }

    pub fn n_tets(&self) -> usize {
        self.tet_elem.len()
    }

    pub fn clear(&mut self) {
        self.elem_tets.iter_mut().for_each(Vec::clear);
        self.tet_elem.clear();
        self.offset = None;
    }
}

/// How raw per-tetrahedron results are turned into element values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteOptions {
    pub scale: f64,
    /// Divide by the element volume.
    pub normalize_by_volume: bool,
    /// Results are variances: combine sub-tetrahedra as the root of the sum
    /// of squares instead of a plain sum.
    pub is_error: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            scale: 1.,
            normalize_by_volume: false,
            is_error: false,
        }
    }
}

/// Writes `results` (indexed by tetrahedron handle minus offset) into
/// `variable` for every locally owned element.
///
/// Must be called collectively. Values are checked on every rank before
/// anything is written, so a failure on any rank leaves the solution
/// untouched everywhere. Returns `Ok(false)` without writing anything when
/// `results` is empty.
pub fn set_solution(
    mesh: &FeMesh,
    fields: &mut FieldSystem,
    handles: &ElementHandleMap,
    comm: &dyn Communicator,
    variable: &str,
    results: &[f64],
    opts: WriteOptions,
) -> Result<bool> {
    let local = element_values(mesh, fields, handles, comm.rank(), variable, results, opts);
    if !comm.all_true(local.is_ok()) {
        return Err(local.err().unwrap_or(GeomError::RemoteFailure("solution write")));
    }
    let Some((var, values)) = local? else {
        log::warn!("No results to write into '{variable}'");
        // Keep the collective sequence of the ranks that do write
        comm.all_true(true);
        return Ok(false);
    };

    let all_zero = values.iter().all(|&(_, v)| v == 0.);
    if comm.all_true(all_zero) {
        log::warn!("Solution written into '{variable}' is zero everywhere");
    }
    for (elem, value) in values {
        fields.set_value(elem, var, value)?;
    }
    Ok(true)
}

/// Variable number and per-element values for the elements owned by
/// `rank`. `None` when `results` is empty.
fn element_values(
    mesh: &FeMesh,
    fields: &FieldSystem,
    handles: &ElementHandleMap,
    rank: usize,
    variable: &str,
    results: &[f64],
    opts: WriteOptions,
) -> Result<Option<(usize, Vec<(ElemId, f64)>)>> {
    let var = fields.variable_number(variable)?;
    if results.is_empty() {
        return Ok(None);
    }
    if results.len() != handles.n_tets() {
        return Err(GeomError::ResultSizeMismatch {
            expected: handles.n_tets(),
            got: results.len(),
        });
    }
    let offset = handles.offset().map(|h| h.0).unwrap_or(0);
    if let Some(i) = (0..results.len()).find(|&i| handles.element_of(TetHandle(offset + i)).is_none()) {
        return Err(GeomError::UnresolvedHandle(offset + i));
    }

    let mut dofs: HashSet<usize> = HashSet::new();
    let mut values = Vec::new();
    for elem in mesh.local_elements(rank) {
        if elem >= fields.n_elements() {
            return Err(GeomError::UnknownElement(elem));
        }
        let tets = handles.tets(elem);
        let mut value = if opts.is_error {
            tets.iter()
                .map(|t| results[t.0 - offset].powi(2))
                .sum::<f64>()
                .sqrt()
        } else {
            tets.iter().map(|t| results[t.0 - offset]).sum()
        };
        value *= opts.scale;
        if opts.normalize_by_volume {
            value /= mesh.volume(elem)?;
        }

        let dof = fields.dof_index(elem, var);
        if !dofs.insert(dof) {
            return Err(GeomError::DuplicateDof(dof));
        }
        values.push((elem, value));
    }
    Ok(Some((var, values)))
}

/// Factor converting a heating tally in eV per source particle into watts
/// for a source emitting `source_strength` particles per second.
pub fn heating_scale_factor(source_strength: f64) -> f64 {
    source_strength * EV_TO_JOULE
}

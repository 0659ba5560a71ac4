//! Boundary conditions applied to surfaces that lie on named side sets.
use crate::db::{GeomDb, SetHandle, TriHandle, VertexHandle};
use crate::derive::topology::Topology;
use crate::error::{GeomError, Result};
use crate::fem::mesh::FeMesh;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    Vacuum,
    Reflecting,
    White,
    Periodic,
    Graveyard,
}

impl BoundaryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vacuum => "Vacuum",
            Self::Reflecting => "Reflecting",
            Self::White => "White",
            Self::Periodic => "Periodic",
            Self::Graveyard => "Graveyard",
        }
    }

    /// Name of the group collecting surfaces with this condition.
    pub fn group_name(self) -> String {
        format!("boundary:{}", self.as_str())
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryKind {
    type Err = GeomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vacuum" => Ok(Self::Vacuum),
            "reflecting" | "reflective" => Ok(Self::Reflecting),
            "white" => Ok(Self::White),
            "periodic" => Ok(Self::Periodic),
            "graveyard" => Ok(Self::Graveyard),
            _ => Err(GeomError::UnsupportedBoundary(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub kind: BoundaryKind,
    /// Side sets the condition applies to.
    pub boundary_names: Vec<String>,
}

impl BoundaryCondition {
    pub fn new(kind: BoundaryKind, names: &[&str]) -> Self {
        Self {
            kind,
            boundary_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Periodic boundaries cannot be expressed in the derived geometry.
    pub fn validate(&self) -> Result<()> {
        if self.kind == BoundaryKind::Periodic {
            return Err(GeomError::UnsupportedBoundary(format!(
                "{} (on {:?})",
                self.kind, self.boundary_names
            )));
        }
        Ok(())
    }
}

/// Groups the surfaces touching each condition's side sets.
///
/// `node_handles` maps mesh node ids to database vertices. Group ids
/// continue from `first_group_id`. Returns the created groups.
pub fn apply_boundary_conditions(
    db: &mut GeomDb,
    topo: &mut Topology,
    mesh: &FeMesh,
    node_handles: &[VertexHandle],
    conditions: &[BoundaryCondition],
    first_group_id: u32,
) -> Result<Vec<SetHandle>> {
    let mut surface_of: HashMap<TriHandle, SetHandle> = HashMap::new();
    for &surf in topo.surfaces() {
        for &tri in db.set(surf)?.triangles() {
            surface_of.insert(tri, surf);
        }
    }

    let mut groups = Vec::new();
    let mut next_id = first_group_id;
    for bc in conditions {
        bc.validate()?;
        if bc.kind == BoundaryKind::Graveyard {
            continue;
        }

        let mut surfaces: BTreeSet<SetHandle> = BTreeSet::new();
        for name in &bc.boundary_names {
            let sides = mesh
                .side_set(name)
                .ok_or_else(|| GeomError::UnknownSideSet(name.clone()))?;
            for &(elem, side) in sides {
                let nodes = mesh.element(elem)?.side_nodes(side);
                for tri in side_facets(db, &nodes, node_handles) {
                    if let Some(&surf) = surface_of.get(&tri) {
                        surfaces.insert(surf);
                    }
                }
            }
        }
        if surfaces.is_empty() {
            log::warn!("No surfaces found for {} boundary {:?}", bc.kind, bc.boundary_names);
            continue;
        }

        let group = topo.create_group(db, next_id, &bc.kind.group_name());
        next_id += 1;
        for surf in surfaces {
            db.add_parent_child(group, surf)?;
        }
        groups.push(group);
    }
    Ok(groups)
}

/// Facets built on the nodes of one element side. Quadratic sides are
/// covered by several facets on their corner and mid-edge nodes.
fn side_facets(db: &GeomDb, nodes: &[usize], node_handles: &[VertexHandle]) -> Vec<TriHandle> {
    let verts: Vec<VertexHandle> = nodes
        .iter()
        .filter_map(|&n| node_handles.get(n).copied())
        .collect();
    let mut out = Vec::new();
    for i in 0..verts.len() {
        for j in i + 1..verts.len() {
            for k in j + 1..verts.len() {
                if let Some(tri) = db.find_triangle([verts[i], verts[j], verts[k]]) {
                    out.push(tri);
                }
            }
        }
    }
    out
}

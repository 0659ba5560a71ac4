//! Unstructured finite-element mesh with element blocks, ownership and
//! face-neighbour connectivity.
use crate::error::{GeomError, Result};
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::tetrahedron::{tetrahedron_centroid, tetrahedron_volume};
use crate::geom::triangles::sorted_face_key;
use crate::geom::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub type ElemId = usize;
pub type NodeId = usize;
pub type BlockId = u32;

/// Corner nodes of each tetrahedron side, wound so that the right-hand
/// normal points out of a positively oriented element.
pub const TET_SIDES: [[usize; 3]; 4] = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];

/// Mid-edge nodes of each quadratic tetrahedron side, matching [`TET_SIDES`].
pub const TET10_SIDE_MIDNODES: [[usize; 3]; 4] = [[6, 5, 4], [4, 8, 7], [5, 9, 8], [6, 7, 9]];

/// Corner pairs whose midpoints are nodes 4..10 of a quadratic tetrahedron.
pub const TET10_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [0, 2], [0, 3], [1, 3], [2, 3]];

/// Split of a quadratic tetrahedron into eight linear ones (local node numbers).
pub const TET10_SUB_TETS: [[usize; 4]; 8] = [
    [0, 4, 6, 7],
    [1, 5, 4, 8],
    [2, 6, 5, 9],
    [7, 8, 9, 3],
    [4, 9, 7, 8],
    [4, 5, 9, 8],
    [4, 7, 9, 6],
    [4, 9, 5, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Tet4,
    Tet10,
    Hex8,
    Prism6,
}

impl ElementKind {
    pub fn n_nodes(self) -> usize {
        match self {
            Self::Tet4 => 4,
            Self::Tet10 => 10,
            Self::Hex8 => 8,
            Self::Prism6 => 6,
        }
    }

    pub fn is_tetrahedral(self) -> bool {
        matches!(self, Self::Tet4 | Self::Tet10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    pub nodes: Vec<NodeId>,
    pub block: BlockId,
    /// Rank that owns the element.
    #[serde(default)]
    pub owner: usize,
}

impl Element {
    pub fn new(kind: ElementKind, nodes: Vec<NodeId>, block: BlockId) -> Self {
        Self {
            kind,
            nodes,
            block,
            owner: 0,
        }
    }

    pub fn tet4(nodes: [NodeId; 4], block: BlockId) -> Self {
        Self::new(ElementKind::Tet4, nodes.to_vec(), block)
    }

    /// Corner nodes of a tetrahedral element.
    pub fn corners(&self) -> Option<[NodeId; 4]> {
        if !self.kind.is_tetrahedral() {
            return None;
        }
        Some([self.nodes[0], self.nodes[1], self.nodes[2], self.nodes[3]])
    }

    /// Linear tetrahedra covering the element: the element itself for
    /// `Tet4`, eight sub-tetrahedra for `Tet10` and nothing otherwise.
    pub fn linear_tets(&self) -> Vec<[NodeId; 4]> {
        match self.kind {
            ElementKind::Tet4 => self.corners().into_iter().collect(),
            ElementKind::Tet10 => TET10_SUB_TETS
                .iter()
                .map(|s| s.map(|local| self.nodes[local]))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Nodes lying on side `side` (corners first, then mid-edge nodes).
    pub fn side_nodes(&self, side: usize) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = TET_SIDES[side].iter().map(|&i| self.nodes[i]).collect();
        if self.kind == ElementKind::Tet10 {
            out.extend(TET10_SIDE_MIDNODES[side].iter().map(|&i| self.nodes[i]));
        }
        out
    }
}

/// Element side referenced by a named side set.
pub type Side = (ElemId, usize);

#[derive(Debug, Clone)]
pub struct FeMesh {
    reference: Vec<Point>,
    displacement: Option<Vec<Vector>>,
    elements: Vec<Element>,
    neighbors: Vec<[Option<ElemId>; 4]>,
    side_sets: BTreeMap<String, Vec<Side>>,
}

impl FeMesh {
    /// Builds a mesh and its face-neighbour table.
    ///
    /// Element ids are positions in `elements`.
    pub fn new(nodes: Vec<Point>, elements: Vec<Element>) -> Result<Self> {
        for (id, el) in elements.iter().enumerate() {
            if el.nodes.len() != el.kind.n_nodes() {
                return Err(GeomError::InvalidMesh(format!(
                    "element {id} ({:?}) has {} nodes, expected {}",
                    el.kind,
                    el.nodes.len(),
                    el.kind.n_nodes()
                )));
            }
            if let Some(&n) = el.nodes.iter().find(|&&n| n >= nodes.len()) {
                return Err(GeomError::InvalidMesh(format!(
                    "element {id} references missing node {n}"
                )));
            }
        }
        let neighbors = find_neighbors(&elements)?;
        Ok(Self {
            reference: nodes,
            displacement: None,
            elements,
            neighbors,
            side_sets: BTreeMap::new(),
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.reference.len()
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: ElemId) -> Result<&Element> {
        self.elements.get(id).ok_or(GeomError::UnknownElement(id))
    }

    /// Fails on the first element that is not a tetrahedron.
    pub fn check_tetrahedral(&self) -> Result<()> {
        match self
            .elements
            .iter()
            .enumerate()
            .find(|(_, el)| !el.kind.is_tetrahedral())
        {
            Some((id, el)) => Err(GeomError::UnsupportedElement { id, kind: el.kind }),
            None => Ok(()),
        }
    }

    /// Current position of a node (reference position plus displacement).
    pub fn node(&self, id: NodeId) -> Point {
        match &self.displacement {
            Some(d) => self.reference[id] + d[id],
            None => self.reference[id],
        }
    }

    pub fn reference_node(&self, id: NodeId) -> Point {
        self.reference[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.n_nodes()).map(|i| self.node(i))
    }

    /// Moves nodes away from their reference positions.
    pub fn set_displacement(&mut self, displacement: Vec<Vector>) -> Result<()> {
        if displacement.len() != self.n_nodes() {
            return Err(GeomError::InvalidMesh(format!(
                "displacement has {} entries for {} nodes",
                displacement.len(),
                self.n_nodes()
            )));
        }
        self.displacement = Some(displacement);
        Ok(())
    }

    pub fn clear_displacement(&mut self) {
        self.displacement = None;
    }

    /// Face neighbours of an element, indexed by side. Always `None` for
    /// non-tetrahedral elements.
    pub fn neighbors(&self, id: ElemId) -> &[Option<ElemId>; 4] {
        &self.neighbors[id]
    }

    /// Corner positions of a tetrahedral element.
    pub fn tet_points(&self, id: ElemId) -> Option<[Point; 4]> {
        let c = self.elements.get(id)?.corners()?;
        Some(c.map(|n| self.node(n)))
    }

    pub fn centroid(&self, id: ElemId) -> Result<Point> {
        let el = self.element(id)?;
        if let Some([p0, p1, p2, p3]) = self.tet_points(id) {
            return Ok(tetrahedron_centroid(p0, p1, p2, p3));
        }
        let n = el.nodes.len() as f64;
        let sum = el
            .nodes
            .iter()
            .fold(Vector::default(), |acc, &i| acc + (self.node(i) - Point::origin()));
        Ok(Point::origin() + sum * (1. / n))
    }

    /// Volume of a tetrahedral element (straight-sided).
    pub fn volume(&self, id: ElemId) -> Result<f64> {
        let el = self.element(id)?;
        let [p0, p1, p2, p3] = self.tet_points(id).ok_or(GeomError::UnsupportedElement {
            id,
            kind: el.kind,
        })?;
        Ok(tetrahedron_volume(p0, p1, p2, p3))
    }

    pub fn element_bbox(&self, id: ElemId) -> Result<BoundingBox> {
        let el = self.element(id)?;
        let pts: Vec<Point> = el.nodes.iter().map(|&n| self.node(n)).collect();
        BoundingBox::from_points(&pts)
            .ok_or_else(|| GeomError::InvalidMesh(format!("element {id} has no nodes")))
    }

    /// Bounding box of the current node positions.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let pts: Vec<Point> = self.nodes().collect();
        BoundingBox::from_points(&pts)
    }

    pub fn blocks(&self) -> BTreeSet<BlockId> {
        self.elements.iter().map(|el| el.block).collect()
    }

    /// Assigns contiguous ranges of element ids to `n_ranks` owners.
    pub fn partition(&mut self, n_ranks: usize) {
        let n_ranks = n_ranks.max(1);
        let n = self.elements.len().max(1);
        for (id, el) in self.elements.iter_mut().enumerate() {
            el.owner = id * n_ranks / n;
        }
    }

    /// Elements owned by `rank`.
    pub fn local_elements(&self, rank: usize) -> impl Iterator<Item = ElemId> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(move |(_, el)| el.owner == rank)
            .map(|(id, _)| id)
    }

    pub fn add_side_set(&mut self, name: &str, sides: Vec<Side>) -> Result<()> {
        for &(elem, side) in &sides {
            let el = self.element(elem)?;
            if !el.kind.is_tetrahedral() || side >= 4 {
                return Err(GeomError::InvalidMesh(format!(
                    "side set '{name}' references side {side} of element {elem}"
                )));
            }
        }
        self.side_sets.insert(name.to_string(), sides);
        Ok(())
    }

    pub fn side_set(&self, name: &str) -> Option<&[Side]> {
        self.side_sets.get(name).map(|v| v.as_slice())
    }

    pub fn side_set_names(&self) -> impl Iterator<Item = &str> {
        self.side_sets.keys().map(|k| k.as_str())
    }

    /// Sides with no neighbour.
    pub fn exterior_sides(&self) -> Vec<Side> {
        let mut out = Vec::new();
        for (id, el) in self.elements.iter().enumerate() {
            if !el.kind.is_tetrahedral() {
                continue;
            }
            for (side, nb) in self.neighbors[id].iter().enumerate() {
                if nb.is_none() {
                    out.push((id, side));
                }
            }
        }
        out
    }
}

/// Pairs element sides through their sorted corner-node keys.
fn find_neighbors(elements: &[Element]) -> Result<Vec<[Option<ElemId>; 4]>> {
    let mut neighbors = vec![[None; 4]; elements.len()];
    let mut pending: HashMap<[NodeId; 3], Side> = HashMap::new();
    let mut paired: HashSet<[NodeId; 3]> = HashSet::new();

    for (id, el) in elements.iter().enumerate() {
        let Some(c) = el.corners() else {
            continue;
        };
        for (side, local) in TET_SIDES.iter().enumerate() {
            let key = sorted_face_key(local.map(|i| c[i]));
            if paired.contains(&key) {
                return Err(GeomError::NonManifoldFace(key));
            }
            if let Some((other, other_side)) = pending.remove(&key) {
                neighbors[other][other_side] = Some(id);
                neighbors[id][side] = Some(other);
                paired.insert(key);
            } else {
                pending.insert(key, (id, side));
            }
        }
    }
    Ok(neighbors)
}

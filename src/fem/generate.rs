//! Structured tetrahedral meshes of axis-aligned boxes.
//!
//! Each hexahedral cell is split into six tetrahedra around its main
//! diagonal (Kuhn triangulation), which keeps neighbouring cells conforming.
use crate::error::Result;
use crate::fem::mesh::{BlockId, Element, ElementKind, FeMesh, NodeId, TET10_EDGES};
use crate::geom::point::Point;
use crate::geom::tetrahedron::{signed_volume, tetrahedron_centroid};
use std::collections::HashMap;

/// Axis orderings walked from corner 0 to corner 7 of a cell.
const KUHN_PATHS: [[usize; 2]; 6] = [[1, 2], [1, 4], [2, 1], [2, 4], [4, 1], [4, 2]];

/// Tetrahedral mesh of the box `[min, max]` with `n` cells per axis.
///
/// `block_of` assigns a block to each tetrahedron from its centroid.
/// All tetrahedra are positively oriented.
pub fn box_mesh(
    min: Point,
    max: Point,
    n: [usize; 3],
    block_of: impl Fn(Point) -> BlockId,
) -> Result<FeMesh> {
    let [nx, ny, nz] = n.map(|v| v.max(1));
    let node_id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(Point::new(
                    min.x + (max.x - min.x) * i as f64 / nx as f64,
                    min.y + (max.y - min.y) * j as f64 / ny as f64,
                    min.z + (max.z - min.z) * k as f64 / nz as f64,
                ));
            }
        }
    }

    let mut elements = Vec::with_capacity(6 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let corner =
                    |bits: usize| node_id(i + (bits & 1), j + ((bits >> 1) & 1), k + (bits >> 2));
                for [a, b] in KUHN_PATHS {
                    let mut tet = [corner(0), corner(a), corner(a | b), corner(7)];
                    let pts = tet.map(|v| nodes[v]);
                    if signed_volume(pts[0], pts[1], pts[2], pts[3]) < 0. {
                        tet.swap(1, 2);
                    }
                    let c = tetrahedron_centroid(pts[0], pts[1], pts[2], pts[3]);
                    elements.push(Element::tet4(tet, block_of(c)));
                }
            }
        }
    }

    FeMesh::new(nodes, elements)
}

/// Converts a linear tetrahedral mesh into a quadratic one by adding
/// mid-edge nodes. Blocks, owners and side sets are preserved.
pub fn promote_to_tet10(mesh: &FeMesh) -> Result<FeMesh> {
    mesh.check_tetrahedral()?;
    let mut nodes: Vec<Point> = (0..mesh.n_nodes()).map(|i| mesh.reference_node(i)).collect();
    let mut midnodes: HashMap<(NodeId, NodeId), NodeId> = HashMap::new();
    let mut elements = Vec::with_capacity(mesh.n_elements());

    for el in mesh.elements() {
        let mut conn = el.nodes[..4].to_vec();
        for [a, b] in TET10_EDGES {
            let (na, nb) = (el.nodes[a], el.nodes[b]);
            let key = (na.min(nb), na.max(nb));
            let id = match midnodes.get(&key) {
                Some(&id) => id,
                None => {
                    let mid = nodes[na].midpoint(&nodes[nb]);
                    nodes.push(mid);
                    midnodes.insert(key, nodes.len() - 1);
                    nodes.len() - 1
                }
            };
            conn.push(id);
        }
        let mut quad = Element::new(ElementKind::Tet10, conn, el.block);
        quad.owner = el.owner;
        elements.push(quad);
    }

    let mut out = FeMesh::new(nodes, elements)?;
    for name in mesh.side_set_names() {
        if let Some(sides) = mesh.side_set(name) {
            out.add_side_set(name, sides.to_vec())?;
        }
    }
    Ok(out)
}

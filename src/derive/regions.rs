//! Face-connected regions of binned elements.
use crate::bridge::ElementHandleMap;
use crate::db::TetHandle;
use crate::fem::mesh::{ElemId, FeMesh};
use std::collections::{BTreeSet, VecDeque};

/// Splits `elems` into maximal face-connected components.
///
/// Components are returned in order of their smallest element id.
pub fn connected_components(mesh: &FeMesh, elems: &BTreeSet<ElemId>) -> Vec<BTreeSet<ElemId>> {
    let mut remaining = elems.clone();
    let mut components = Vec::new();

    while let Some(seed) = remaining.pop_first() {
        let mut component = BTreeSet::from([seed]);
        let mut frontier = VecDeque::from([seed]);
        while let Some(elem) = frontier.pop_front() {
            for &nb in mesh.neighbors(elem).iter().flatten() {
                if remaining.remove(&nb) {
                    component.insert(nb);
                    frontier.push_back(nb);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Connected regions of one bin, as the tetrahedra created for their elements.
pub fn group_regions(
    mesh: &FeMesh,
    elems: &BTreeSet<ElemId>,
    handles: &ElementHandleMap,
) -> Vec<BTreeSet<TetHandle>> {
    connected_components(mesh, elems)
        .into_iter()
        .map(|component| {
            component
                .iter()
                .flat_map(|&e| handles.tets(e).iter().copied())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::generate::box_mesh;
    use crate::geom::point::Point;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use std::collections::HashMap;

    fn strip() -> FeMesh {
        box_mesh(Point::new(0., 0., 0.), Point::new(5., 1., 1.), [5, 1, 1], |_| 1).unwrap()
    }

    /// Elements of the unit cells with the given x indices.
    fn cells(ix: &[usize]) -> BTreeSet<ElemId> {
        ix.iter().flat_map(|&i| 6 * i..6 * i + 6).collect()
    }

    #[test]
    fn test_components() {
        let mesh = strip();
        let comps = connected_components(&mesh, &cells(&[0, 1, 3]));
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], cells(&[0, 1]));
        assert_eq!(comps[1], cells(&[3]));
        assert!(connected_components(&mesh, &BTreeSet::new()).is_empty());
    }

    /// Union-find over the neighbour graph, visiting elements in random order.
    fn union_find_components(mesh: &FeMesh, elems: &[ElemId]) -> BTreeSet<BTreeSet<ElemId>> {
        let mut parent: HashMap<ElemId, ElemId> = elems.iter().map(|&e| (e, e)).collect();
        fn find(parent: &mut HashMap<ElemId, ElemId>, e: ElemId) -> ElemId {
            let p = parent[&e];
            if p == e {
                return e;
            }
            let root = find(parent, p);
            parent.insert(e, root);
            root
        }
        for &e in elems {
            for &nb in mesh.neighbors(e).iter().flatten() {
                if parent.contains_key(&nb) {
                    let (a, b) = (find(&mut parent, e), find(&mut parent, nb));
                    parent.insert(a, b);
                }
            }
        }
        let mut groups: HashMap<ElemId, BTreeSet<ElemId>> = HashMap::new();
        for &e in elems {
            let root = find(&mut parent, e);
            groups.entry(root).or_default().insert(e);
        }
        groups.into_values().collect()
    }

    #[test]
    fn test_components_match_union_find() {
        let mesh = strip();
        let set = cells(&[0, 2, 3]);
        let expected: BTreeSet<_> = connected_components(&mesh, &set).into_iter().collect();
        assert_eq!(expected.len(), 2);
        let mut rng = StdRng::seed_from_u64(7);
        let mut order: Vec<ElemId> = set.iter().copied().collect();
        for _ in 0..10 {
            order.shuffle(&mut rng);
            assert_eq!(union_find_components(&mesh, &order), expected);
            let reinserted: BTreeSet<ElemId> = order.iter().copied().collect();
            let comps: BTreeSet<_> = connected_components(&mesh, &reinserted).into_iter().collect();
            assert_eq!(comps, expected);
        }
    }

    #[test]
    fn test_group_regions_maps_handles() {
        let mesh = strip();
        let mut handles = ElementHandleMap::new(mesh.n_elements());
        for e in 0..mesh.n_elements() {
            handles.insert(e, TetHandle(e + 10)).unwrap();
        }
        let regions = group_regions(&mesh, &cells(&[4]), &handles);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0], (34..40).map(TetHandle).collect());
    }
}

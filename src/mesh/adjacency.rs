use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::{ConfigurationError, Result};

use super::element::{Element, ElementKind};

/// Local node indices of face `f`, which lies opposite node `f`.
pub(super) const FACE_NODES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// Face and node connectivity of the tetrahedra of a mesh.
///
/// Built from the element table against one mesh revision. Element indices
/// are indices into the mesh's element table; non-tetrahedral elements have
/// no faces and no neighbours.
#[derive(Debug, Clone)]
pub struct Adjacency {
    revision: u64,
    nodes: Vec<Option<[usize; 4]>>,
    neighbors: Vec<[Option<usize>; 4]>,
    node_elements: Vec<Vec<usize>>,
    boundary: Vec<(usize, usize)>,
}

impl Adjacency {
    /// Builds the tables for `elements` over `node_count` nodes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NonManifoldFace`] if a face is shared by
    /// more than two tetrahedra.
    pub(super) fn build(elements: &[Element], node_count: usize, revision: u64) -> Result<Self> {
        let nodes: Vec<Option<[usize; 4]>> = elements
            .iter()
            .map(|e| match (e.kind(), e.nodes()) {
                (ElementKind::Tetrahedron, &[a, b, c, d]) => Some([a, b, c, d]),
                _ => None,
            })
            .collect();

        let mut faces: HashMap<[usize; 3], Vec<(usize, usize)>> = HashMap::new();
        let mut node_elements = vec![Vec::new(); node_count];
        for (element, tet) in nodes.iter().enumerate() {
            let Some(tet) = tet else { continue };
            for &node in tet {
                node_elements[node].push(element);
            }
            for (face, local) in FACE_NODES.iter().enumerate() {
                let mut key = local.map(|l| tet[l]);
                key.sort_unstable();
                faces.entry(key).or_default().push((element, face));
            }
        }

        let mut neighbors = vec![[None; 4]; elements.len()];
        for (key, sharing) in &faces {
            match sharing.as_slice() {
                [_] => {}
                &[(a, fa), (b, fb)] => {
                    neighbors[a][fa] = Some(b);
                    neighbors[b][fb] = Some(a);
                }
                _ => return Err(ConfigurationError::NonManifoldFace { nodes: *key }.into()),
            }
        }

        let boundary = nodes
            .iter()
            .enumerate()
            .filter(|(_, tet)| tet.is_some())
            .flat_map(|(element, _)| (0..4).map(move |face| (element, face)))
            .filter(|&(element, face)| neighbors[element][face].is_none())
            .collect();

        Ok(Self {
            revision,
            nodes,
            neighbors,
            node_elements,
            boundary,
        })
    }

    /// Mesh revision the tables were built against.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Element across face `face` of `element`, or `None` on the mesh
    /// boundary.
    #[must_use]
    pub fn neighbor(&self, element: usize, face: usize) -> Option<usize> {
        self.neighbors.get(element)?.get(face).copied().flatten()
    }

    /// Tetrahedra referencing `node`.
    #[must_use]
    pub fn elements_at_node(&self, node: usize) -> &[usize] {
        self.node_elements.get(node).map_or(&[], Vec::as_slice)
    }

    /// Boundary faces as `(element, face)` pairs, in element order.
    #[must_use]
    pub fn boundary_faces(&self) -> &[(usize, usize)] {
        &self.boundary
    }

    /// Tetrahedra sharing at least one node with `element`: those sharing
    /// three nodes first, then two, then one, ties in element order.
    #[must_use]
    pub fn extended_neighbors(&self, element: usize) -> Vec<usize> {
        let Some(Some(tet)) = self.nodes.get(element) else {
            return Vec::new();
        };

        let mut shared: HashMap<usize, usize> = HashMap::new();
        for &node in tet {
            for &other in self.elements_at_node(node) {
                if other != element {
                    *shared.entry(other).or_default() += 1;
                }
            }
        }

        let mut ordered: Vec<(usize, usize)> = shared.into_iter().collect();
        ordered.sort_unstable_by_key(|&(other, count)| (Reverse(count), other));
        ordered.into_iter().map(|(other, _)| other).collect()
    }
}

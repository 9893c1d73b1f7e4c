use crate::math::{HalfSpace, Point3};

use super::adjacency::FACE_NODES;
use super::Tetrahedron;

/// A face on the outer boundary of a tetrahedral mesh.
///
/// Refers to its single adjacent element by index; the plane is that
/// element's outward face plane, so it also points out of the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    tetrahedron: usize,
    face: usize,
    nodes: [usize; 3],
    plane: HalfSpace,
}

impl Triangle {
    pub(super) fn new(tet: &Tetrahedron, face: usize, plane: HalfSpace) -> Self {
        let all = tet.node_indices();
        Self {
            tetrahedron: tet.index(),
            face,
            nodes: FACE_NODES[face].map(|l| all[l]),
            plane,
        }
    }

    /// Index of the element inside the boundary.
    #[must_use]
    pub fn tetrahedron(&self) -> usize {
        self.tetrahedron
    }

    /// Local face index within [`Triangle::tetrahedron`].
    #[must_use]
    pub fn face(&self) -> usize {
        self.face
    }

    #[must_use]
    pub fn nodes(&self) -> [usize; 3] {
        self.nodes
    }

    #[must_use]
    pub fn plane(&self) -> &HalfSpace {
        &self.plane
    }

    /// Whether `p` lies on the outer side of the face plane.
    #[must_use]
    pub fn faces_point(&self, p: &Point3) -> bool {
        self.plane.signed_distance(p) > 0.0
    }
}

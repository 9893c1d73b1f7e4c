use std::cell::Cell;

use nalgebra::{Matrix4, Vector4};

use crate::error::{ConfigurationError, Result};
use crate::math::{point_at, HalfSpace, Point3, Vector3, STEP_EPSILON, TOLERANCE};
use crate::shape::{Crossing, Polytope, Shape};

use super::adjacency::FACE_NODES;
use super::Mesh;

/// The face a [`Tetrahedron`] reported on its last crossing query, together
/// with the segment it was queried with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceHit {
    /// Local face index; face `f` lies opposite node `f`.
    pub face: usize,
    pub u: f64,
    /// The crossing lies on an edge or vertex.
    pub tie: bool,
    pub entering: bool,
    pub p0: Point3,
    pub p1: Point3,
}

/// A tetrahedral mesh element as a convex polytope of four faces.
///
/// Instances are built by [`Mesh::tetrahedron`] against one mesh revision
/// and refer to other elements only by index.
#[derive(Debug, Clone)]
pub struct Tetrahedron {
    index: usize,
    revision: u64,
    nodes: [usize; 4],
    vertices: [Point3; 4],
    region: Option<u32>,
    polytope: Polytope,
    last_hit: Cell<Option<FaceHit>>,
    coefficients: Cell<Option<(u64, Vector4<f64>)>>,
}

impl Tetrahedron {
    /// Builds element `index` of `mesh`.
    ///
    /// Each face plane is computed from the face's nodes in ascending node
    /// order, so the two elements sharing a face get exactly opposite
    /// half-spaces.
    pub(super) fn build(mesh: &Mesh, index: usize, nodes: [usize; 4]) -> Result<Self> {
        let vertices = nodes.map(|n| mesh.nodes()[n]);
        let [a, b, c, d] = vertices;
        let volume = (b - a).dot(&(c - a).cross(&(d - a))) / 6.0;
        let scale = [b - a, c - a, d - a, c - b, d - b, d - c]
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max);
        if volume.abs() <= TOLERANCE * scale.powi(3) {
            return Err(ConfigurationError::DegenerateTetrahedron(index).into());
        }

        let mut planes = Vec::with_capacity(4);
        for (face, local) in FACE_NODES.iter().enumerate() {
            let mut global = local.map(|l| nodes[l]);
            global.sort_unstable();
            let [p, q, r] = global.map(|n| mesh.nodes()[n]);
            let normal = (q - p).cross(&(r - p));
            let plane = HalfSpace::through_point(normal, &p)?;
            // Outward means away from the opposite vertex.
            planes.push(if plane.signed_distance(&vertices[face]) > 0.0 {
                plane.flipped()
            } else {
                plane
            });
        }

        Ok(Self {
            index,
            revision: mesh.revision(),
            nodes,
            vertices,
            region: mesh.elements()[index].region(),
            polytope: Polytope::new(planes),
            last_hit: Cell::new(None),
            coefficients: Cell::new(None),
        })
    }

    /// Index in the mesh's element table.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Mesh revision this element was built against.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn node_indices(&self) -> [usize; 4] {
        self.nodes
    }

    #[must_use]
    pub fn vertices(&self) -> &[Point3; 4] {
        &self.vertices
    }

    /// Physical region tag of the element.
    #[must_use]
    pub fn region(&self) -> Option<u32> {
        self.region
    }

    /// Outward half-space of face `face`.
    #[must_use]
    pub fn face_plane(&self, face: usize) -> Option<&HalfSpace> {
        self.polytope.plane(face)
    }

    #[must_use]
    pub fn polytope(&self) -> &Polytope {
        &self.polytope
    }

    #[must_use]
    pub fn centroid(&self) -> Point3 {
        let sum = self.vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Point3::from(sum / 4.0)
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        let [a, b, c, d] = self.vertices;
        ((b - a).dot(&(c - a).cross(&(d - a))) / 6.0).abs()
    }

    /// Face reported by the last [`Shape::first_normal`] call.
    #[must_use]
    pub fn last_hit(&self) -> Option<FaceHit> {
        self.last_hit.get()
    }

    /// Net charge of the element in elementary charges.
    ///
    /// # Errors
    ///
    /// Returns an error if the element no longer exists in `mesh`.
    pub fn charge(&self, mesh: &Mesh) -> Result<i64> {
        mesh.charge(self.index)
    }

    /// Element entered when continuing past the face of the last crossing.
    ///
    /// A crossing through the interior of a face leads to the neighbour
    /// across it, or `None` on the mesh boundary. A crossing on an edge or
    /// vertex is resolved by testing the elements sharing three, two, then
    /// one node with this one for ownership of the crossing point along the
    /// original segment, then of a point just past it; the first that claims
    /// one is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the adjacency table or a neighbouring element
    /// cannot be built.
    pub fn next_element(&self, mesh: &Mesh) -> Result<Option<usize>> {
        let Some(hit) = self.last_hit.get() else {
            return Ok(None);
        };
        let adjacency = mesh.adjacency()?;
        if !hit.tie {
            return Ok(adjacency.neighbor(self.index, hit.face));
        }

        let delta = hit.p1 - hit.p0;
        let candidates = adjacency.extended_neighbors(self.index);
        // Round-off can leave the exact crossing point inside this element,
        // where no neighbour claims it; retry just past it.
        for u in [hit.u, hit.u + STEP_EPSILON] {
            let point = point_at(&hit.p0, &hit.p1, u);
            for &candidate in &candidates {
                if mesh
                    .tetrahedron(candidate)?
                    .contains_toward(&point, &(point + delta))?
                {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    /// Linear interpolation of the node potentials at `p`.
    ///
    /// The affine coefficients are solved once per potential update.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::PotentialCountMismatch`] if no potential
    /// table matching the node count is loaded.
    pub fn potential_at(&self, mesh: &Mesh, p: &Point3) -> Result<f64> {
        let stamp = mesh.potential_stamp();
        let coefficients = match self.coefficients.get() {
            Some((cached, k)) if cached == stamp => k,
            _ => {
                let k = self.solve_coefficients(mesh)?;
                self.coefficients.set(Some((stamp, k)));
                k
            }
        };
        Ok(coefficients.dot(&Vector4::new(p.x, p.y, p.z, 1.0)))
    }

    fn solve_coefficients(&self, mesh: &Mesh) -> Result<Vector4<f64>> {
        let potentials = mesh.node_potentials();
        if potentials.len() != mesh.nodes().len() {
            return Err(ConfigurationError::PotentialCountMismatch {
                expected: mesh.nodes().len(),
                found: potentials.len(),
            }
            .into());
        }
        let system = Matrix4::from_fn(|r, c| {
            let v = &self.vertices[r];
            [v.x, v.y, v.z, 1.0][c]
        });
        let values = Vector4::from_fn(|r, _| potentials[self.nodes[r]]);
        system
            .lu()
            .solve(&values)
            .ok_or_else(|| ConfigurationError::DegenerateTetrahedron(self.index).into())
    }
}

impl Shape for Tetrahedron {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        self.polytope.contains_toward(p0, p1)
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let hit = self.polytope.clip(p0, p1);
        self.last_hit.set(hit.map(|h| FaceHit {
            face: h.plane,
            u: h.u,
            tie: h.tie,
            entering: h.entering,
            p0: *p0,
            p1: *p1,
        }));
        self.polytope.first_normal(p0, p1)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.polytope.last_crossing()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::error::TraceError;
    use crate::mesh::{fixtures, Element};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn faces_point_away_from_opposite_vertices() {
        let mesh = fixtures::tetrahedron_pair();
        let tet = mesh.tetrahedron(0).unwrap();
        assert_eq!(*tet.face_plane(3).unwrap().normal(), -Vector3::z());
        assert_eq!(*tet.face_plane(1).unwrap().normal(), -Vector3::x());
        assert!(tet.contains(&tet.centroid()).unwrap());
        assert_relative_eq!(tet.volume(), 1.0 / 6.0);
    }

    #[test]
    fn shared_faces_are_exactly_opposite() {
        let mesh = fixtures::kuhn_cube();
        let adjacency = mesh.adjacency().unwrap();
        for a in 0..6 {
            for face in 0..4 {
                let Some(b) = adjacency.neighbor(a, face) else { continue };
                let ta = mesh.tetrahedron(a).unwrap();
                let tb = mesh.tetrahedron(b).unwrap();
                let back = (0..4)
                    .find(|&f| adjacency.neighbor(b, f) == Some(a))
                    .unwrap();
                assert_eq!(*ta.face_plane(face).unwrap(), tb.face_plane(back).unwrap().flipped());
            }
        }
    }

    #[test]
    fn endpoint_on_shared_face_continues_into_neighbour() {
        let mesh = fixtures::tetrahedron_pair();
        let upper = mesh.tetrahedron(0).unwrap();
        let p0 = upper.centroid();
        let p1 = p(0.25, 0.25, 0.0);

        let c = upper.first_normal(&p0, &p1).unwrap().unwrap();
        assert_relative_eq!(c.u, 1.0);
        assert!(!c.tie);
        assert_eq!(upper.last_hit().unwrap().face, 3);
        assert_eq!(upper.next_element(&mesh).unwrap(), Some(1));
    }

    #[test]
    fn boundary_face_has_no_next_element() {
        let mesh = fixtures::tetrahedron_pair();
        let upper = mesh.tetrahedron(0).unwrap();
        upper
            .first_normal(&upper.centroid(), &p(0.25, 0.25, 2.0))
            .unwrap()
            .unwrap();
        assert_eq!(upper.next_element(&mesh).unwrap(), None);
    }

    #[test]
    fn edge_crossing_uses_extended_neighbours() {
        let mesh = fixtures::edge_fan();
        let first = mesh.tetrahedron(0).unwrap();
        let p0 = p(0.2, 0.2, 0.25);
        let p1 = p(-0.2, -0.2, 0.25);

        let c = first.first_normal(&p0, &p1).unwrap().unwrap();
        assert!(c.tie);
        assert_relative_eq!(c.u, 0.5);
        // Only the opposite quadrant owns the continuation.
        assert_eq!(first.next_element(&mesh).unwrap(), Some(2));
    }

    #[test]
    fn edge_crossing_at_an_inexact_parameter_finds_the_opposite_quadrant() {
        let mesh = fixtures::edge_fan();
        let first = mesh.tetrahedron(0).unwrap();
        let p0 = p(0.1, 0.1, 0.25);
        let p1 = p(-0.2, -0.2, 0.25);

        let c = first.first_normal(&p0, &p1).unwrap().unwrap();
        assert!(c.tie);
        assert_relative_eq!(c.u, 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(first.next_element(&mesh).unwrap(), Some(2));
    }

    #[test]
    fn edge_crossing_out_of_the_mesh_has_no_next_element() {
        let mesh = fixtures::tetrahedron_pair();
        let upper = mesh.tetrahedron(0).unwrap();
        let c = upper
            .first_normal(&p(0.25, 0.25, 0.25), &p(-0.25, 0.25, -0.25))
            .unwrap()
            .unwrap();
        assert!(c.tie);
        assert_eq!(upper.next_element(&mesh).unwrap(), None);
    }

    #[test]
    fn potential_interpolates_linearly() {
        let mut mesh = fixtures::tetrahedron_pair();
        let potential = |q: &Point3| 1.0 + 2.0 * q.x - q.y + 0.5 * q.z;
        let values = mesh.nodes().iter().map(potential).collect();
        mesh.set_node_potentials(values).unwrap();

        let tet = mesh.tetrahedron(1).unwrap();
        let q = p(0.1, 0.2, -0.3);
        assert_relative_eq!(tet.potential_at(&mesh, &q).unwrap(), potential(&q), epsilon = 1e-12);

        // New potentials invalidate the cached coefficients.
        let doubled = mesh.nodes().iter().map(|n| 2.0 * potential(n)).collect();
        mesh.set_node_potentials(doubled).unwrap();
        assert_relative_eq!(tet.potential_at(&mesh, &q).unwrap(), 2.0 * potential(&q), epsilon = 1e-12);
    }

    #[test]
    fn potential_requires_a_table() {
        let mesh = fixtures::tetrahedron_pair();
        let tet = mesh.tetrahedron(0).unwrap();
        assert!(matches!(
            tet.potential_at(&mesh, &tet.centroid()),
            Err(TraceError::Configuration(ConfigurationError::PotentialCountMismatch { found: 0, .. }))
        ));
    }

    #[test]
    fn flat_element_is_degenerate() {
        let nodes = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0)];
        let mesh = Mesh::new(nodes, vec![Element::tetrahedron(1, [0, 1, 2, 3])]).unwrap();
        assert!(matches!(
            mesh.tetrahedron(0),
            Err(TraceError::Configuration(ConfigurationError::DegenerateTetrahedron(0)))
        ));
    }
}

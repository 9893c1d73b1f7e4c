//! Tetrahedral mesh connectivity, elements and the mesh boundary shape.
//!
//! The [`Mesh`] owns every table; elements, faces and boundary triangles
//! refer to each other by index. Derived data (adjacency, tetrahedron face
//! planes, interpolation coefficients) is built lazily and stamped with the
//! revision it was built against.

mod adjacency;
mod boundary;
mod element;
#[cfg(test)]
pub(crate) mod fixtures;
mod tetrahedron;
mod triangle;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

pub use adjacency::Adjacency;
pub use boundary::MeshShape;
pub use element::{Element, ElementKind};
pub use tetrahedron::{FaceHit, Tetrahedron};
pub use triangle::Triangle;

use crate::error::{ConfigurationError, Result};
use crate::math::{Point3, Vector3};
use crate::shape::Shape;

#[derive(Debug, Clone, Default)]
struct TetrahedronCache {
    revision: u64,
    slots: Vec<Option<Rc<Tetrahedron>>>,
}

/// Node coordinates, element table and per-element / per-node scalar data.
#[derive(Debug, Clone)]
pub struct Mesh {
    nodes: Vec<Point3>,
    elements: Vec<Element>,
    revision: u64,
    charges: Vec<i64>,
    potentials: Vec<f64>,
    potential_stamp: u64,
    adjacency: RefCell<Option<Rc<Adjacency>>>,
    tetrahedra: RefCell<TetrahedronCache>,
}

impl Mesh {
    /// Creates a mesh from its node and element tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::WrongNodeCount`] or
    /// [`ConfigurationError::NodeOutOfRange`] for a malformed element.
    pub fn new(nodes: Vec<Point3>, elements: Vec<Element>) -> Result<Self> {
        for (index, element) in elements.iter().enumerate() {
            element.validate(index, nodes.len())?;
        }
        Ok(Self {
            charges: vec![0; elements.len()],
            nodes,
            elements,
            revision: 0,
            potentials: Vec::new(),
            potential_stamp: 0,
            adjacency: RefCell::new(None),
            tetrahedra: RefCell::new(TetrahedronCache::default()),
        })
    }

    #[must_use]
    pub fn nodes(&self) -> &[Point3] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Point3> {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Returns element `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ElementOutOfRange`] for a bad index.
    pub fn element(&self, index: usize) -> Result<&Element> {
        self.elements.get(index).ok_or_else(|| {
            ConfigurationError::ElementOutOfRange {
                index,
                count: self.elements.len(),
            }
            .into()
        })
    }

    /// Indices of the tetrahedral elements, in table order.
    pub fn tetrahedra(&self) -> impl Iterator<Item = usize> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind() == ElementKind::Tetrahedron)
            .map(|(i, _)| i)
    }

    /// Revision of the geometry and topology. Every derived cache is
    /// rebuilt once its stamp differs from this.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Moves node `index` to `p`.
    ///
    /// Cached element geometry is not invalidated; call
    /// [`Mesh::update_geom`] once all nodes have moved.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownNode`] for a bad index.
    pub fn set_node(&mut self, index: usize, p: Point3) -> Result<()> {
        let count = self.nodes.len();
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(ConfigurationError::UnknownNode { index, count })?;
        *node = p;
        Ok(())
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Point3] {
        &mut self.nodes
    }

    /// Marks all cached element geometry stale after node coordinates
    /// changed.
    pub fn update_geom(&mut self) {
        self.revision += 1;
        debug!(revision = self.revision, "mesh geometry updated");
    }

    /// Replaces the element table, for example after refinement. Charges are
    /// reset and every cache goes stale.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is malformed; the mesh is unchanged.
    pub fn refine_topology(&mut self, elements: Vec<Element>) -> Result<()> {
        for (index, element) in elements.iter().enumerate() {
            element.validate(index, self.nodes.len())?;
        }
        self.charges = vec![0; elements.len()];
        self.elements = elements;
        self.revision += 1;
        debug!(
            revision = self.revision,
            elements = self.elements.len(),
            "mesh topology replaced"
        );
        Ok(())
    }

    /// Net charge of element `index` in elementary charges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ElementOutOfRange`] for a bad index.
    pub fn charge(&self, index: usize) -> Result<i64> {
        self.element(index)?;
        Ok(self.charges[index])
    }

    /// Sets the net charge of element `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ElementOutOfRange`] for a bad index.
    pub fn set_charge(&mut self, index: usize, charge: i64) -> Result<()> {
        self.element(index)?;
        self.charges[index] = charge;
        Ok(())
    }

    /// Adds `delta` to the charge of element `index` and returns the new
    /// total.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ElementOutOfRange`] for a bad index.
    pub fn add_charge(&mut self, index: usize, delta: i64) -> Result<i64> {
        self.element(index)?;
        self.charges[index] += delta;
        Ok(self.charges[index])
    }

    /// Loads one potential per node. Cached interpolation coefficients go
    /// stale.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::PotentialCountMismatch`] unless there is
    /// exactly one value per node.
    pub fn set_node_potentials(&mut self, potentials: Vec<f64>) -> Result<()> {
        if potentials.len() != self.nodes.len() {
            return Err(ConfigurationError::PotentialCountMismatch {
                expected: self.nodes.len(),
                found: potentials.len(),
            }
            .into());
        }
        self.potentials = potentials;
        self.potential_stamp += 1;
        Ok(())
    }

    #[must_use]
    pub fn node_potentials(&self) -> &[f64] {
        &self.potentials
    }

    #[must_use]
    pub fn node_potential(&self, index: usize) -> Option<f64> {
        self.potentials.get(index).copied()
    }

    pub(crate) fn potential_stamp(&self) -> u64 {
        self.potential_stamp
    }

    /// Face adjacency of the current revision, built on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NonManifoldFace`] if a face is shared
    /// by more than two tetrahedra.
    pub fn adjacency(&self) -> Result<Rc<Adjacency>> {
        if let Some(adjacency) = self.adjacency.borrow().as_ref() {
            if adjacency.revision() == self.revision {
                return Ok(Rc::clone(adjacency));
            }
        }
        let adjacency = Rc::new(Adjacency::build(
            &self.elements,
            self.nodes.len(),
            self.revision,
        )?);
        trace!(
            revision = self.revision,
            boundary_faces = adjacency.boundary_faces().len(),
            "built mesh adjacency"
        );
        *self.adjacency.borrow_mut() = Some(Rc::clone(&adjacency));
        Ok(adjacency)
    }

    /// Tetrahedron for element `index`, built on first use and cached until
    /// the revision changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range, the element is not a
    /// tetrahedron, or its nodes are coplanar.
    pub fn tetrahedron(&self, index: usize) -> Result<Rc<Tetrahedron>> {
        let element = self.element(index)?;
        let nodes = match (element.kind(), element.nodes()) {
            (ElementKind::Tetrahedron, &[a, b, c, d]) => [a, b, c, d],
            (kind, _) => {
                return Err(ConfigurationError::NotATetrahedron {
                    element: index,
                    kind: kind.name(),
                }
                .into())
            }
        };

        {
            let mut cache = self.tetrahedra.borrow_mut();
            if cache.revision != self.revision {
                cache.revision = self.revision;
                cache.slots.clear();
            }
            if let Some(Some(tet)) = cache.slots.get(index) {
                return Ok(Rc::clone(tet));
            }
        }

        let tet = Rc::new(Tetrahedron::build(self, index, nodes)?);
        trace!(element = index, revision = self.revision, "built tetrahedron");
        let mut cache = self.tetrahedra.borrow_mut();
        if cache.slots.len() <= index {
            cache.slots.resize(self.elements.len(), None);
        }
        cache.slots[index] = Some(Rc::clone(&tet));
        Ok(tet)
    }

    /// Faces belonging to exactly one tetrahedron, in element order.
    ///
    /// # Errors
    ///
    /// Returns an error if the adjacency table or a boundary element cannot
    /// be built.
    pub fn boundary_triangles(&self) -> Result<Vec<Triangle>> {
        let adjacency = self.adjacency()?;
        let mut triangles = Vec::with_capacity(adjacency.boundary_faces().len());
        for &(element, face) in adjacency.boundary_faces() {
            let tet = self.tetrahedron(element)?;
            if let Some(plane) = tet.face_plane(face) {
                triangles.push(Triangle::new(&tet, face, *plane));
            }
        }
        Ok(triangles)
    }

    /// Finds the first tetrahedron containing `p` for a trajectory moving
    /// along `dir`, scanning every element.
    ///
    /// Reference implementation for the point-location walk of
    /// [`MeshShape`].
    ///
    /// # Errors
    ///
    /// Returns an error if an element cannot be built.
    pub fn brute_force_locate(&self, p: &Point3, dir: &Vector3) -> Result<Option<usize>> {
        let toward = p + dir;
        for index in self.tetrahedra() {
            if self.tetrahedron(index)?.contains_toward(p, &toward)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::TraceError;

    #[test]
    fn malformed_elements_are_rejected() {
        let nodes = vec![Point3::origin(); 4];
        let wrong = Element::new(ElementKind::Triangle, vec![1], vec![0, 1]);
        assert!(matches!(
            Mesh::new(nodes.clone(), vec![wrong]),
            Err(TraceError::Configuration(ConfigurationError::WrongNodeCount { .. }))
        ));
        let far = Element::tetrahedron(1, [0, 1, 2, 9]);
        assert!(matches!(
            Mesh::new(nodes, vec![far]),
            Err(TraceError::Configuration(ConfigurationError::NodeOutOfRange { node: 9, .. }))
        ));
    }

    #[test]
    fn non_tetrahedral_element_is_not_a_tetrahedron() {
        let mut mesh = fixtures::tetrahedron_pair();
        let mut elements = mesh.elements().to_vec();
        elements.push(Element::new(ElementKind::Triangle, vec![9], vec![0, 1, 2]));
        mesh.refine_topology(elements).unwrap();
        assert!(matches!(
            mesh.tetrahedron(2),
            Err(TraceError::Configuration(ConfigurationError::NotATetrahedron {
                element: 2,
                kind: "triangle"
            }))
        ));
        assert!(matches!(
            mesh.tetrahedron(3),
            Err(TraceError::Configuration(ConfigurationError::ElementOutOfRange { index: 3, .. }))
        ));
        assert_eq!(mesh.tetrahedra().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn tetrahedra_are_cached_per_revision() {
        let mut mesh = fixtures::tetrahedron_pair();
        let first = mesh.tetrahedron(0).unwrap();
        assert!(Rc::ptr_eq(&first, &mesh.tetrahedron(0).unwrap()));

        // Moving a node alone leaves the cached geometry in place.
        mesh.set_node(3, Point3::new(0.0, 0.0, 2.0)).unwrap();
        let stale = mesh.tetrahedron(0).unwrap();
        assert!(Rc::ptr_eq(&first, &stale));

        mesh.update_geom();
        let fresh = mesh.tetrahedron(0).unwrap();
        assert!(!Rc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.revision(), 1);
        assert!(fresh.contains(&Point3::new(0.1, 0.1, 1.5)).unwrap());
    }

    #[test]
    fn adjacency_is_rebuilt_after_revision_bump() {
        let mut mesh = fixtures::tetrahedron_pair();
        let before = mesh.adjacency().unwrap();
        assert!(Rc::ptr_eq(&before, &mesh.adjacency().unwrap()));
        mesh.update_geom();
        let after = mesh.adjacency().unwrap();
        assert_eq!(after.revision(), 1);
        assert!(!Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn charges_are_tracked_per_element() {
        let mut mesh = fixtures::tetrahedron_pair();
        mesh.set_charge(0, 3).unwrap();
        assert_eq!(mesh.add_charge(0, -5).unwrap(), -2);
        assert_eq!(mesh.tetrahedron(0).unwrap().charge(&mesh).unwrap(), -2);
        assert_eq!(mesh.charge(1).unwrap(), 0);
        assert!(mesh.set_charge(7, 1).is_err());
    }

    #[test]
    fn potential_table_must_match_nodes() {
        let mut mesh = fixtures::tetrahedron_pair();
        assert!(matches!(
            mesh.set_node_potentials(vec![0.0; 2]),
            Err(TraceError::Configuration(ConfigurationError::PotentialCountMismatch {
                expected: 5,
                found: 2
            }))
        ));
        mesh.set_node_potentials(vec![1.0; 5]).unwrap();
        assert_eq!(mesh.node_potential(4), Some(1.0));
    }

    #[test]
    fn boundary_triangles_face_outward() {
        let mesh = fixtures::kuhn_cube();
        let triangles = mesh.boundary_triangles().unwrap();
        assert_eq!(triangles.len(), 12);
        let center = Point3::new(0.5, 0.5, 0.5);
        for triangle in &triangles {
            assert!(!triangle.faces_point(&center));
            assert!(triangle.faces_point(&Point3::new(
                0.5 + 2.0 * triangle.plane().normal().x,
                0.5 + 2.0 * triangle.plane().normal().y,
                0.5 + 2.0 * triangle.plane().normal().z,
            )));
        }
    }

    #[test]
    fn brute_force_scan_finds_owner() {
        let mesh = fixtures::kuhn_cube();
        for index in 0..6 {
            let centroid = mesh.tetrahedron(index).unwrap().centroid();
            assert_eq!(
                mesh.brute_force_locate(&centroid, &Vector3::zeros()).unwrap(),
                Some(index)
            );
        }
        assert_eq!(
            mesh.brute_force_locate(&Point3::new(2.0, 0.5, 0.5), &Vector3::zeros())
                .unwrap(),
            None
        );
    }
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigurationError, InternalConsistencyFault, Result};
use crate::math::{point_at, Point3, Vector3};
use crate::shape::{Crossing, Shape};

use super::{Mesh, Triangle};

/// Known-inside starting point of every point-location walk.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    revision: u64,
    element: usize,
    point: Point3,
}

/// How a walk through the elements along a segment ended.
enum Walk {
    /// The segment ends in (or on the far face of) this element.
    Arrived(usize),
    /// The segment leaves the mesh through a boundary face of `element`.
    Left { element: usize, crossing: Crossing },
}

/// The closed boundary surface of a tetrahedral mesh as a shape.
///
/// Inside is the union of the mesh's tetrahedra. Points are located by
/// walking element to element from a fixed anchor toward the query point,
/// which visits roughly `N^(1/3)` of `N` elements in a compact mesh.
#[derive(Debug, Clone)]
pub struct MeshShape {
    mesh: Mesh,
    config: EngineConfig,
    anchor: Cell<Option<Anchor>>,
    boundary: RefCell<Option<(u64, Rc<[Triangle]>)>>,
    last: Cell<Option<Crossing>>,
    containing: Cell<Option<usize>>,
    steps: Cell<usize>,
}

impl MeshShape {
    /// Wraps `mesh` with default tolerances.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoTetrahedra`] if the mesh has no
    /// volume elements.
    pub fn new(mesh: Mesh) -> Result<Self> {
        Self::with_config(mesh, EngineConfig::default())
    }

    /// Wraps `mesh` with explicit tolerances.
    ///
    /// # Errors
    ///
    /// See [`MeshShape::new`].
    pub fn with_config(mesh: Mesh, config: EngineConfig) -> Result<Self> {
        if mesh.tetrahedra().next().is_none() {
            return Err(ConfigurationError::NoTetrahedra.into());
        }
        Ok(Self {
            mesh,
            config,
            anchor: Cell::new(None),
            boundary: RefCell::new(None),
            last: Cell::new(None),
            containing: Cell::new(None),
            steps: Cell::new(0),
        })
    }

    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Mutable access to the mesh. Call [`Mesh::update_geom`] after moving
    /// nodes; the anchor and boundary caches follow the mesh revision.
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    /// Element holding the start point of the last query, or `None` if it
    /// was outside.
    #[must_use]
    pub fn containing_element(&self) -> Option<usize> {
        self.containing.get()
    }

    /// Number of elements visited by the last query.
    #[must_use]
    pub fn last_walk_steps(&self) -> usize {
        self.steps.get()
    }

    /// Element the walks start from.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor element cannot be built.
    pub fn anchor_element(&self) -> Result<usize> {
        Ok(self.anchor()?.element)
    }

    /// Finds the element owning `target` for a trajectory moving along
    /// `dir`, or `None` outside the mesh.
    ///
    /// # Errors
    ///
    /// Returns [`InternalConsistencyFault`] if the walk exceeds its
    /// iteration cap or loses track of its element.
    pub fn locate(&self, target: &Point3, dir: &Vector3) -> Result<Option<usize>> {
        let anchor = self.anchor()?;
        let mut element = anchor.element;
        let mut u = 0.0;

        for _ in 0..self.config.max_iterations {
            match self.walk(element, &anchor.point, target, u)? {
                Walk::Arrived(last) => return self.settle(last, target, dir),
                Walk::Left {
                    element: last,
                    crossing,
                } => {
                    if crossing.u >= 1.0 - self.config.arrival_epsilon {
                        return self.settle(last, target, dir);
                    }
                    let resume = crossing.u + self.config.step_epsilon;
                    match self.nearest_entry(&anchor.point, target, resume)? {
                        Some((entered, entry)) => {
                            element = entered;
                            u = entry.u;
                        }
                        None => return Ok(None),
                    }
                }
            }
        }

        Err(InternalConsistencyFault::IterationCap {
            algorithm: "mesh point location",
            cap: self.config.max_iterations,
        }
        .into())
    }

    fn anchor(&self) -> Result<Anchor> {
        let revision = self.mesh.revision();
        if let Some(anchor) = self.anchor.get().filter(|a| a.revision == revision) {
            return Ok(anchor);
        }
        let element = self
            .mesh
            .tetrahedra()
            .next()
            .ok_or(ConfigurationError::NoTetrahedra)?;
        let anchor = Anchor {
            revision,
            element,
            point: self.mesh.tetrahedron(element)?.centroid(),
        };
        debug!(element, revision, "selected mesh walk anchor");
        self.anchor.set(Some(anchor));
        Ok(anchor)
    }

    fn boundary_triangles(&self) -> Result<Rc<[Triangle]>> {
        let revision = self.mesh.revision();
        if let Some((built, triangles)) = self.boundary.borrow().as_ref() {
            if *built == revision {
                return Ok(Rc::clone(triangles));
            }
        }
        let triangles: Rc<[Triangle]> = self.mesh.boundary_triangles()?.into();
        *self.boundary.borrow_mut() = Some((revision, Rc::clone(&triangles)));
        Ok(triangles)
    }

    /// Walks from `element`, which holds the point at `u0`, along
    /// `p0 -> p1` until the segment ends or leaves the mesh.
    fn walk(&self, element: usize, p0: &Point3, p1: &Point3, u0: f64) -> Result<Walk> {
        let delta = p1 - p0;
        let mut current = element;
        let mut previous = None;
        let mut u = u0;

        for _ in 0..self.config.max_iterations {
            self.steps.set(self.steps.get() + 1);
            let tet = self.mesh.tetrahedron(current)?;
            let from = point_at(p0, p1, u);

            let Some(crossing) = tet.first_normal(&from, p1)?.map(|c| c.rescaled(u)) else {
                if tet.contains_toward(&from, p1)? {
                    return Ok(Walk::Arrived(current));
                }
                current = match self.owner_near(current, &from, p1)? {
                    Some(owner) => owner,
                    None => return self.leave_through_boundary(current, &from, &delta, u),
                };
                previous = None;
                continue;
            };

            if !crossing.is_exit(&delta) {
                if crossing.u - u > self.config.step_epsilon {
                    current = match self.owner_near(current, &from, p1)? {
                        Some(owner) => owner,
                        None => return self.leave_through_boundary(current, &from, &delta, u),
                    };
                    previous = None;
                    continue;
                }
                // `from` sits on the outside of a face by round-off only.
                u = crossing.u + self.config.step_epsilon;
                if u >= 1.0 {
                    return Ok(Walk::Arrived(current));
                }
                continue;
            }

            let Some(next) = tet.next_element(&self.mesh)? else {
                return Ok(Walk::Left {
                    element: current,
                    crossing,
                });
            };
            if crossing.u >= 1.0 - self.config.arrival_epsilon {
                return Ok(Walk::Arrived(current));
            }

            if previous == Some(next) && crossing.u - u <= self.config.step_epsilon {
                let resume = crossing.u + self.config.step_epsilon;
                let sample = point_at(p0, p1, resume.min(1.0));
                current = match self.resolve_backtrack(current, next, &sample, p1)? {
                    Some(owner) => owner,
                    None => {
                        let at = point_at(p0, p1, crossing.u);
                        return self.leave_through_boundary(current, &at, &delta, crossing.u);
                    }
                };
                previous = None;
                u = resume;
                if u >= 1.0 {
                    return Ok(Walk::Arrived(current));
                }
                continue;
            }

            previous = Some(current);
            current = next;
            u = crossing.u;
        }

        Err(InternalConsistencyFault::IterationCap {
            algorithm: "mesh walk",
            cap: self.config.max_iterations,
        }
        .into())
    }

    /// Picks whichever of two elements the walk keeps bouncing between
    /// actually holds `sample`.
    fn resolve_backtrack(
        &self,
        a: usize,
        b: usize,
        sample: &Point3,
        toward: &Point3,
    ) -> Result<Option<usize>> {
        warn!(a, b, "mesh walk backtracking across a shared face");
        for candidate in [a, b] {
            if self.mesh.tetrahedron(candidate)?.contains_toward(sample, toward)? {
                return Ok(Some(candidate));
            }
        }
        self.owner_near(a, sample, toward)
    }

    /// Finds the element near `current` that holds `point` after round-off
    /// put the walk in the wrong element.
    fn owner_near(&self, current: usize, point: &Point3, toward: &Point3) -> Result<Option<usize>> {
        warn!(element = current, "mesh walk relocating after round-off");
        let adjacency = self.mesh.adjacency()?;
        for candidate in adjacency.extended_neighbors(current) {
            if self.mesh.tetrahedron(candidate)?.contains_toward(point, toward)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Ends a walk whose point no element claims. The point must lie on a
    /// mesh boundary face of `current` or an element touching it, with the
    /// segment moving out through that face.
    fn leave_through_boundary(
        &self,
        current: usize,
        point: &Point3,
        delta: &Vector3,
        u: f64,
    ) -> Result<Walk> {
        let slack = 2.0 * self.config.step_epsilon * delta.norm();
        let adjacency = self.mesh.adjacency()?;
        let candidates = std::iter::once(current).chain(adjacency.extended_neighbors(current));

        for candidate in candidates {
            let tet = self.mesh.tetrahedron(candidate)?;
            let planes = tet.polytope().planes();
            if planes.iter().any(|plane| plane.signed_distance(point) > slack) {
                continue;
            }
            for (face, plane) in planes.iter().enumerate() {
                if adjacency.neighbor(candidate, face).is_some()
                    || plane.normal().dot(delta) <= 0.0
                    || plane.signed_distance(point) < -slack
                {
                    continue;
                }
                debug!(element = candidate, face, u, "mesh walk left through a boundary edge");
                return Ok(Walk::Left {
                    element: candidate,
                    crossing: Crossing {
                        normal: *plane.normal(),
                        u,
                        tie: true,
                    },
                });
            }
        }

        Err(InternalConsistencyFault::LostElement { element: current }.into())
    }

    /// Authoritative owner of `target` among `element` and the elements
    /// touching it.
    fn settle(&self, element: usize, target: &Point3, dir: &Vector3) -> Result<Option<usize>> {
        let toward = target + dir;
        if self.mesh.tetrahedron(element)?.contains_toward(target, &toward)? {
            return Ok(Some(element));
        }
        let adjacency = self.mesh.adjacency()?;
        for candidate in adjacency.extended_neighbors(element) {
            if self.mesh.tetrahedron(candidate)?.contains_toward(target, &toward)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Nearest point at or after `start` where `p0 -> p1` enters the mesh
    /// through a boundary face.
    fn nearest_entry(
        &self,
        p0: &Point3,
        p1: &Point3,
        start: f64,
    ) -> Result<Option<(usize, Crossing)>> {
        if start >= 1.0 {
            return Ok(None);
        }
        let from = point_at(p0, p1, start);
        let adjacency = self.mesh.adjacency()?;
        let mut nearest: Option<(usize, Crossing)> = None;
        let mut checked = None;

        for triangle in self.boundary_triangles()?.iter() {
            let element = triangle.tetrahedron();
            if checked == Some(element) || !triangle.faces_point(&from) {
                continue;
            }
            checked = Some(element);

            let tet = self.mesh.tetrahedron(element)?;
            let Some(hit) = tet.polytope().clip(&from, p1) else {
                continue;
            };
            if !hit.entering || adjacency.neighbor(element, hit.plane).is_some() {
                continue;
            }
            let Some(plane) = tet.face_plane(hit.plane) else {
                continue;
            };
            let crossing = Crossing {
                normal: *plane.normal(),
                u: hit.u,
                tie: hit.tie,
            }
            .rescaled(start);
            if nearest.is_none_or(|(_, n)| crossing.u < n.u) {
                nearest = Some((element, crossing));
            }
        }
        Ok(nearest)
    }
}

impl Shape for MeshShape {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        self.steps.set(0);
        let found = self.locate(p0, &(p1 - p0))?;
        self.containing.set(found);
        Ok(found.is_some())
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        self.steps.set(0);
        let start = self.locate(p0, &(p1 - p0))?;
        self.containing.set(start);

        let crossing = match start {
            Some(element) => match self.walk(element, p0, p1, 0.0)? {
                Walk::Arrived(_) => None,
                Walk::Left { crossing, .. } => Some(crossing),
            },
            None => self.nearest_entry(p0, p1, 0.0)?.map(|(_, c)| c),
        };
        self.last.set(crossing);
        Ok(crossing)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.last.get()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::error::TraceError;
    use crate::mesh::{fixtures, Element, ElementKind};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn random_point(rng: &mut StdRng, lo: f64, hi: f64) -> Point3 {
        p(rng.gen_range(lo..hi), rng.gen_range(lo..hi), rng.gen_range(lo..hi))
    }

    #[test]
    fn start_on_shared_face_belongs_to_element_entered() {
        let shape = MeshShape::new(fixtures::kuhn_cube()).unwrap();
        // Centre of the face shared by elements 2 and 3 (the plane y = z).
        let p0 = p(1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0);
        let p1 = shape.mesh().tetrahedron(3).unwrap().centroid();
        assert!(shape.contains_toward(&p0, &p1).unwrap());
        assert_eq!(shape.containing_element(), Some(3));

        let back = shape.mesh().tetrahedron(2).unwrap().centroid();
        assert!(shape.contains_toward(&p0, &back).unwrap());
        assert_eq!(shape.containing_element(), Some(2));
    }

    #[test]
    fn walk_agrees_with_brute_force_scan() {
        let shape = MeshShape::new(fixtures::cube_grid(5, 1.0)).unwrap();
        assert_eq!(shape.mesh().tetrahedra().count(), 750);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..400 {
            let target = random_point(&mut rng, -0.3, 1.3);
            let expected = shape
                .mesh()
                .brute_force_locate(&target, &Vector3::zeros())
                .unwrap();
            assert_eq!(shape.contains(&target).unwrap(), expected.is_some());
            assert_eq!(shape.containing_element(), expected);
        }
    }

    #[test]
    fn walk_visits_a_fraction_of_the_mesh() {
        let shape = MeshShape::new(fixtures::cube_grid(5, 1.0)).unwrap();
        assert!(shape.contains(&p(0.95, 0.93, 0.91)).unwrap());
        assert!(shape.last_walk_steps() > 1);
        assert!(shape.last_walk_steps() < 100);
    }

    #[test]
    fn crossings_from_element_centres_agree_with_brute_force() {
        let shape = MeshShape::new(fixtures::cube_grid(4, 1.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(23);
        let count = shape.mesh().elements().len();
        for _ in 0..200 {
            let start = rng.gen_range(0..count);
            let p0 = shape.mesh().tetrahedron(start).unwrap().centroid();
            let p1 = random_point(&mut rng, -0.5, 1.5);
            let inside = shape
                .mesh()
                .brute_force_locate(&p1, &Vector3::zeros())
                .unwrap()
                .is_some();

            match shape.first_normal(&p0, &p1).unwrap() {
                Some(c) => {
                    assert!(!inside);
                    assert!(c.is_exit(&(p1 - p0)));
                    let hit = c.point(&p0, &p1);
                    let reach = (hit - p(0.5, 0.5, 0.5)).amax();
                    assert_relative_eq!(reach, 0.5, epsilon = 1e-9);
                }
                None => assert!(inside),
            }
            assert_eq!(shape.containing_element(), Some(start));
        }
    }

    #[test]
    fn exit_through_a_boundary_face_diagonal() {
        let shape = MeshShape::new(fixtures::cube_grid(4, 1.0)).unwrap();
        let p0 = p(0.375, 0.1875, 0.0625);
        let p1 = p(0.125, 1.3125, 0.9375);

        let c = shape.first_normal(&p0, &p1).unwrap().unwrap();
        assert!(c.is_exit(&(p1 - p0)));
        assert_relative_eq!(c.u, 13.0 / 18.0, epsilon = 1e-9);
        assert_relative_eq!(c.normal, Vector3::y(), epsilon = 1e-9);
    }

    #[test]
    fn exit_through_a_boundary_edge() {
        let shape = MeshShape::new(fixtures::cube_grid(2, 1.0)).unwrap();
        let p0 = p(0.6, 0.4, 0.3);
        let p1 = p(1.4, 1.6, 0.5);

        let c = shape.first_normal(&p0, &p1).unwrap().unwrap();
        assert!(c.is_exit(&(p1 - p0)));
        assert_relative_eq!(c.u, 0.5, epsilon = 1e-9);
        assert_relative_eq!(c.normal.z, 0.0, epsilon = 1e-9);
        assert!(c.normal.x > 0.99 || c.normal.y > 0.99, "{}", c.normal);
    }

    #[test]
    fn walk_through_an_interior_vertex() {
        let shape = MeshShape::new(fixtures::cube_grid(2, 1.0)).unwrap();
        // Passes the node at the centre of the grid at u = 0.25.
        let p0 = p(0.2, 0.3, 0.45);
        let p1 = p(1.4, 1.1, 0.65);

        let c = shape.first_normal(&p0, &p1).unwrap().unwrap();
        assert_relative_eq!(c.u, 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(c.normal, Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn walk_along_shared_faces_through_an_interior_edge() {
        let shape = MeshShape::new(fixtures::cube_grid(2, 1.0)).unwrap();
        // Stays on the plane x = y and crosses the edge x = y = 0.5.
        let p0 = p(0.2, 0.2, 0.3);
        let p1 = p(0.8, 0.8, 0.3);

        assert!(shape.first_normal(&p0, &p1).unwrap().is_none());
        assert!(shape.containing_element().is_some());
        assert!(shape.contains_toward(&p1, &p(1.0, 1.0, 0.3)).unwrap());
    }

    #[test]
    fn lattice_crossings_agree_with_brute_force() {
        let shape = MeshShape::new(fixtures::cube_grid(4, 1.0)).unwrap();
        let coords = [-0.25, 0.3, 0.6, 1.25];
        let count = shape.mesh().elements().len();

        for start in (0..count).step_by(29) {
            let p0 = shape.mesh().tetrahedron(start).unwrap().centroid();
            for &x in &coords {
                for &y in &coords {
                    for &z in &coords {
                        let p1 = p(x, y, z);
                        let inside = shape
                            .mesh()
                            .brute_force_locate(&p1, &(p1 - p0))
                            .unwrap()
                            .is_some();

                        match shape.first_normal(&p0, &p1).unwrap() {
                            Some(c) => {
                                assert!(!inside, "{p0} -> {p1}");
                                assert!(c.is_exit(&(p1 - p0)), "{p0} -> {p1}");
                                let reach = (c.point(&p0, &p1) - p(0.5, 0.5, 0.5)).amax();
                                assert_relative_eq!(reach, 0.5, epsilon = 1e-9);
                            }
                            None => assert!(inside, "{p0} -> {p1}"),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn repeated_queries_are_bit_identical() {
        let shape = MeshShape::new(fixtures::cube_grid(3, 1.0)).unwrap();
        let p0 = p(0.21, 0.37, 0.52);
        let p1 = p(1.4, -0.2, 0.9);
        let first = shape.first_normal(&p0, &p1).unwrap();
        assert!(first.is_some());
        for _ in 0..5 {
            assert_eq!(shape.first_normal(&p0, &p1).unwrap(), first);
        }
        assert_eq!(shape.last_crossing(), first);
    }

    #[test]
    fn disconnected_components_are_reached_through_the_gap() {
        let shape = MeshShape::new(fixtures::separated_cubes()).unwrap();
        assert!(shape.contains(&p(2.5, 0.4, 0.3)).unwrap());
        assert!(shape.containing_element().unwrap() >= 6);
        assert!(!shape.contains(&p(1.5, 0.5, 0.3)).unwrap());
        assert!(!shape.contains(&p(3.5, 0.5, 0.3)).unwrap());

        let exit = shape
            .first_normal(&p(0.4, 0.6, 0.3), &p(2.4, 0.6, 0.3))
            .unwrap()
            .unwrap();
        assert_relative_eq!(exit.u, 0.3, epsilon = 1e-12);
        assert_relative_eq!(exit.normal, Vector3::x());

        let entry = shape
            .first_normal(&p(1.5, 0.6, 0.3), &p(2.5, 0.6, 0.3))
            .unwrap()
            .unwrap();
        assert_relative_eq!(entry.u, 0.5, epsilon = 1e-12);
        assert_relative_eq!(entry.normal, -Vector3::x());
        assert_eq!(shape.containing_element(), None);
    }

    #[test]
    fn miss_from_outside_has_no_crossing() {
        let shape = MeshShape::new(fixtures::kuhn_cube()).unwrap();
        let c = shape
            .first_normal(&p(-1.0, 2.0, 0.5), &p(2.0, 2.0, 0.5))
            .unwrap();
        assert!(c.is_none());
    }

    #[test]
    fn anchor_follows_mesh_revision() {
        let mut shape = MeshShape::new(fixtures::kuhn_cube()).unwrap();
        assert!(shape.contains(&p(0.5, 0.2, 0.1)).unwrap());

        let mesh = shape.mesh_mut();
        for i in 0..mesh.nodes().len() {
            let moved = mesh.nodes()[i] + Vector3::new(10.0, 0.0, 0.0);
            mesh.set_node(i, moved).unwrap();
        }
        mesh.update_geom();

        assert!(!shape.contains(&p(0.5, 0.2, 0.1)).unwrap());
        assert!(shape.contains(&p(10.5, 0.2, 0.1)).unwrap());
        assert_eq!(shape.anchor_element().unwrap(), 0);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let config = EngineConfig::default().with_max_iterations(2);
        let shape = MeshShape::with_config(fixtures::cube_grid(3, 1.0), config).unwrap();
        assert!(matches!(
            shape.contains(&p(0.9, 0.8, 0.85)),
            Err(TraceError::Consistency(InternalConsistencyFault::IterationCap { .. }))
        ));
    }

    #[test]
    fn mesh_without_volume_elements_is_rejected() {
        let mesh = Mesh::new(
            vec![Point3::origin()],
            vec![Element::new(ElementKind::Point, vec![1], vec![0])],
        )
        .unwrap();
        assert!(matches!(
            MeshShape::new(mesh),
            Err(TraceError::Configuration(ConfigurationError::NoTetrahedra))
        ));
    }
}

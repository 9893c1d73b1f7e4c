//! Shapes answering point-containment and first-boundary-crossing queries
//! for line segments.

pub mod height_map;
mod polytope;
mod sphere;
mod union;
mod union_n;

pub use height_map::{GridLayout, HeightMap};
pub use polytope::{PlaneHit, Polytope};
pub use sphere::Sphere;
pub use union::Union2;
pub use union_n::UnionN;

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::mesh::{MeshShape, Tetrahedron};

/// A boundary crossing along the segment `p0 + u * (p1 - p0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Unit outward normal of the shape at the crossing.
    pub normal: Vector3,
    /// Segment parameter of the crossing. Normally in `(0, 1]`; some shapes
    /// also report crossings past the end of the segment.
    pub u: f64,
    /// The crossing lies exactly on more than one boundary (edge, vertex or
    /// simultaneous surfaces). Callers needing an owner re-query with the
    /// original endpoints.
    pub tie: bool,
}

impl Crossing {
    /// Returns the crossing point on the segment `p0 -> p1`.
    #[must_use]
    pub fn point(&self, p0: &Point3, p1: &Point3) -> Point3 {
        p0 + (p1 - p0) * self.u
    }

    /// Whether motion along `delta` leaves the shape at this crossing.
    #[must_use]
    pub fn is_exit(&self, delta: &Vector3) -> bool {
        self.normal.dot(delta) > 0.0
    }

    /// Whether the crossing lies within the segment.
    #[must_use]
    pub fn within_segment(&self) -> bool {
        self.u <= 1.0
    }

    /// Maps a parameter measured on the sub-segment starting at global
    /// parameter `start` back to the full segment.
    #[must_use]
    pub(crate) fn rescaled(self, start: f64) -> Self {
        Self {
            u: start + self.u * (1.0 - start),
            ..self
        }
    }
}

/// Capability shared by every geometric variant.
///
/// Identical inputs always yield identical outputs. The cached last
/// crossing is for diagnostics only and never influences later queries.
pub trait Shape {
    /// Tests whether `p` is inside.
    ///
    /// A point exactly on the boundary is resolved by the fixed
    /// lexicographic rule of [`crate::math::tie_break_inside`].
    ///
    /// # Errors
    ///
    /// Returns an error if an iterative algorithm fails to terminate.
    fn contains(&self, p: &Point3) -> Result<bool> {
        self.contains_toward(p, p)
    }

    /// Tests whether `p0` is inside. `p1` only disambiguates a `p0` lying
    /// exactly on a boundary: the point belongs to the side the segment
    /// moves into.
    ///
    /// # Errors
    ///
    /// Returns an error if an iterative algorithm fails to terminate.
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool>;

    /// Finds the nearest boundary crossing of the segment `p0 -> p1`.
    ///
    /// Returns `None` when the segment has no crossing.
    ///
    /// # Errors
    ///
    /// Returns an error if an iterative algorithm exceeds its iteration cap
    /// or fails to make progress.
    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>>;

    /// Returns the result of the most recent [`Shape::first_normal`] call.
    fn last_crossing(&self) -> Option<Crossing>;
}

/// The closed set of shape variants.
#[derive(Debug, Clone)]
pub enum AnyShape {
    Polytope(Polytope),
    Sphere(Sphere),
    Union2(Box<Union2>),
    UnionN(UnionN),
    HeightMap(HeightMap),
    Tetrahedron(Tetrahedron),
    Mesh(Box<MeshShape>),
}

impl Shape for AnyShape {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        match self {
            Self::Polytope(s) => s.contains_toward(p0, p1),
            Self::Sphere(s) => s.contains_toward(p0, p1),
            Self::Union2(s) => s.contains_toward(p0, p1),
            Self::UnionN(s) => s.contains_toward(p0, p1),
            Self::HeightMap(s) => s.contains_toward(p0, p1),
            Self::Tetrahedron(s) => s.contains_toward(p0, p1),
            Self::Mesh(s) => s.contains_toward(p0, p1),
        }
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        match self {
            Self::Polytope(s) => s.first_normal(p0, p1),
            Self::Sphere(s) => s.first_normal(p0, p1),
            Self::Union2(s) => s.first_normal(p0, p1),
            Self::UnionN(s) => s.first_normal(p0, p1),
            Self::HeightMap(s) => s.first_normal(p0, p1),
            Self::Tetrahedron(s) => s.first_normal(p0, p1),
            Self::Mesh(s) => s.first_normal(p0, p1),
        }
    }

    fn last_crossing(&self) -> Option<Crossing> {
        match self {
            Self::Polytope(s) => s.last_crossing(),
            Self::Sphere(s) => s.last_crossing(),
            Self::Union2(s) => s.last_crossing(),
            Self::UnionN(s) => s.last_crossing(),
            Self::HeightMap(s) => s.last_crossing(),
            Self::Tetrahedron(s) => s.last_crossing(),
            Self::Mesh(s) => s.last_crossing(),
        }
    }
}

impl From<Polytope> for AnyShape {
    fn from(shape: Polytope) -> Self {
        Self::Polytope(shape)
    }
}

impl From<Sphere> for AnyShape {
    fn from(shape: Sphere) -> Self {
        Self::Sphere(shape)
    }
}

impl From<Union2> for AnyShape {
    fn from(shape: Union2) -> Self {
        Self::Union2(Box::new(shape))
    }
}

impl From<UnionN> for AnyShape {
    fn from(shape: UnionN) -> Self {
        Self::UnionN(shape)
    }
}

impl From<HeightMap> for AnyShape {
    fn from(shape: HeightMap) -> Self {
        Self::HeightMap(shape)
    }
}

impl From<Tetrahedron> for AnyShape {
    fn from(shape: Tetrahedron) -> Self {
        Self::Tetrahedron(shape)
    }
}

impl From<MeshShape> for AnyShape {
    fn from(shape: MeshShape) -> Self {
        Self::Mesh(Box::new(shape))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rescaled_maps_sub_segment_parameter() {
        let c = Crossing {
            normal: Vector3::z(),
            u: 0.5,
            tie: false,
        };
        assert_relative_eq!(c.rescaled(0.5).u, 0.75);
        assert_relative_eq!(c.rescaled(0.0).u, 0.5);
    }

    #[test]
    fn exit_direction_follows_normal() {
        let c = Crossing {
            normal: Vector3::z(),
            u: 1.0,
            tie: false,
        };
        assert!(c.is_exit(&Vector3::new(0.0, 1.0, 1.0)));
        assert!(!c.is_exit(&Vector3::new(0.0, 1.0, -1.0)));
        assert!(c.within_segment());
    }
}

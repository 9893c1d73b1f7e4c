use std::cell::Cell;

use crate::error::Result;
use crate::math::intersect_3d::{
    classify_point_plane, segment_plane_intersect, PointPlaneClassification, SegmentPlaneRelation,
};
use crate::math::{HalfSpace, Point3, Vector3};

use super::{Crossing, Shape};

/// A convex polytope: the intersection of a list of half-spaces.
///
/// The polytope may be unbounded. Half-space order is significant only for
/// reporting which plane was hit (see [`Polytope::clip`]).
#[derive(Debug, Clone)]
pub struct Polytope {
    planes: Vec<HalfSpace>,
    last: Cell<Option<Crossing>>,
}

/// The winning plane of a segment clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneHit {
    /// Index of the plane in the polytope's half-space list.
    pub plane: usize,
    /// Segment parameter of the crossing.
    pub u: f64,
    /// Another plane bounds the interval at exactly the same `u`
    /// (the hit is on an edge or vertex).
    pub tie: bool,
    /// `true` for an outside-to-inside transition.
    pub entering: bool,
}

impl Polytope {
    /// Creates a polytope from already-normalised half-spaces.
    #[must_use]
    pub fn new(planes: Vec<HalfSpace>) -> Self {
        Self {
            planes,
            last: Cell::new(None),
        }
    }

    /// Creates a polytope from `(outward normal, point on plane)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if any normal has zero length.
    pub fn from_planes(planes: &[(Vector3, Point3)]) -> Result<Self> {
        let planes = planes
            .iter()
            .map(|(normal, point)| HalfSpace::through_point(*normal, point))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(planes))
    }

    /// Creates the single half-space bounded by the plane through `point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal has zero length.
    pub fn half_space(normal: Vector3, point: &Point3) -> Result<Self> {
        Ok(Self::new(vec![HalfSpace::through_point(normal, point)?]))
    }

    /// Creates an axis-aligned box spanning `min` to `max`.
    ///
    /// # Errors
    ///
    /// Returns an error if a bounding plane cannot be built.
    pub fn axis_box(min: &Point3, max: &Point3) -> Result<Self> {
        Self::from_planes(&[
            (-Vector3::x(), *min),
            (Vector3::x(), *max),
            (-Vector3::y(), *min),
            (Vector3::y(), *max),
            (-Vector3::z(), *min),
            (Vector3::z(), *max),
        ])
    }

    /// Returns the bounding half-spaces.
    #[must_use]
    pub fn planes(&self) -> &[HalfSpace] {
        &self.planes
    }

    /// Returns the half-space at `index`.
    #[must_use]
    pub fn plane(&self, index: usize) -> Option<&HalfSpace> {
        self.planes.get(index)
    }

    pub(crate) fn planes_mut(&mut self) -> &mut [HalfSpace] {
        self.last.set(None);
        &mut self.planes
    }

    /// Clips the segment `p0 -> p1` against every half-space.
    ///
    /// Returns the nearest boundary transition in `(0, 1]`: the entry at
    /// `umin` if the segment starts outside, otherwise the exit at `umax`.
    /// Returns `None` if the segment misses the polytope, merely grazes it,
    /// or never leaves it.
    #[must_use]
    pub fn clip(&self, p0: &Point3, p1: &Point3) -> Option<PlaneHit> {
        let delta = p1 - p0;
        let mut umin = f64::NEG_INFINITY;
        let mut umax = f64::INFINITY;
        let mut imin = None;
        let mut imax = None;
        let mut tie_min = false;
        let mut tie_max = false;

        for (i, half_space) in self.planes.iter().enumerate() {
            match segment_plane_intersect(p0, &delta, half_space) {
                SegmentPlaneRelation::Parallel { inside } => {
                    if !inside {
                        return None;
                    }
                }
                SegmentPlaneRelation::Crossing { u, exiting: true } => {
                    if u < umax {
                        umax = u;
                        imax = Some(i);
                        tie_max = false;
                    } else if u == umax {
                        tie_max = true;
                    }
                    if umax <= 0.0 {
                        return None;
                    }
                }
                SegmentPlaneRelation::Crossing { u, exiting: false } => {
                    if u > umin {
                        umin = u;
                        imin = Some(i);
                        tie_min = false;
                    } else if u == umin {
                        tie_min = true;
                    }
                    if umin > 1.0 {
                        return None;
                    }
                }
            }
            if umin >= umax {
                return None;
            }
        }

        if umin > 0.0 {
            imin.map(|plane| PlaneHit {
                plane,
                u: umin,
                tie: tie_min,
                entering: true,
            })
        } else if umax <= 1.0 {
            imax.map(|plane| PlaneHit {
                plane,
                u: umax,
                tie: tie_max,
                entering: false,
            })
        } else {
            None
        }
    }

    fn crossing_for(&self, hit: PlaneHit) -> Crossing {
        Crossing {
            normal: *self.planes[hit.plane].normal(),
            u: hit.u,
            tie: hit.tie,
        }
    }
}

impl Shape for Polytope {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        let delta = p1 - p0;
        for half_space in &self.planes {
            match classify_point_plane(p0, half_space) {
                PointPlaneClassification::Back => {}
                PointPlaneClassification::Front => return Ok(false),
                PointPlaneClassification::On => {
                    if !half_space.contains_toward(p0, &delta) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let crossing = self.clip(p0, p1).map(|hit| self.crossing_for(hit));
        self.last.set(crossing);
        Ok(crossing)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.last.get()
    }
}

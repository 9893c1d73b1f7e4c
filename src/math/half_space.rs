use crate::error::{ConfigurationError, Result};

use super::{Point3, Vector3, TOLERANCE};

/// A closed half-space `{ p : normal · p <= offset }`.
///
/// The normal is stored at unit length and points out of the half-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfSpace {
    normal: Vector3,
    offset: f64,
}

impl HalfSpace {
    /// Creates a half-space from an outward normal and an offset.
    ///
    /// The normal is normalised and the offset scaled to match.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DegenerateHalfSpace`] if the normal has
    /// zero length.
    pub fn new(normal: Vector3, offset: f64) -> Result<Self> {
        let len = normal.norm();
        if len < TOLERANCE || !len.is_finite() {
            return Err(ConfigurationError::DegenerateHalfSpace.into());
        }
        Ok(Self {
            normal: normal / len,
            offset: offset / len,
        })
    }

    /// Creates the half-space bounded by the plane through `point` whose
    /// outward normal is `normal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal has zero length.
    pub fn through_point(normal: Vector3, point: &Point3) -> Result<Self> {
        let offset = normal.dot(&point.coords);
        Self::new(normal, offset)
    }

    /// Returns the unit outward normal.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Returns the plane offset along the normal.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance of `point` from the bounding plane; negative inside.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Returns the same plane with the inside and outside swapped.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Tests whether `point` is inside, resolving points exactly on the
    /// plane with the direction of travel `delta`.
    #[must_use]
    pub fn contains_toward(&self, point: &Point3, delta: &Vector3) -> bool {
        let d = self.signed_distance(point);
        if d < 0.0 {
            true
        } else if d > 0.0 {
            false
        } else {
            tie_break_inside(&self.normal, delta)
        }
    }
}

/// Classifies a point lying exactly on a boundary with outward normal
/// `normal` for a trajectory moving along `delta`.
///
/// Moving outward means outside, moving inward means inside. A trajectory
/// in the plane falls back to the sign of the normal's first non-zero
/// component (negative means inside), so two shapes sharing the plane with
/// opposite normals never both claim the point.
#[must_use]
pub fn tie_break_inside(normal: &Vector3, delta: &Vector3) -> bool {
    let d = delta.dot(normal);
    if d > 0.0 {
        false
    } else if d < 0.0 {
        true
    } else {
        normal
            .iter()
            .find(|c| **c != 0.0)
            .is_some_and(|c| *c < 0.0)
    }
}

use std::cell::Cell;

use crate::error::{ConfigurationError, Result};
use crate::math::{tie_break_inside, Point3, Vector3};

use super::{Crossing, Shape};

/// A solid ball.
///
/// Crossings beyond the end of the segment are still reported (with
/// `u > 1`) so that combinators can reuse them.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Point3,
    radius: f64,
    last: Cell<Option<Crossing>>,
}

impl Sphere {
    /// Creates a new sphere.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is not a positive finite number.
    pub fn new(center: Point3, radius: f64) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(ConfigurationError::InvalidRadius(radius).into());
        }
        Ok(Self {
            center,
            radius,
            last: Cell::new(None),
        })
    }

    /// Returns the center of the sphere.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub(crate) fn set_center(&mut self, center: Point3) {
        self.last.set(None);
        self.center = center;
    }

    pub(crate) fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    fn outward_normal(&self, point: &Point3) -> Vector3 {
        (point - self.center) / self.radius
    }

    fn crossing_at(&self, p0: &Point3, delta: &Vector3, u: f64) -> Crossing {
        let point = p0 + delta * u;
        Crossing {
            normal: self.outward_normal(&point),
            u,
            tie: false,
        }
    }
}

impl Shape for Sphere {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        let offset = p0 - self.center;
        let excess = offset.norm_squared() - self.radius * self.radius;
        Ok(if excess < 0.0 {
            true
        } else if excess > 0.0 {
            false
        } else {
            tie_break_inside(&offset, &(p1 - p0))
        })
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let delta = p1 - p0;
        let offset = p0 - self.center;

        // |offset + u * delta|^2 = r^2
        let a = delta.norm_squared();
        let b = offset.dot(&delta);
        let c = offset.norm_squared() - self.radius * self.radius;
        let disc = b * b - a * c;

        let crossing = if a == 0.0 || disc <= 0.0 {
            // Missed, or a tangent graze that leaves containment unchanged.
            None
        } else {
            let root = disc.sqrt();
            let u_in = (-b - root) / a;
            let u_out = (-b + root) / a;
            if u_in > 0.0 {
                Some(self.crossing_at(p0, &delta, u_in))
            } else if u_out > 0.0 {
                Some(self.crossing_at(p0, &delta, u_out))
            } else {
                None
            }
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

    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unit_sphere() -> Sphere {
        Sphere::new(Point3::origin(), 1.0).unwrap()
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        assert!(Sphere::new(Point3::origin(), 0.0).is_err());
        assert!(Sphere::new(Point3::origin(), f64::NAN).is_err());
    }

    #[test]
    fn entry_from_outside() {
        let c = unit_sphere()
            .first_normal(&p(-2.0, 0.0, 0.0), &p(2.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_relative_eq!(c.u, 0.25);
        assert_relative_eq!(c.normal, -Vector3::x());
    }

    #[test]
    fn exit_from_inside() {
        let c = unit_sphere()
            .first_normal(&p(0.0, 0.0, 0.0), &p(0.0, 0.0, 4.0))
            .unwrap()
            .unwrap();
        assert_relative_eq!(c.u, 0.25);
        assert_relative_eq!(c.normal, Vector3::z());
    }

    #[test]
    fn crossing_beyond_segment_keeps_its_parameter() {
        let c = unit_sphere()
            .first_normal(&p(-3.0, 0.0, 0.0), &p(-2.5, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_relative_eq!(c.u, 4.0);
    }

    #[test]
    fn tangent_graze_is_not_a_crossing() {
        let c = unit_sphere()
            .first_normal(&p(-2.0, 1.0, 0.0), &p(2.0, 1.0, 0.0))
            .unwrap();
        assert!(c.is_none());
    }

    #[test]
    fn surface_point_follows_direction() {
        let s = unit_sphere();
        let on = p(1.0, 0.0, 0.0);
        assert!(s.contains_toward(&on, &p(0.0, 0.0, 0.0)).unwrap());
        assert!(!s.contains_toward(&on, &p(2.0, 0.0, 0.0)).unwrap());
        assert!(s.first_normal(&on, &p(2.0, 0.0, 0.0)).unwrap().is_none());
    }
}

use std::cell::Cell;

use crate::config::EngineConfig;
use crate::error::{InternalConsistencyFault, Result};
use crate::math::{point_at, Point3, Vector3};

use super::{AnyShape, Crossing, Shape};

/// Union of two shapes.
///
/// Crossings are found by stepping through both members' boundaries in
/// order of `u` while tracking how many members contain the advancing
/// point. Only transitions to or from depth zero are union boundaries.
#[derive(Debug, Clone)]
pub struct Union2 {
    a: AnyShape,
    b: AnyShape,
    config: EngineConfig,
    last: Cell<Option<Crossing>>,
}

impl Union2 {
    /// Creates the union of `a` and `b` with default tolerances.
    #[must_use]
    pub fn new(a: impl Into<AnyShape>, b: impl Into<AnyShape>) -> Self {
        Self::with_config(a, b, EngineConfig::default())
    }

    /// Creates the union of `a` and `b` with explicit tolerances.
    #[must_use]
    pub fn with_config(a: impl Into<AnyShape>, b: impl Into<AnyShape>, config: EngineConfig) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            config,
            last: Cell::new(None),
        }
    }

    /// Returns the two members.
    #[must_use]
    pub fn members(&self) -> (&AnyShape, &AnyShape) {
        (&self.a, &self.b)
    }

    pub(crate) fn members_mut(&mut self) -> (&mut AnyShape, &mut AnyShape) {
        (&mut self.a, &mut self.b)
    }

    /// Re-queries `shape` for its next crossing just past global parameter `u`.
    fn requery(
        &self,
        shape: &AnyShape,
        p0: &Point3,
        p1: &Point3,
        u: f64,
    ) -> Result<Option<Crossing>> {
        let start = u + self.config.step_epsilon;
        if start >= 1.0 {
            return Ok(None);
        }
        let from = point_at(p0, p1, start);
        let next = shape.first_normal(&from, p1)?.map(|c| c.rescaled(start));
        if let Some(c) = next {
            if c.u <= u {
                return Err(InternalConsistencyFault::NoProgress {
                    algorithm: "binary union",
                    u,
                }
                .into());
            }
        }
        Ok(next)
    }

    fn step(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let delta = p1 - p0;
        let mut next_a = self.a.first_normal(p0, p1)?;
        let mut next_b = self.b.first_normal(p0, p1)?;
        let mut in_a = starts_inside(&self.a, next_a, p0, p1, &delta)?;
        let mut in_b = starts_inside(&self.b, next_b, p0, p1, &delta)?;

        for _ in 0..self.config.max_iterations {
            let ua = segment_u(next_a);
            let ub = segment_u(next_b);

            // A member holding the point through the end of the segment
            // keeps the union occupied.
            if (in_a && ua > 1.0) || (in_b && ub > 1.0) || (ua > 1.0 && ub > 1.0) {
                return Ok(None);
            }

            let depth = u8::from(in_a) + u8::from(in_b);

            match (next_a, next_b) {
                (Some(ca), Some(cb)) if ua == ub => {
                    let after_a = inside_after(&ca, &delta, in_a);
                    let after_b = inside_after(&cb, &delta, in_b);
                    let after = u8::from(after_a) + u8::from(after_b);
                    if depth == 0 || after == 0 {
                        let normal = (ca.normal + cb.normal)
                            .try_normalize(0.0)
                            .unwrap_or(ca.normal);
                        return Ok(Some(Crossing {
                            normal,
                            u: ua,
                            tie: true,
                        }));
                    }
                    in_a = after_a;
                    in_b = after_b;
                    next_a = self.requery(&self.a, p0, p1, ua)?;
                    next_b = self.requery(&self.b, p0, p1, ub)?;
                }
                (Some(ca), _) if ua < ub => {
                    in_a = inside_after(&ca, &delta, in_a);
                    if depth == 0 || u8::from(in_a) + u8::from(in_b) == 0 {
                        return Ok(Some(ca));
                    }
                    next_a = self.requery(&self.a, p0, p1, ua)?;
                }
                (_, Some(cb)) => {
                    in_b = inside_after(&cb, &delta, in_b);
                    if depth == 0 || u8::from(in_a) + u8::from(in_b) == 0 {
                        return Ok(Some(cb));
                    }
                    next_b = self.requery(&self.b, p0, p1, ub)?;
                }
                _ => return Ok(None),
            }
        }

        Err(InternalConsistencyFault::IterationCap {
            algorithm: "binary union",
            cap: self.config.max_iterations,
        }
        .into())
    }
}

/// Parameter of a crossing inside the segment, or infinity.
fn segment_u(crossing: Option<Crossing>) -> f64 {
    match crossing {
        Some(c) if c.within_segment() => c.u,
        _ => f64::INFINITY,
    }
}

/// Infers whether `p0` is inside a member from the direction of its first
/// crossing, falling back to a direct containment test.
fn starts_inside(
    shape: &AnyShape,
    first: Option<Crossing>,
    p0: &Point3,
    p1: &Point3,
    delta: &Vector3,
) -> Result<bool> {
    if let Some(c) = first.filter(Crossing::within_segment) {
        let d = c.normal.dot(delta);
        if d != 0.0 {
            return Ok(d > 0.0);
        }
    }
    shape.contains_toward(p0, p1)
}

fn inside_after(crossing: &Crossing, delta: &Vector3, was_inside: bool) -> bool {
    let d = crossing.normal.dot(delta);
    if d == 0.0 {
        !was_inside
    } else {
        d < 0.0
    }
}

impl Shape for Union2 {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        Ok(self.a.contains_toward(p0, p1)? || self.b.contains_toward(p0, p1)?)
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let crossing = self.step(p0, p1)?;
        self.last.set(crossing);
        Ok(crossing)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.last.get()
    }
}

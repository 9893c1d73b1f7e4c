use std::cell::Cell;

use crate::config::EngineConfig;
use crate::error::{InternalConsistencyFault, Result};
use crate::math::{point_at, Point3};

use super::{AnyShape, Crossing, Shape};

/// Union of any number of shapes.
///
/// Simpler and asymptotically slower than nesting [`super::Union2`], but
/// needs no tree: from inside, it repeatedly jumps to the farthest exit of
/// every member holding the current point until no member holds it.
#[derive(Debug, Clone)]
pub struct UnionN {
    members: Vec<AnyShape>,
    config: EngineConfig,
    last: Cell<Option<Crossing>>,
}

impl UnionN {
    /// Creates the union of `members` with default tolerances.
    #[must_use]
    pub fn new(members: Vec<AnyShape>) -> Self {
        Self::with_config(members, EngineConfig::default())
    }

    /// Creates the union of `members` with explicit tolerances.
    #[must_use]
    pub fn with_config(members: Vec<AnyShape>, config: EngineConfig) -> Self {
        Self {
            members,
            config,
            last: Cell::new(None),
        }
    }

    /// Adds a member.
    pub fn push(&mut self, member: impl Into<AnyShape>) {
        self.members.push(member.into());
    }

    /// Returns the members.
    #[must_use]
    pub fn members(&self) -> &[AnyShape] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut [AnyShape] {
        &mut self.members
    }

    fn any_contains(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        for member in &self.members {
            if member.contains_toward(p0, p1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn nearest_entry(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let mut nearest: Option<Crossing> = None;
        for member in &self.members {
            if let Some(c) = member.first_normal(p0, p1)? {
                if nearest.is_none_or(|n| c.u < n.u) {
                    nearest = Some(c);
                }
            }
        }
        Ok(nearest)
    }

    fn exit(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let mut u = 0.0;
        for _ in 0..self.config.max_iterations {
            let from = point_at(p0, p1, u);
            let mut farthest: Option<Crossing> = None;

            for member in &self.members {
                if !member.contains_toward(&from, p1)? {
                    continue;
                }
                let Some(c) = member.first_normal(&from, p1)?.map(|c| c.rescaled(u)) else {
                    return Ok(None);
                };
                if !c.within_segment() {
                    return Ok(None);
                }
                // Strict comparison: on an exact tie the member checked
                // first keeps the crossing.
                if farthest.is_none_or(|f| c.u > f.u) {
                    farthest = Some(c);
                }
            }

            let Some(exit) = farthest else {
                return Err(InternalConsistencyFault::NoProgress {
                    algorithm: "n-ary union",
                    u,
                }
                .into());
            };
            if exit.u <= u {
                return Err(InternalConsistencyFault::NoProgress {
                    algorithm: "n-ary union",
                    u,
                }
                .into());
            }

            let beyond = exit.u + self.config.step_epsilon;
            let sample = point_at(p0, p1, beyond);
            if !self.any_contains(&sample, p1)? {
                return Ok(Some(exit));
            }
            if beyond >= 1.0 {
                return Ok(None);
            }
            u = beyond;
        }

        Err(InternalConsistencyFault::IterationCap {
            algorithm: "n-ary union",
            cap: self.config.max_iterations,
        }
        .into())
    }
}

impl Shape for UnionN {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        self.any_contains(p0, p1)
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let crossing = if self.any_contains(p0, p1)? {
            self.exit(p0, p1)?
        } else {
            self.nearest_entry(p0, p1)?
        };
        self.last.set(crossing);
        Ok(crossing)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.last.get()
    }
}

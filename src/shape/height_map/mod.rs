//! Surface defined by heights sampled on a uniform grid.
//!
//! The solid is everything below the surface. Each grid cell owns a pair of
//! convex columns (below and above its planar facet) that are built on
//! first use and cached for the lifetime of the height map.

mod cell;
mod locate;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::DMatrix;
use tracing::trace;

pub use cell::{CellKey, CellKind, Side};

use crate::config::EngineConfig;
use crate::error::{ConfigurationError, InternalConsistencyFault, Result};
use crate::math::{point_at, Point3, Vector3};

use self::cell::{build_cell, cell_kind, CellPair};
use self::locate::{steps_for, Axis};
use super::{Crossing, Shape};

/// Arrangement of the sampled nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridLayout {
    /// At least two nodes along both axes.
    Full,
    /// A single row of nodes along x.
    Row,
    /// A single column of nodes along y.
    Column,
    /// A single node; the surface is a horizontal plane.
    Point,
}

/// A single-valued surface `z = h(x, y)` over a uniform grid.
///
/// `heights[(i, j)]` is the height at `(x0 + i * dx, y0 + j * dy)`. Between
/// nodes the surface is piecewise planar over triangles; beyond the sampled
/// extent the boundary profile continues to infinity.
#[derive(Debug, Clone)]
pub struct HeightMap {
    x: Axis,
    y: Axis,
    heights: DMatrix<f64>,
    config: EngineConfig,
    cells: RefCell<HashMap<CellKey, Rc<CellPair>>>,
    last: Cell<Option<Crossing>>,
    last_cell: Cell<Option<CellKey>>,
}

impl HeightMap {
    /// Creates a height map with default tolerances.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyGrid`] if `heights` has no samples
    /// and [`ConfigurationError::InvalidSpacing`] unless both spacings are
    /// positive and finite.
    pub fn new(x0: f64, y0: f64, dx: f64, dy: f64, heights: DMatrix<f64>) -> Result<Self> {
        Self::with_config(x0, y0, dx, dy, heights, EngineConfig::default())
    }

    /// Creates a height map with explicit tolerances.
    ///
    /// # Errors
    ///
    /// See [`HeightMap::new`].
    pub fn with_config(
        x0: f64,
        y0: f64,
        dx: f64,
        dy: f64,
        heights: DMatrix<f64>,
        config: EngineConfig,
    ) -> Result<Self> {
        if heights.is_empty() {
            return Err(ConfigurationError::EmptyGrid.into());
        }
        let valid = |d: f64| d.is_finite() && d > 0.0;
        if !valid(dx) || !valid(dy) {
            return Err(ConfigurationError::InvalidSpacing { dx, dy }.into());
        }

        Ok(Self {
            x: Axis {
                origin: x0,
                spacing: dx,
                count: heights.nrows(),
            },
            y: Axis {
                origin: y0,
                spacing: dy,
                count: heights.ncols(),
            },
            heights,
            config,
            cells: RefCell::new(HashMap::new()),
            last: Cell::new(None),
            last_cell: Cell::new(None),
        })
    }

    /// Returns the grid origin `(x0, y0)`.
    #[must_use]
    pub fn origin(&self) -> (f64, f64) {
        (self.x.origin, self.y.origin)
    }

    /// Returns the grid spacings `(dx, dy)`.
    #[must_use]
    pub fn spacing(&self) -> (f64, f64) {
        (self.x.spacing, self.y.spacing)
    }

    /// Returns the sampled heights.
    #[must_use]
    pub fn heights(&self) -> &DMatrix<f64> {
        &self.heights
    }

    /// Returns the arrangement of the sampled nodes.
    #[must_use]
    pub fn layout(&self) -> GridLayout {
        match (self.x.count > 1, self.y.count > 1) {
            (true, true) => GridLayout::Full,
            (true, false) => GridLayout::Row,
            (false, true) => GridLayout::Column,
            (false, false) => GridLayout::Point,
        }
    }

    /// Surface height at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell geometry cannot be built.
    pub fn height_at(&self, x: f64, y: f64) -> Result<f64> {
        let (key, sample) = self.locate(&Point3::new(x, y, 0.0), &Vector3::zeros());
        Ok(self.cell(key)?.height(sample.x, sample.y))
    }

    /// Returns the cell that owns `p` for a trajectory moving along `dir`.
    #[must_use]
    pub fn cell_at(&self, p: &Point3, dir: &Vector3) -> CellKey {
        self.locate(p, dir).0
    }

    /// Classifies a cell by its position relative to the sampled extent.
    #[must_use]
    pub fn cell_kind(&self, key: CellKey) -> CellKind {
        cell_kind(&self.x, &self.y, key.i, key.j)
    }

    /// Number of cells whose geometry has been built.
    #[must_use]
    pub fn cached_cell_count(&self) -> usize {
        self.cells.borrow().len()
    }

    /// Cell consulted last by [`Shape::first_normal`].
    #[must_use]
    pub fn last_cell(&self) -> Option<CellKey> {
        self.last_cell.get()
    }

    /// Drops every cached cell.
    pub fn clear_cache(&self) {
        self.cells.borrow_mut().clear();
    }

    /// Shifts the surface by `offset`.
    pub(crate) fn translate(&mut self, offset: &Vector3) {
        self.x.origin += offset.x;
        self.y.origin += offset.y;
        self.heights.add_scalar_mut(offset.z);
        self.clear_cache();
    }

    /// Finds the cell owning `p` and the point to query it with.
    ///
    /// Points on a grid line or on a cell diagonal are assigned to the
    /// neighbour `dir` moves into and nudged into its interior.
    fn locate(&self, p: &Point3, dir: &Vector3) -> (CellKey, Point3) {
        let tolerance = self.config.grid_tolerance;
        let nudge = self.config.grid_nudge;
        let (step_x, step_y) = steps_for(dir);
        let (i, px) = self.x.locate(p.x, step_x, tolerance, nudge);
        let (j, py) = self.y.locate(p.y, step_y, tolerance, nudge);

        if cell_kind(&self.x, &self.y, i, j) != CellKind::Interior {
            let key = CellKey {
                i,
                j,
                side: Side::Whole,
            };
            return (key, Point3::new(px, py, p.z));
        }

        let mut s = (px - self.x.node(i - 1)) / self.x.spacing;
        let mut t = (py - self.y.node(j - 1)) / self.y.spacing;
        let side = if (t - s).abs() <= tolerance {
            let across = dir.y / self.y.spacing - dir.x / self.x.spacing;
            if across > 0.0 {
                if t < 0.5 {
                    t += nudge;
                } else {
                    s -= nudge;
                }
                Side::Upper
            } else {
                if s < 0.5 {
                    s += nudge;
                } else {
                    t -= nudge;
                }
                Side::Lower
            }
        } else if t > s {
            Side::Upper
        } else {
            Side::Lower
        };

        let sample = Point3::new(
            self.x.node(i - 1) + s * self.x.spacing,
            self.y.node(j - 1) + t * self.y.spacing,
            p.z,
        );
        (CellKey { i, j, side }, sample)
    }

    fn cell(&self, key: CellKey) -> Result<Rc<CellPair>> {
        if let Some(pair) = self.cells.borrow().get(&key) {
            return Ok(Rc::clone(pair));
        }
        let pair = Rc::new(build_cell(key, &self.x, &self.y, &self.heights)?);
        trace!(i = key.i, j = key.j, side = ?key.side, "built height-map cell");
        self.cells.borrow_mut().insert(key, Rc::clone(&pair));
        Ok(pair)
    }

    /// Walks cell by cell along the segment until the surface is crossed.
    fn trace_segment(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let delta = p1 - p0;
        let mut u = 0.0;
        // Column and surface normal of the cell just left through a side.
        let mut left: Option<(bool, Vector3)> = None;

        for _ in 0..self.config.max_iterations {
            let (key, sample) = self.locate(&point_at(p0, p1, u), &delta);
            self.last_cell.set(Some(key));
            let pair = self.cell(key)?;

            let target = sample + delta * (1.0 - u);
            let below = pair.below.contains_toward(&sample, &target)?;
            if let Some((was_below, normal)) = left {
                // The surface was crossed exactly on the shared side.
                if was_below != below {
                    return Ok(Some(Crossing {
                        normal,
                        u,
                        tie: true,
                    }));
                }
            }
            let column = if below { &pair.below } else { &pair.above };
            let Some(hit) = column.clip(&sample, &target) else {
                return Ok(None);
            };
            let Some(plane) = column.plane(hit.plane) else {
                return Ok(None);
            };

            let next = u + hit.u * (1.0 - u);
            if plane.normal().z != 0.0 {
                return Ok(Some(Crossing {
                    normal: *pair.surface.normal(),
                    u: next,
                    tie: hit.tie,
                }));
            }

            // Left the cell through a vertical side.
            if next >= 1.0 {
                return Ok(None);
            }
            if next <= u {
                return Err(InternalConsistencyFault::NoProgress {
                    algorithm: "height map",
                    u,
                }
                .into());
            }
            left = Some((below, *pair.surface.normal()));
            u = next;
        }

        Err(InternalConsistencyFault::IterationCap {
            algorithm: "height map",
            cap: self.config.max_iterations,
        }
        .into())
    }
}

impl Shape for HeightMap {
    fn contains_toward(&self, p0: &Point3, p1: &Point3) -> Result<bool> {
        let delta = p1 - p0;
        let (key, sample) = self.locate(p0, &delta);
        self.cell(key)?.below.contains_toward(&sample, &(sample + delta))
    }

    fn first_normal(&self, p0: &Point3, p1: &Point3) -> Result<Option<Crossing>> {
        let crossing = self.trace_segment(p0, p1)?;
        self.last.set(crossing);
        Ok(crossing)
    }

    fn last_crossing(&self) -> Option<Crossing> {
        self.last.get()
    }
}

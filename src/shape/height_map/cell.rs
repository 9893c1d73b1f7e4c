use nalgebra::DMatrix;

use crate::error::Result;
use crate::math::{HalfSpace, Point3, Vector3};
use crate::shape::Polytope;

use super::locate::Axis;

/// Which part of a grid cell a polytope pair covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Interior cell, the triangle below the `(i, j) -> (i + 1, j + 1)`
    /// diagonal (holding the node at maximum x, minimum y).
    Lower,
    /// Interior cell, the triangle above the diagonal.
    Upper,
    /// An outer edge strip or corner block, which has no diagonal.
    Whole,
}

/// Cache key of a cell's polytope pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Cell index along x, `0..=nx`.
    pub i: usize,
    /// Cell index along y, `0..=ny`.
    pub j: usize,
    /// Part of the cell.
    pub side: Side,
}

/// How a cell relates to the sampled extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Between sampled nodes along both axes; split into two triangles.
    Interior,
    /// Beyond the sampled extent along y only; the boundary row's profile
    /// is extended unchanged in y.
    EdgeX,
    /// Beyond the sampled extent along x only.
    EdgeY,
    /// Beyond the sampled extent along both axes; horizontal at the corner
    /// node height.
    Corner,
}

/// The two polytopes of a cell: the column below the surface facet and the
/// column above it.
#[derive(Debug, Clone)]
pub struct CellPair {
    pub(super) surface: HalfSpace,
    pub(super) below: Polytope,
    pub(super) above: Polytope,
}

impl CellPair {
    /// Surface height of the cell's facet at `(x, y)`.
    pub(super) fn height(&self, x: f64, y: f64) -> f64 {
        let n = self.surface.normal();
        (self.surface.offset() - n.x * x - n.y * y) / n.z
    }
}

/// Classifies a cell.
pub(super) fn cell_kind(x: &Axis, y: &Axis, i: usize, j: usize) -> CellKind {
    match (x.is_interior(i), y.is_interior(j)) {
        (true, true) => CellKind::Interior,
        (true, false) => CellKind::EdgeX,
        (false, true) => CellKind::EdgeY,
        (false, false) => CellKind::Corner,
    }
}

/// Builds the polytope pair for `key`.
pub(super) fn build_cell(
    key: CellKey,
    x: &Axis,
    y: &Axis,
    heights: &DMatrix<f64>,
) -> Result<CellPair> {
    let (slope_x, slope_y, reference) = facet(key, x, y, heights);
    let surface = HalfSpace::through_point(Vector3::new(-slope_x, -slope_y, 1.0), &reference)?;

    let mut sides = Vec::with_capacity(5);
    if let Some(lo) = x.lower_bound(key.i) {
        sides.push(HalfSpace::new(-Vector3::x(), -lo)?);
    }
    if let Some(hi) = x.upper_bound(key.i) {
        sides.push(HalfSpace::new(Vector3::x(), hi)?);
    }
    if let Some(lo) = y.lower_bound(key.j) {
        sides.push(HalfSpace::new(-Vector3::y(), -lo)?);
    }
    if let Some(hi) = y.upper_bound(key.j) {
        sides.push(HalfSpace::new(Vector3::y(), hi)?);
    }
    if cell_kind(x, y, key.i, key.j) == CellKind::Interior {
        let corner = Point3::new(x.node(key.i - 1), y.node(key.j - 1), 0.0);
        let across = Vector3::new(-1.0 / x.spacing, 1.0 / y.spacing, 0.0);
        let diagonal = HalfSpace::through_point(across, &corner)?;
        sides.push(match key.side {
            Side::Upper => diagonal.flipped(),
            Side::Lower | Side::Whole => diagonal,
        });
    }

    // The facet comes first so that it wins exact ties with a side plane.
    let mut below = Vec::with_capacity(sides.len() + 1);
    below.push(surface);
    below.extend_from_slice(&sides);

    let mut above = Vec::with_capacity(sides.len() + 1);
    above.push(surface.flipped());
    above.extend_from_slice(&sides);

    Ok(CellPair {
        surface,
        below: Polytope::new(below),
        above: Polytope::new(above),
    })
}

/// Slopes and a reference point of the planar facet over `key`.
fn facet(key: CellKey, x: &Axis, y: &Axis, h: &DMatrix<f64>) -> (f64, f64, Point3) {
    let CellKey { i, j, side } = key;
    match cell_kind(x, y, i, j) {
        CellKind::Interior => {
            let h00 = h[(i - 1, j - 1)];
            let h10 = h[(i, j - 1)];
            let h11 = h[(i, j)];
            let h01 = h[(i - 1, j)];
            let (sx, sy) = match side {
                Side::Upper => ((h11 - h01) / x.spacing, (h01 - h00) / y.spacing),
                Side::Lower | Side::Whole => ((h10 - h00) / x.spacing, (h11 - h10) / y.spacing),
            };
            (sx, sy, Point3::new(x.node(i - 1), y.node(j - 1), h00))
        }
        CellKind::EdgeX => {
            let jb = y.boundary_node(j);
            let h0 = h[(i - 1, jb)];
            let h1 = h[(i, jb)];
            (
                (h1 - h0) / x.spacing,
                0.0,
                Point3::new(x.node(i - 1), y.node(jb), h0),
            )
        }
        CellKind::EdgeY => {
            let ib = x.boundary_node(i);
            let h0 = h[(ib, j - 1)];
            let h1 = h[(ib, j)];
            (
                0.0,
                (h1 - h0) / y.spacing,
                Point3::new(x.node(ib), y.node(j - 1), h0),
            )
        }
        CellKind::Corner => {
            let ib = x.boundary_node(i);
            let jb = y.boundary_node(j);
            (0.0, 0.0, Point3::new(x.node(ib), y.node(jb), h[(ib, jb)]))
        }
    }
}

pub mod half_space;
pub mod intersect_3d;

pub use half_space::{tie_break_inside, HalfSpace};

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 matrix (linear part of an affine transform).
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// 4x4 transformation matrix.
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Global geometric tolerance for degeneracy checks (zero-length normals,
/// zero-volume elements). Never used to classify points against boundaries.
pub const TOLERANCE: f64 = 1e-10;

/// Overshoot in u applied when a stepping algorithm re-queries a shape just
/// past a crossing it has already consumed.
pub const STEP_EPSILON: f64 = 1e-12;

/// Relative distance (in grid spacings) within which a point counts as lying
/// exactly on a height-map grid line.
pub const GRID_TOLERANCE: f64 = 1e-10;

/// Relative nudge (in grid spacings) applied to move an on-line point into
/// the interior of its authoritative cell.
pub const GRID_NUDGE: f64 = 1e-9;

/// Distance in u from the target at which a mesh walk counts as arrived.
pub const ARRIVAL_EPSILON: f64 = 1e-12;

/// Default cap on iterations of any stepping or walking loop.
pub const MAX_ITERATIONS: usize = 100_000;

/// Returns the point at parameter `u` along `p0 + u * (p1 - p0)`.
#[must_use]
pub fn point_at(p0: &Point3, p1: &Point3, u: f64) -> Point3 {
    p0 + (p1 - p0) * u
}

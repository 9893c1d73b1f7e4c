use crate::error::{ConfigurationError, Result};
use crate::math::{Matrix4, Point3, Vector3, TOLERANCE};

use super::{GeneralTransform, Transformable};

/// Rotates a shape or mesh around an axis.
pub struct Rotate {
    axis_origin: Point3,
    axis_direction: Vector3,
    angle: f64,
}

impl Rotate {
    /// Creates a new `Rotate` operation.
    ///
    /// * `angle` - Rotation angle in radians, counter-clockwise looking
    ///   down the axis.
    #[must_use]
    pub fn new(axis_origin: Point3, axis_direction: Vector3, angle: f64) -> Self {
        Self {
            axis_origin,
            axis_direction,
            angle,
        }
    }

    /// Executes the rotation, modifying the target in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the axis direction is zero-length or the target
    /// cannot be rotated.
    pub fn execute<T: Transformable + ?Sized>(&self, target: &mut T) -> Result<()> {
        GeneralTransform::new(self.matrix()?).execute(target)
    }

    /// The homogeneous matrix of this rotation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroRotationAxis`] if the axis
    /// direction is zero-length.
    pub fn matrix(&self) -> Result<Matrix4> {
        let len = self.axis_direction.norm();
        if len < TOLERANCE {
            return Err(ConfigurationError::ZeroRotationAxis.into());
        }
        let axis = self.axis_direction / len;

        // Translate to origin, rotate, translate back
        let t_neg = Matrix4::new_translation(&(-self.axis_origin.coords));
        let rot = rotation_matrix(&axis, self.angle);
        let t_pos = Matrix4::new_translation(&self.axis_origin.coords);
        Ok(t_pos * rot * t_neg)
    }
}

/// Builds a 4x4 rotation matrix around a unit axis by an angle (Rodrigues).
#[allow(clippy::many_single_char_names)]
fn rotation_matrix(axis: &Vector3, angle: f64) -> Matrix4 {
    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);

    #[allow(clippy::suspicious_operation_groupings)]
    Matrix4::new(
        t * x * x + c,     t * x * y - s * z, t * x * z + s * y, 0.0,
        t * x * y + s * z, t * y * y + c,     t * y * z - s * x, 0.0,
        t * x * z - s * y, t * y * z + s * x, t * z * z + c,     0.0,
        0.0,               0.0,               0.0,               1.0,
    )
}

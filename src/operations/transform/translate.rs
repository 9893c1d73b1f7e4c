use crate::error::Result;
use crate::math::{Matrix4, Vector3};

use super::{GeneralTransform, Transformable};

/// Translates a shape or mesh by a displacement vector.
pub struct Translate {
    displacement: Vector3,
}

impl Translate {
    /// Creates a new `Translate` operation.
    #[must_use]
    pub fn new(displacement: Vector3) -> Self {
        Self { displacement }
    }

    /// Executes the translation, modifying the target in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be moved.
    pub fn execute<T: Transformable + ?Sized>(&self, target: &mut T) -> Result<()> {
        GeneralTransform::new(Matrix4::new_translation(&self.displacement)).execute(target)
    }
}

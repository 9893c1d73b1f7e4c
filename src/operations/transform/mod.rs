//! In-place affine transforms of shapes and meshes.

mod general;
mod rotate;
mod translate;

pub use general::{GeneralTransform, Transformable};
pub use rotate::Rotate;
pub use translate::Translate;

//! Operations that modify shapes in place.

pub mod transform;

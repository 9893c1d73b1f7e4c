//! Geometry engine for tracing line segments through solid shapes.
//!
//! Every shape answers two queries: whether a point is inside, and where a
//! segment first crosses the boundary together with the outward normal
//! there. Shapes range from half-space polytopes and spheres through
//! unions, gridded height maps and tetrahedral meshes.

pub mod config;
pub mod error;
pub mod math;
pub mod mesh;
pub mod operations;
pub mod shape;

pub use config::EngineConfig;
pub use error::{ConfigurationError, InternalConsistencyFault, Result, TraceError};
pub use mesh::{Mesh, MeshShape};
pub use shape::{AnyShape, Crossing, Shape};

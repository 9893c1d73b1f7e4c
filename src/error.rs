use thiserror::Error;

/// Top-level error type for the trajectory geometry engine.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Consistency(#[from] InternalConsistencyFault),
}

/// Malformed input geometry. Never transient, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{kind} element {element} has {found} nodes, expected {expected}")]
    WrongNodeCount {
        element: usize,
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unknown element type tag {0}")]
    UnknownElementType(u32),

    #[error("element {element} is a {kind}, not a tetrahedron")]
    NotATetrahedron { element: usize, kind: &'static str },

    #[error("element {element} references node {node}, but the mesh has {count} nodes")]
    NodeOutOfRange {
        element: usize,
        node: usize,
        count: usize,
    },

    #[error("node index {index} is out of range ({count} nodes)")]
    UnknownNode { index: usize, count: usize },

    #[error("element index {index} is out of range ({count} elements)")]
    ElementOutOfRange { index: usize, count: usize },

    #[error("face {nodes:?} is shared by more than two volume elements")]
    NonManifoldFace { nodes: [usize; 3] },

    #[error("half-space normal has zero length")]
    DegenerateHalfSpace,

    #[error("tetrahedron {0} has zero volume")]
    DegenerateTetrahedron(usize),

    #[error("mesh contains no tetrahedra")]
    NoTetrahedra,

    #[error("height grid is empty")]
    EmptyGrid,

    #[error("grid spacing must be positive, got ({dx}, {dy})")]
    InvalidSpacing { dx: f64, dy: f64 },

    #[error("sphere radius must be positive, got {0}")]
    InvalidRadius(f64),

    #[error("potential table has {found} entries, mesh has {expected} nodes")]
    PotentialCountMismatch { expected: usize, found: usize },

    #[error("rotation axis has zero length")]
    ZeroRotationAxis,

    #[error("{shape} does not support this transform: {reason}")]
    UnsupportedTransform {
        shape: &'static str,
        reason: &'static str,
    },
}

/// A tolerance constant or algorithm failed to guarantee termination or
/// consistency. Reported instead of returning a best-effort answer.
#[derive(Debug, Error)]
pub enum InternalConsistencyFault {
    #[error("{algorithm} exceeded its iteration cap of {cap}")]
    IterationCap { algorithm: &'static str, cap: usize },

    #[error("{algorithm} failed to advance past u = {u}")]
    NoProgress { algorithm: &'static str, u: f64 },

    #[error("mesh walk lost track of its element near element {element}")]
    LostElement { element: usize },
}

/// Convenience type alias for results using [`TraceError`].
pub type Result<T> = std::result::Result<T, TraceError>;

use crate::error::{ConfigurationError, Result};

/// Kind of a mesh element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Point,
    Line,
    Triangle,
    Tetrahedron,
}

impl ElementKind {
    /// Resolves a Gmsh element type tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownElementType`] for tags other than
    /// 15 (point), 1 (line), 2 (triangle) and 4 (tetrahedron).
    pub fn from_type_tag(tag: u32) -> Result<Self> {
        match tag {
            15 => Ok(Self::Point),
            1 => Ok(Self::Line),
            2 => Ok(Self::Triangle),
            4 => Ok(Self::Tetrahedron),
            other => Err(ConfigurationError::UnknownElementType(other).into()),
        }
    }

    /// Gmsh element type tag.
    #[must_use]
    pub fn type_tag(self) -> u32 {
        match self {
            Self::Point => 15,
            Self::Line => 1,
            Self::Triangle => 2,
            Self::Tetrahedron => 4,
        }
    }

    /// Number of nodes an element of this kind references.
    #[must_use]
    pub fn node_count(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Tetrahedron => 4,
        }
    }

    /// Lower-case name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Triangle => "triangle",
            Self::Tetrahedron => "tetrahedron",
        }
    }
}

/// One row of the element table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    kind: ElementKind,
    tags: Vec<u32>,
    nodes: Vec<usize>,
}

impl Element {
    /// Creates an element. Node counts are checked when the element is
    /// added to a [`super::Mesh`].
    #[must_use]
    pub fn new(kind: ElementKind, tags: Vec<u32>, nodes: Vec<usize>) -> Self {
        Self { kind, tags, nodes }
    }

    /// Creates a tetrahedron in `region`.
    #[must_use]
    pub fn tetrahedron(region: u32, nodes: [usize; 4]) -> Self {
        Self::new(ElementKind::Tetrahedron, vec![region], nodes.to_vec())
    }

    /// Creates an element from a Gmsh type tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the type tag is unknown.
    pub fn from_type_tag(type_tag: u32, tags: Vec<u32>, nodes: Vec<usize>) -> Result<Self> {
        Ok(Self::new(ElementKind::from_type_tag(type_tag)?, tags, nodes))
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[must_use]
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    #[must_use]
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Physical (material) region, the first tag.
    #[must_use]
    pub fn region(&self) -> Option<u32> {
        self.tags.first().copied()
    }

    /// Geometrical entity, the second tag.
    #[must_use]
    pub fn entity(&self) -> Option<u32> {
        self.tags.get(1).copied()
    }

    pub(super) fn validate(&self, index: usize, node_count: usize) -> Result<()> {
        let expected = self.kind.node_count();
        if self.nodes.len() != expected {
            return Err(ConfigurationError::WrongNodeCount {
                element: index,
                kind: self.kind.name(),
                expected,
                found: self.nodes.len(),
            }
            .into());
        }
        if let Some(&node) = self.nodes.iter().find(|&&n| n >= node_count) {
            return Err(ConfigurationError::NodeOutOfRange {
                element: index,
                node,
                count: node_count,
            }
            .into());
        }
        Ok(())
    }
}

use nalgebra::RowVector4;

use crate::error::{ConfigurationError, Result};
use crate::math::{HalfSpace, Matrix3, Matrix4, Point3, Vector3, TOLERANCE};
use crate::mesh::{Mesh, MeshShape, Tetrahedron};
use crate::shape::{AnyShape, HeightMap, Polytope, Sphere, Union2, UnionN};

/// Something that can be moved in place by an affine map.
pub trait Transformable {
    /// Applies the 4x4 homogeneous `matrix`.
    ///
    /// On error the target is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedTransform`] if the matrix
    /// is not affine and invertible, or the target cannot represent the
    /// transformed shape.
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()>;
}

/// Applies an arbitrary 4x4 transformation matrix to a shape or mesh.
pub struct GeneralTransform {
    matrix: Matrix4,
}

impl GeneralTransform {
    /// Creates a new `GeneralTransform` operation.
    #[must_use]
    pub fn new(matrix: Matrix4) -> Self {
        Self { matrix }
    }

    /// Executes the transformation, modifying the target in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the target rejects the matrix.
    pub fn execute<T: Transformable + ?Sized>(&self, target: &mut T) -> Result<()> {
        target.apply_matrix(&self.matrix)
    }
}

/// Linear and translation parts of an affine map.
struct Affine {
    linear: Matrix3,
    translation: Vector3,
    /// Inverse transpose of `linear`, for mapping plane normals.
    normal_map: Matrix3,
}

impl Affine {
    fn split(matrix: &Matrix4, shape: &'static str) -> Result<Self> {
        if matrix.row(3) != RowVector4::new(0.0, 0.0, 0.0, 1.0) {
            return Err(ConfigurationError::UnsupportedTransform {
                shape,
                reason: "matrix is not affine",
            }
            .into());
        }
        let linear: Matrix3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let Some(inverse) = linear.try_inverse() else {
            return Err(ConfigurationError::UnsupportedTransform {
                shape,
                reason: "matrix is singular",
            }
            .into());
        };
        Ok(Self {
            linear,
            translation: matrix.fixed_view::<3, 1>(0, 3).into_owned(),
            normal_map: inverse.transpose(),
        })
    }

    fn point(&self, p: &Point3) -> Point3 {
        Point3::from(self.linear * p.coords + self.translation)
    }

    fn half_space(&self, plane: &HalfSpace) -> Result<HalfSpace> {
        let on_plane = Point3::from(plane.normal() * plane.offset());
        HalfSpace::through_point(self.normal_map * plane.normal(), &self.point(&on_plane))
    }

    /// Uniform scale factor if the linear part is a similarity.
    fn similarity_scale(&self) -> Option<f64> {
        let gram = self.linear.transpose() * self.linear;
        let scale2 = gram.trace() / 3.0;
        let deviation = (gram - Matrix3::identity() * scale2).abs().max();
        (deviation <= TOLERANCE * scale2).then(|| scale2.sqrt())
    }

    fn is_translation(&self) -> bool {
        (self.linear - Matrix3::identity()).abs().max() <= TOLERANCE
    }
}

impl Transformable for HalfSpace {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        *self = Affine::split(matrix, "half-space")?.half_space(self)?;
        Ok(())
    }
}

impl Transformable for Polytope {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let affine = Affine::split(matrix, "polytope")?;
        let moved = self
            .planes()
            .iter()
            .map(|plane| affine.half_space(plane))
            .collect::<Result<Vec<_>>>()?;
        self.planes_mut().copy_from_slice(&moved);
        Ok(())
    }
}

impl Transformable for Sphere {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let affine = Affine::split(matrix, "sphere")?;
        let Some(scale) = affine.similarity_scale() else {
            return Err(ConfigurationError::UnsupportedTransform {
                shape: "sphere",
                reason: "only rotations, reflections, translations and uniform scaling keep a sphere round",
            }
            .into());
        };
        self.set_center(affine.point(self.center()));
        self.set_radius(self.radius() * scale);
        Ok(())
    }
}

impl Transformable for Union2 {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let (a, b) = self.members_mut();
        let mut moved_a = a.clone();
        moved_a.apply_matrix(matrix)?;
        let mut moved_b = b.clone();
        moved_b.apply_matrix(matrix)?;
        *a = moved_a;
        *b = moved_b;
        Ok(())
    }
}

impl Transformable for UnionN {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let mut moved = self.members().to_vec();
        for member in &mut moved {
            member.apply_matrix(matrix)?;
        }
        for (slot, member) in self.members_mut().iter_mut().zip(moved) {
            *slot = member;
        }
        Ok(())
    }
}

impl Transformable for HeightMap {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let affine = Affine::split(matrix, "height map")?;
        if !affine.is_translation() {
            return Err(ConfigurationError::UnsupportedTransform {
                shape: "height map",
                reason: "only translations keep the grid axis-aligned",
            }
            .into());
        }
        self.translate(&affine.translation);
        Ok(())
    }
}

impl Transformable for Tetrahedron {
    fn apply_matrix(&mut self, _matrix: &Matrix4) -> Result<()> {
        Err(ConfigurationError::UnsupportedTransform {
            shape: "tetrahedron",
            reason: "element geometry follows the mesh nodes; transform the mesh",
        }
        .into())
    }
}

impl Transformable for Mesh {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        let affine = Affine::split(matrix, "mesh")?;
        for node in self.nodes_mut() {
            *node = affine.point(node);
        }
        self.update_geom();
        Ok(())
    }
}

impl Transformable for MeshShape {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        self.mesh_mut().apply_matrix(matrix)
    }
}

impl Transformable for AnyShape {
    fn apply_matrix(&mut self, matrix: &Matrix4) -> Result<()> {
        match self {
            Self::Polytope(s) => s.apply_matrix(matrix),
            Self::Sphere(s) => s.apply_matrix(matrix),
            Self::Union2(s) => s.apply_matrix(matrix),
            Self::UnionN(s) => s.apply_matrix(matrix),
            Self::HeightMap(s) => s.apply_matrix(matrix),
            Self::Tetrahedron(s) => s.apply_matrix(matrix),
            Self::Mesh(s) => s.apply_matrix(matrix),
        }
    }
}

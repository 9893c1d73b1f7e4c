//! Test meshes.

#![allow(clippy::unwrap_used)]

use crate::math::{Point3, Vector3};

use super::{Element, Mesh};

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

/// Offsets of the six tetrahedra splitting a unit cube around its
/// `(0,0,0) -> (1,1,1)` diagonal. Consecutive entries share a face.
const KUHN_PATHS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [1, 0, 2],
    [1, 2, 0],
    [2, 1, 0],
    [2, 0, 1],
    [0, 2, 1],
];

/// Two tetrahedra sharing the face on `z = 0`: element 0 above it, element
/// 1 below. Face 3 of both is the shared face.
pub(crate) fn tetrahedron_pair() -> Mesh {
    let nodes = vec![
        p(0.0, 0.0, 0.0),
        p(1.0, 0.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(0.0, 0.0, -1.0),
    ];
    let elements = vec![
        Element::tetrahedron(1, [0, 1, 2, 3]),
        Element::tetrahedron(2, [0, 1, 2, 4]),
    ];
    Mesh::new(nodes, elements).unwrap()
}

/// The unit cube split into six tetrahedra sharing its main diagonal.
pub(crate) fn kuhn_cube() -> Mesh {
    cube_grid(1, 1.0)
}

/// Four tetrahedra fanned around the edge from `(0,0,0)` to `(0,0,1)`, one
/// per xy quadrant in counter-clockwise order starting at `x, y >= 0`.
pub(crate) fn edge_fan() -> Mesh {
    let nodes = vec![
        p(0.0, 0.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(1.0, 0.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(-1.0, 0.0, 0.0),
        p(0.0, -1.0, 0.0),
    ];
    let elements = vec![
        Element::tetrahedron(1, [0, 1, 2, 3]),
        Element::tetrahedron(1, [0, 1, 3, 4]),
        Element::tetrahedron(1, [0, 1, 4, 5]),
        Element::tetrahedron(1, [0, 1, 5, 2]),
    ];
    Mesh::new(nodes, elements).unwrap()
}

/// A cube of side `size` at the origin, divided into `n^3` sub-cubes of six
/// tetrahedra each.
pub(crate) fn cube_grid(n: usize, size: f64) -> Mesh {
    let (nodes, elements) = cube_grid_tables(n, size, Vector3::zeros(), 0);
    Mesh::new(nodes, elements).unwrap()
}

/// Two unit Kuhn cubes separated by a gap of one unit along x.
pub(crate) fn separated_cubes() -> Mesh {
    let (mut nodes, mut elements) = cube_grid_tables(1, 1.0, Vector3::zeros(), 0);
    let (far_nodes, far_elements) = cube_grid_tables(1, 1.0, Vector3::new(2.0, 0.0, 0.0), nodes.len());
    nodes.extend(far_nodes);
    elements.extend(far_elements);
    Mesh::new(nodes, elements).unwrap()
}

#[allow(clippy::cast_precision_loss)]
fn cube_grid_tables(
    n: usize,
    size: f64,
    origin: Vector3,
    first_node: usize,
) -> (Vec<Point3>, Vec<Element>) {
    let side = n + 1;
    let id = |i: usize, j: usize, k: usize| first_node + i + side * (j + side * k);
    let step = size / n as f64;

    let mut nodes = Vec::with_capacity(side * side * side);
    for k in 0..side {
        for j in 0..side {
            for i in 0..side {
                nodes.push(Point3::from(
                    origin + Vector3::new(i as f64, j as f64, k as f64) * step,
                ));
            }
        }
    }

    let mut elements = Vec::with_capacity(6 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for path in KUHN_PATHS {
                    let mut corner = [i, j, k];
                    let mut tet = [id(i, j, k); 4];
                    for (slot, axis) in path.into_iter().enumerate() {
                        corner[axis] += 1;
                        tet[slot + 1] = id(corner[0], corner[1], corner[2]);
                    }
                    elements.push(Element::tetrahedron(1, tet));
                }
            }
        }
    }
    (nodes, elements)
}

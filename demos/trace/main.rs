//! Traces a segment through a sample scene and logs every boundary crossing.
//!
//! Usage:
//! ```text
//! cargo run --example trace                # default (mesh)
//! cargo run --example trace -- terrain     # height map
//! cargo run --example trace -- union       # overlapping spheres and a box
//! ```

use nalgebra::DMatrix;
use tracegeom::math::{point_at, Point3, Vector3, STEP_EPSILON};
use tracegeom::mesh::{Element, Mesh, MeshShape};
use tracegeom::operations::transform::Rotate;
use tracegeom::shape::{AnyShape, HeightMap, Polytope, Shape, Sphere, UnionN};
use tracegeom::Result;

/// Upper bound on logged crossings per segment.
const MAX_CROSSINGS: usize = 64;

fn main() -> Result<()> {
    // Default: WARN for everything, INFO for the demo and the engine.
    // Override with RUST_LOG env var (e.g. RUST_LOG=tracegeom=trace).
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("trace=info".parse().unwrap_or_default())
        .add_directive("tracegeom=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let scene = std::env::args().nth(1).unwrap_or_else(|| "mesh".to_owned());
    let (shape, p0, p1) = match scene.as_str() {
        "terrain" => terrain()?,
        "union" => union()?,
        "mesh" => mesh()?,
        other => {
            tracing::error!(scene = other, "unknown scene; expected mesh, terrain or union");
            return Ok(());
        }
    };

    tracing::info!(%scene, start = ?p0, end = ?p1, "tracing");
    trace(&shape, &p0, &p1)
}

/// Logs every crossing of `p0 -> p1`, restarting just past each one.
fn trace(shape: &AnyShape, p0: &Point3, p1: &Point3) -> Result<()> {
    let mut start = *p0;
    let mut inside = shape.contains_toward(&start, p1)?;
    tracing::info!(inside, "start");

    for _ in 0..MAX_CROSSINGS {
        let Some(crossing) = shape.first_normal(&start, p1)? else {
            break;
        };
        if !crossing.within_segment() {
            break;
        }
        let point = crossing.point(&start, p1);
        inside = !crossing.is_exit(&(p1 - start));
        tracing::info!(
            x = point.x,
            y = point.y,
            z = point.z,
            normal = ?crossing.normal,
            tie = crossing.tie,
            inside,
            "crossing"
        );
        start = point_at(&start, p1, crossing.u + STEP_EPSILON);
    }

    tracing::info!(inside, "end");
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn terrain() -> Result<(AnyShape, Point3, Point3)> {
    let heights = DMatrix::from_fn(8, 8, |i, j| ((i as f64) * 0.7).sin() + ((j as f64) * 0.4).cos());
    let map = HeightMap::new(0.0, 0.0, 1.0, 1.0, heights)?;
    Ok((
        map.into(),
        Point3::new(-1.0, 3.2, 2.5),
        Point3::new(8.0, 3.7, -0.5),
    ))
}

fn union() -> Result<(AnyShape, Point3, Point3)> {
    let mut members: Vec<AnyShape> = vec![
        Sphere::new(Point3::new(0.0, 0.0, 0.0), 1.0)?.into(),
        Sphere::new(Point3::new(1.5, 0.0, 0.0), 1.0)?.into(),
        Polytope::axis_box(&Point3::new(3.0, -0.5, -0.5), &Point3::new(4.0, 0.5, 0.5))?.into(),
    ];
    let mut tilted: AnyShape =
        Polytope::axis_box(&Point3::new(5.0, -0.5, -0.5), &Point3::new(6.0, 0.5, 0.5))?.into();
    Rotate::new(Point3::new(5.5, 0.0, 0.0), Vector3::z(), 0.4).execute(&mut tilted)?;
    members.push(tilted);

    Ok((
        UnionN::new(members).into(),
        Point3::new(-2.0, 0.1, 0.0),
        Point3::new(7.0, 0.1, 0.0),
    ))
}

/// A 2x2x2 block of unit cubes, each split into six tetrahedra.
#[allow(clippy::cast_precision_loss)]
fn mesh() -> Result<(AnyShape, Point3, Point3)> {
    const N: usize = 2;
    const PATHS: [[usize; 3]; 6] = [[0, 1, 2], [1, 0, 2], [1, 2, 0], [2, 1, 0], [2, 0, 1], [0, 2, 1]];
    let side = N + 1;
    let id = |i: usize, j: usize, k: usize| i + side * (j + side * k);

    let mut nodes = Vec::new();
    for k in 0..side {
        for j in 0..side {
            for i in 0..side {
                nodes.push(Point3::new(i as f64, j as f64, k as f64));
            }
        }
    }
    let mut elements = Vec::new();
    for k in 0..N {
        for j in 0..N {
            for i in 0..N {
                for path in PATHS {
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

    let shape = MeshShape::new(Mesh::new(nodes, elements)?)?;
    Ok((
        shape.into(),
        Point3::new(-0.5, 0.3, 0.7),
        Point3::new(2.5, 1.6, 1.1),
    ))
}

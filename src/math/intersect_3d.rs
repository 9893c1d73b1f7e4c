use super::{HalfSpace, Point3, Vector3};

/// Relationship of a parametrised segment `p0 + u * delta` with the plane
/// bounding a half-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentPlaneRelation {
    /// The line crosses the plane at parameter `u`.
    ///
    /// `exiting` is `true` when the motion is along the outward normal, so
    /// the crossing bounds the inside interval from above.
    Crossing { u: f64, exiting: bool },
    /// The line is parallel to the plane; `inside` tells whether the whole
    /// line lies in the half-space (tie-broken when it lies in the plane).
    Parallel { inside: bool },
}

/// Intersects the line `p0 + u * delta` with the plane bounding `half_space`.
///
/// No tolerance is applied: a denominator of exactly zero is the only
/// parallel case, so the result is deterministic for identical inputs.
#[must_use]
pub fn segment_plane_intersect(
    p0: &Point3,
    delta: &Vector3,
    half_space: &HalfSpace,
) -> SegmentPlaneRelation {
    let numer = half_space.signed_distance(p0);
    let denom = half_space.normal().dot(delta);

    if denom == 0.0 {
        SegmentPlaneRelation::Parallel {
            inside: half_space.contains_toward(p0, delta),
        }
    } else {
        SegmentPlaneRelation::Crossing {
            u: -numer / denom,
            exiting: denom > 0.0,
        }
    }
}

/// Classification of a point relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointPlaneClassification {
    /// Point is on the positive side (in the direction of the normal).
    Front,
    /// Point is on the negative side (opposite the normal).
    Back,
    /// Point lies exactly on the plane.
    On,
}

/// Classifies a point relative to the plane bounding a half-space.
#[must_use]
pub fn classify_point_plane(point: &Point3, half_space: &HalfSpace) -> PointPlaneClassification {
    let dist = half_space.signed_distance(point);

    if dist > 0.0 {
        PointPlaneClassification::Front
    } else if dist < 0.0 {
        PointPlaneClassification::Back
    } else {
        PointPlaneClassification::On
    }
}

use crate::math::Vector3;

/// Which neighbour owns a point lying exactly on a grid line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step {
    /// The cell on the increasing-coordinate side.
    Up,
    /// The cell on the decreasing-coordinate side.
    Down,
}

/// Authoritative neighbours for on-line points, indexed by the sign octant
/// of the trajectory direction (bit 0: dx < 0, bit 1: dy < 0, bit 2: dz < 0).
/// A zero component counts as non-negative.
const OCTANT_STEPS: [(Step, Step); 8] = [
    (Step::Up, Step::Up),
    (Step::Down, Step::Up),
    (Step::Up, Step::Down),
    (Step::Down, Step::Down),
    (Step::Up, Step::Up),
    (Step::Down, Step::Up),
    (Step::Up, Step::Down),
    (Step::Down, Step::Down),
];

/// Sign octant of a direction vector.
pub(super) fn octant(delta: &Vector3) -> usize {
    usize::from(delta.x < 0.0) | (usize::from(delta.y < 0.0) << 1) | (usize::from(delta.z < 0.0) << 2)
}

/// Neighbour steps along x and y for a trajectory moving along `delta`.
pub(super) fn steps_for(delta: &Vector3) -> (Step, Step) {
    OCTANT_STEPS[octant(delta)]
}

/// One axis of the sampling grid.
///
/// Cells are numbered `0..=count`: cell 0 extends to minus infinity, cell
/// `count` to plus infinity, and cell `k` in between spans nodes `k - 1`
/// and `k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Axis {
    pub origin: f64,
    pub spacing: f64,
    pub count: usize,
}

impl Axis {
    /// Coordinate of node `k`.
    #[allow(clippy::cast_precision_loss)]
    pub fn node(&self, k: usize) -> f64 {
        self.origin + k as f64 * self.spacing
    }

    /// Lower coordinate bound of `cell`, if finite.
    pub fn lower_bound(&self, cell: usize) -> Option<f64> {
        (cell >= 1).then(|| self.node(cell - 1))
    }

    /// Upper coordinate bound of `cell`, if finite.
    pub fn upper_bound(&self, cell: usize) -> Option<f64> {
        (cell < self.count).then(|| self.node(cell))
    }

    /// Whether `cell` lies between two sampled nodes.
    pub fn is_interior(&self, cell: usize) -> bool {
        cell >= 1 && cell < self.count
    }

    /// Node whose sample an outer (infinite) cell repeats.
    pub fn boundary_node(&self, cell: usize) -> usize {
        if cell == 0 {
            0
        } else {
            self.count - 1
        }
    }

    /// Finds the cell holding `coord`.
    ///
    /// A coordinate within `tolerance` spacings of a node line belongs to
    /// the neighbour selected by `step` and is nudged `nudge` spacings into
    /// that cell. Returns the cell and the (possibly nudged) coordinate.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn locate(&self, coord: f64, step: Step, tolerance: f64, nudge: f64) -> (usize, f64) {
        let f = (coord - self.origin) / self.spacing;
        let k = f.round();
        let last = (self.count - 1) as f64;

        if (f - k).abs() <= tolerance && (0.0..=last).contains(&k) {
            let k = k as usize;
            match step {
                Step::Up => (k + 1, self.origin + (k as f64 + nudge) * self.spacing),
                Step::Down => (k, self.origin + (k as f64 - nudge) * self.spacing),
            }
        } else {
            let cell = (f.floor() + 1.0).clamp(0.0, self.count as f64);
            (cell as usize, coord)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(count: usize) -> Axis {
        Axis {
            origin: 1.0,
            spacing: 0.5,
            count,
        }
    }

    #[test]
    fn interior_coordinate_maps_to_its_cell() {
        let a = axis(4);
        assert_eq!(a.locate(1.2, Step::Up, 1e-10, 1e-9), (1, 1.2));
        assert_eq!(a.locate(2.3, Step::Up, 1e-10, 1e-9), (3, 2.3));
    }

    #[test]
    fn far_coordinates_map_to_outer_cells() {
        let a = axis(4);
        assert_eq!(a.locate(-100.0, Step::Up, 1e-10, 1e-9).0, 0);
        assert_eq!(a.locate(100.0, Step::Up, 1e-10, 1e-9).0, 4);
    }

    #[test]
    fn on_line_coordinate_follows_step() {
        let a = axis(4);
        let (up, x_up) = a.locate(1.5, Step::Up, 1e-10, 1e-9);
        let (down, x_down) = a.locate(1.5, Step::Down, 1e-10, 1e-9);
        assert_eq!(up, 2);
        assert_eq!(down, 1);
        assert!(x_up > 1.5);
        assert!(x_down < 1.5);
    }

    #[test]
    fn single_node_axis_has_two_outer_cells() {
        let a = axis(1);
        assert_eq!(a.locate(0.0, Step::Up, 1e-10, 1e-9).0, 0);
        assert_eq!(a.locate(1.0, Step::Up, 1e-10, 1e-9).0, 1);
        assert_eq!(a.locate(1.0, Step::Down, 1e-10, 1e-9).0, 0);
        assert!(!a.is_interior(0));
        assert!(!a.is_interior(1));
        assert_eq!(a.boundary_node(1), 0);
    }

    #[test]
    fn bounds_of_outer_cells_are_open() {
        let a = axis(3);
        assert_eq!(a.lower_bound(0), None);
        assert_eq!(a.upper_bound(3), None);
        assert_eq!(a.lower_bound(2), Some(1.5));
        assert_eq!(a.upper_bound(2), Some(2.0));
    }

    #[test]
    fn zero_direction_components_step_up() {
        assert_eq!(steps_for(&Vector3::new(0.0, 0.0, -1.0)), (Step::Up, Step::Up));
        assert_eq!(steps_for(&Vector3::new(-1.0, 0.0, 1.0)), (Step::Down, Step::Up));
        assert_eq!(octant(&Vector3::new(-1.0, -1.0, -1.0)), 7);
    }
}

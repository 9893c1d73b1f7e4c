use crate::math::{
    ARRIVAL_EPSILON, GRID_NUDGE, GRID_TOLERANCE, MAX_ITERATIONS, STEP_EPSILON,
};

/// Tolerances and iteration limits shared by the iterative shapes.
///
/// The defaults are the crate-level constants in [`crate::math`]; shapes
/// built with `new` use them, shapes built with `with_config` use the
/// supplied values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Overshoot in u when re-querying past a consumed crossing.
    pub step_epsilon: f64,
    /// Relative distance at which a point lies on a height-map grid line.
    pub grid_tolerance: f64,
    /// Relative nudge into the authoritative height-map cell.
    pub grid_nudge: f64,
    /// Cap on iterations of stepping and walking loops.
    pub max_iterations: usize,
    /// Distance in u from a walk's target at which it counts as arrived.
    pub arrival_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_epsilon: STEP_EPSILON,
            grid_tolerance: GRID_TOLERANCE,
            grid_nudge: GRID_NUDGE,
            max_iterations: MAX_ITERATIONS,
            arrival_epsilon: ARRIVAL_EPSILON,
        }
    }
}

impl EngineConfig {
    /// Sets the stepping overshoot.
    #[must_use]
    pub fn with_step_epsilon(mut self, step_epsilon: f64) -> Self {
        self.step_epsilon = step_epsilon;
        self
    }

    /// Sets the on-grid-line tolerance and the nudge distance.
    #[must_use]
    pub fn with_grid_tolerance(mut self, tolerance: f64, nudge: f64) -> Self {
        self.grid_tolerance = tolerance;
        self.grid_nudge = nudge;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the arrival distance for mesh walks.
    #[must_use]
    pub fn with_arrival_epsilon(mut self, arrival_epsilon: f64) -> Self {
        self.arrival_epsilon = arrival_epsilon;
        self
    }
}

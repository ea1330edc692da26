//! Planner configuration
//!
//! Numeric configuration for the corridor trajectory optimizer. Nothing here
//! is reconfigurable mid-solve; the driver validates once at construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors are fatal: setup must abort before any solve.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spline degree must be >= 2 (boundary formulas divide by p-1), got {0}")]
    DegreeTooLow(usize),
    #[error("separation windows and piecewise conversion require a cubic spline, got degree {0}")]
    NotCubic(usize),
    #[error("segment count must leave at least one free control point, got {0} segments")]
    TooFewSegments(usize),
    #[error("sampling step must be positive, got {0}")]
    InvalidSamplingStep(f64),
    #[error("declared constraint count {declared} does not match computed count {computed}")]
    ConstraintCountMismatch { declared: usize, computed: usize },
    #[error("expected {expected} {what}, got {got}")]
    CorridorShape {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("layout index failure during setup: {0}")]
    Layout(#[from] crate::layout::LayoutError),
}

/// Main planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Spline discretization
    pub spline: SplineConfig,
    /// Kinematic limits (consumed by the search-seeded guess)
    pub limits: KinematicLimits,
    /// Spatial bounds for guesses and the seeded search
    pub workspace: WorkspaceBounds,
    /// Solver tolerances and budgets
    pub solver: SolverConfig,
    /// Seeded-search parameters
    pub search: SearchConfig,
    /// Sampling step `dc` for the dense state trajectory [s]
    pub sampling_step: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            spline: SplineConfig::default(),
            limits: KinematicLimits::default(),
            workspace: WorkspaceBounds::default(),
            solver: SolverConfig::default(),
            search: SearchConfig::default(),
            sampling_step: 0.01,
        }
    }
}

impl PlannerConfig {
    /// Check the configuration before any solve is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.spline.degree;
        if p < 2 {
            return Err(ConfigError::DegreeTooLow(p));
        }
        if p != 3 {
            return Err(ConfigError::NotCubic(p));
        }
        // N + 1 control points with six fixed: need N - 5 >= 1
        let n = self.spline.num_segments + p - 1;
        if n < 6 {
            return Err(ConfigError::TooFewSegments(self.spline.num_segments));
        }
        if !(self.sampling_step > 0.0) {
            return Err(ConfigError::InvalidSamplingStep(self.sampling_step));
        }
        Ok(())
    }
}

/// Spline discretization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplineConfig {
    /// Polynomial degree `p`
    pub degree: usize,
    /// Number of polynomial segments over the horizon
    pub num_segments: usize,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            degree: 3,
            num_segments: 7,
        }
    }
}

/// Velocity and acceleration limits, applied per axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinematicLimits {
    /// Maximum speed per axis [m/s]
    pub v_max: f64,
    /// Maximum acceleration per axis [m/s²]
    pub a_max: f64,
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            v_max: 5.0,
            a_max: 10.0,
        }
    }
}

/// Axis-aligned workspace bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkspaceBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for WorkspaceBounds {
    fn default() -> Self {
        Self {
            x_min: -50.0,
            x_max: 50.0,
            y_min: -50.0,
            y_max: 50.0,
            z_min: 0.0,
            z_max: 20.0,
        }
    }
}

impl WorkspaceBounds {
    /// Clamp a point into the bounds, component-wise.
    pub fn saturate(&self, p: kestrel_core::Vec3) -> kestrel_core::Vec3 {
        kestrel_core::Vec3::new(
            p.x.clamp(self.x_min, self.x_max),
            p.y.clamp(self.y_min, self.y_max),
            p.z.clamp(self.z_min, self.z_max),
        )
    }
}

/// Solver tolerances and budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Relative-step stopping tolerance of both solver levels
    pub xtol_rel: f64,
    /// Per-constraint satisfaction tolerance
    pub constraint_tol: f64,
    /// Hard cap on combined objective/constraint evaluations
    pub max_evaluations: usize,
    /// Hard cap on wall-clock solve time [s]
    pub max_solve_time: f64,
    /// Minimum squared norm for separating-plane normals
    pub normal_epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            xtol_rel: 1e-4,
            constraint_tol: 0.1,
            max_evaluations: 1_000_000,
            max_solve_time: 0.3,
            normal_epsilon: 1.0,
        }
    }
}

/// Parameters handed to the seeded discrete search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Samples per axis when discretizing candidate velocities
    pub samples_per_axis: [usize; 3],
    /// Wall-clock budget for the search [s]
    pub max_runtime: f64,
    /// Accept nodes within this distance of the goal [m]
    pub goal_tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            samples_per_axis: [7, 7, 7],
            max_runtime: 0.05,
            goal_tolerance: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn low_degree_rejected() {
        let mut config = PlannerConfig::default();
        config.spline.degree = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegreeTooLow(1))
        ));
    }

    #[test]
    fn non_cubic_rejected() {
        let mut config = PlannerConfig::default();
        config.spline.degree = 4;
        assert!(matches!(config.validate(), Err(ConfigError::NotCubic(4))));
    }

    #[test]
    fn too_few_segments_rejected() {
        let mut config = PlannerConfig::default();
        config.spline.num_segments = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooFewSegments(3))
        ));
    }

    #[test]
    fn saturate_clamps_into_bounds() {
        let bounds = WorkspaceBounds::default();
        let p = bounds.saturate(kestrel_core::Vec3::new(100.0, -100.0, -5.0));
        assert_eq!(p.x, 50.0);
        assert_eq!(p.y, -50.0);
        assert_eq!(p.z, 0.0);
    }
}

//! # Kestrel Planner
//!
//! Corridor-constrained trajectory optimization for a quadrotor-class
//! vehicle.
//!
//! The planner refines a trajectory through a sequence of convex safe
//! regions by solving a nonlinear program over the control points of a
//! clamped uniform B-spline and, per (obstacle, segment) pair, a separating
//! plane:
//!
//! ```text
//! minimize    Σᵢ ‖q[i+1] - 2q[i] + q[i-1]‖²          (control-point jerk proxy)
//! subject to  -(nᵖ·v + dᵖ) ≤ 0   for every obstacle-hull vertex v
//!             nᵖ·q[s+u] + dᵖ ≤ 0  for the segment's four control points
//!             ε - nᵖ·nᵖ ≤ 0       (plane normals stay away from zero)
//! ```
//!
//! The first and last three control points are fixed by the boundary
//! conditions and are not decision variables.
//!
//! # Components
//!
//! - [`config`]: numeric configuration and workspace bounds
//! - [`layout`]: flat decision-vector layout (control points, normals, offsets)
//! - [`boundary`]: boundary control points from initial/final states
//! - [`objective`]: smoothness cost and analytic gradient
//! - [`constraints`]: separating-plane constraints and sparse Jacobian
//! - [`solver`]: augmented-Lagrangian solver over gradient-annotated problems
//! - [`planner`]: the solve-session driver
//! - [`trajectory`]: reconstruction into piecewise polynomials and samples
//! - [`guess`]: initial-guess strategies

pub mod boundary;
pub mod config;
pub mod constraints;
pub mod guess;
pub mod layout;
pub mod objective;
pub mod planner;
pub mod solver;
pub mod trajectory;

// Re-exports
pub use config::PlannerConfig;
pub use guess::{GuessContext, GuessStrategy, RandomGuess, SearchSeededGuess, StraightLineGuess};
pub use planner::{CorridorPlanner, PlannerError, SessionState};
pub use trajectory::CorridorTrajectory;

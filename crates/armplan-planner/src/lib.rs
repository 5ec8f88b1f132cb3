//! # armplan planner
//!
//! Cascading motion planner for articulated manipulators. A planning call
//! tries cheap deterministic strategies first and escalates to randomized,
//! constrained or vector-field strategies under one shared wall-clock
//! budget:
//!
//! 1. Snap: direct interpolation, accepted only if fully feasible
//! 2. Bidirectional tree search (RRT-Connect)
//! 3. Constrained tree search (CRRT) with manifold projection
//! 4. Vector-field integration for straight-line end-effector motion
//!
//! # Components
//!
//! - [`config`]: strategy parameters
//! - [`budget`]: shared wall-clock deadline
//! - [`result`]: per-attempt reporting and hard input errors
//! - [`ik`]: inverse-kinematics contract and a damped least-squares solver
//! - [`sampler`]: constrained configuration sampling (region + IK)
//! - [`constraint`]: configuration-space face of a pose constraint
//! - [`strategies`]: the four planning strategies behind one interface
//! - [`cascade`]: planning entry points and the escalation policy

pub mod budget;
pub mod cascade;
pub mod config;
pub mod constraint;
pub mod ik;
pub mod result;
pub mod sampler;
pub mod strategies;

pub use budget::TimeBudget;
pub use cascade::{
    plan_to_configuration, plan_to_configurations, plan_to_end_effector_offset, plan_to_tsr,
    plan_to_tsr_with_constraint,
};
pub use config::{CrrtConfig, IkConfig, RrtConfig, SnapConfig, VectorFieldConfig};
pub use result::{PlanningError, PlanningResult, PlanningStatus};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fork an independent, deterministic RNG stream from `rng`.
pub fn fork_rng(rng: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(rng.gen())
}

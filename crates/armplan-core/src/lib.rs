//! # armplan core
//!
//! Building blocks for manipulator motion planning:
//!
//! - [`statespace`]: configuration-space contracts (metric, interpolation,
//!   sampling) and the shipped joint space
//! - [`trajectory`]: time-stamped waypoint trajectories with interpolated
//!   evaluation and derivative queries
//! - [`tsr`]: task-space regions, pose constraints that can be sampled and
//!   projected onto
//! - [`geometry`]: frame construction and offset-goal synthesis
//! - [`kinematics`]: skeleton contracts, forward-kinematics fixtures and the
//!   scoped configuration saver

pub mod geometry;
pub mod kinematics;
pub mod statespace;
pub mod trajectory;
pub mod tsr;

use nalgebra::{Isometry3, Matrix3, Vector3, Vector6};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// Rigid-body transform (SE(3) pose)
pub type Pose = Isometry3<f64>;

/// Spatial vector: linear components first, angular components last
pub type SpatialVector = Vector6<f64>;

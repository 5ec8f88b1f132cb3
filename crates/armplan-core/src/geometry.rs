//! Geometric utilities
//!
//! Frame construction and the offset-goal synthesis used by the
//! end-effector-offset planner: a "look-at" frame whose z-axis points along
//! the travel direction, plus the goal/constraint region pair describing an
//! exact target offset and the corridor leading to it.

use nalgebra::{Translation3, UnitQuaternion, Vector3};
use thiserror::Error;

use crate::tsr::{Tsr, TsrError};
use crate::{Pose, Vec3};

/// Geometry construction errors
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("direction vector has zero length")]
    ZeroDirectionVector,
    #[error(transparent)]
    InvalidRegion(#[from] TsrError),
}

const ZERO_DIRECTION_EPSILON: f64 = 1e-9;

/// Frame anchored at `origin` with its z-axis aligned to `direction`.
pub fn look_at_isometry(origin: &Vec3, direction: &Vec3) -> Result<Pose, GeometryError> {
    if direction.norm() < ZERO_DIRECTION_EPSILON {
        return Err(GeometryError::ZeroDirectionVector);
    }
    let rotation = UnitQuaternion::rotation_between(&Vector3::z(), direction)
        // Antiparallel direction: any half-turn perpendicular to z works.
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI));
    Ok(Pose::from_parts(Translation3::from(*origin), rotation))
}

/// Goal and constraint regions for translating an end-effector by
/// `distance` along `direction`.
///
/// The goal region has zero-width bounds at the exact target offset. The
/// constraint region allows `position_tolerance` laterally, the
/// `[0, distance]` corridor along travel (the region z-axis), and a
/// symmetric `angular_tolerance` on all three rotational axes.
///
/// `direction` need not be normalized, but must be non-zero; `distance` is
/// expected non-negative (callers canonicalize a negative distance by
/// flipping the direction first).
pub fn offset_goal_and_constraint(
    ee_pose: &Pose,
    direction: &Vec3,
    distance: f64,
    position_tolerance: f64,
    angular_tolerance: f64,
) -> Result<(Tsr, Tsr), GeometryError> {
    // Region frame w sits at the end-effector with z along the travel
    // direction.
    let h_world_w = look_at_isometry(&ee_pose.translation.vector, direction)?;
    let h_w_ee = h_world_w.inverse() * ee_pose;

    let h_w_end = Pose::translation(0.0, 0.0, distance);

    let goal = Tsr::new(h_world_w * h_w_end, h_w_ee, [[0.0; 2]; 6])?;

    let constraint = Tsr::new(
        h_world_w,
        h_w_ee,
        [
            [-position_tolerance, position_tolerance],
            [-position_tolerance, position_tolerance],
            [0.0, distance],
            [-angular_tolerance, angular_tolerance],
            [-angular_tolerance, angular_tolerance],
            [-angular_tolerance, angular_tolerance],
        ],
    )?;

    Ok((goal, constraint))
}

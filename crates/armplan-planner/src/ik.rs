//! Inverse kinematics
//!
//! [`IkSolver`] is the contract the constrained sampler and the goal
//! machinery consume; solutions may fail nondeterministically depending on
//! the seed. [`JacobianIk`] is the shipped damped least-squares solver.

use armplan_core::kinematics::{FrameId, Kinematics};
use armplan_core::{Pose, SpatialVector};
use nalgebra::{DMatrix, DVector};

use crate::config::IkConfig;

/// Solver mapping a target pose to a joint configuration.
pub trait IkSolver<K: Kinematics + ?Sized> {
    /// Solve for `frame` reaching `target`, starting from `seed`. Returns
    /// `None` when this seed does not converge; callers retry with fresh
    /// seeds.
    fn solve(
        &self,
        skeleton: &mut K,
        frame: FrameId,
        target: &Pose,
        seed: &DVector<f64>,
    ) -> Option<DVector<f64>>;
}

/// Damped least-squares (Levenberg-style) iterative solver.
#[derive(Debug, Clone, Default)]
pub struct JacobianIk {
    config: IkConfig,
}

impl JacobianIk {
    pub fn new(config: IkConfig) -> Self {
        Self { config }
    }
}

impl<K: Kinematics + ?Sized> IkSolver<K> for JacobianIk {
    fn solve(
        &self,
        skeleton: &mut K,
        frame: FrameId,
        target: &Pose,
        seed: &DVector<f64>,
    ) -> Option<DVector<f64>> {
        let (lower, upper) = skeleton.position_limits();
        let mut q = seed.clone();

        for _ in 0..self.config.max_iterations {
            skeleton.set_positions(&q);
            let pose = skeleton.frame_transform(frame);
            let error = pose_error(&pose, target);
            if error.norm() <= self.config.tolerance {
                return Some(q);
            }

            let jacobian = skeleton.frame_jacobian(frame);
            let step = damped_least_squares(&jacobian, &error, self.config.damping);
            if step.norm() < 1e-12 {
                return None;
            }
            q += step;
            for i in 0..q.len() {
                q[i] = q[i].clamp(lower[i], upper[i]);
            }
        }
        None
    }
}

/// Spatial error moving `current` toward `target`: translational delta
/// first, then the rotational delta as a scaled axis.
pub(crate) fn pose_error(current: &Pose, target: &Pose) -> SpatialVector {
    let linear = target.translation.vector - current.translation.vector;
    let angular = (target.rotation * current.rotation.inverse()).scaled_axis();
    SpatialVector::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
}

/// Joint step solving `J dq = e` in the damped least-squares sense:
/// `dq = J^T (J J^T + λ² I)^-1 e`.
pub(crate) fn damped_least_squares(
    jacobian: &DMatrix<f64>,
    error: &SpatialVector,
    damping: f64,
) -> DVector<f64> {
    let jt = jacobian.transpose();
    let mut jjt = jacobian * &jt;
    for i in 0..6 {
        jjt[(i, i)] += damping * damping;
    }
    let rhs = DVector::from_column_slice(error.as_slice());
    match jjt.lu().solve(&rhs) {
        Some(solution) => jt * solution,
        None => DVector::zeros(jacobian.ncols()),
    }
}

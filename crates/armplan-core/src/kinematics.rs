//! Skeleton contracts
//!
//! [`Kinematics`] is the narrow interface the planner consumes from a
//! skeleton backend: joint positions, limits, and forward kinematics of a
//! named frame. [`ConfigurationSaver`] scopes any mutation of the live
//! configuration, restoring it on every exit path. [`PlanarChain`] is a
//! small analytic chain used to exercise the stack.

use std::ops::{Deref, DerefMut};

use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};

use crate::{Pose, Vec3};

/// Opaque handle for a skeleton frame (e.g. an end-effector body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId(pub usize);

/// Articulated kinematic structure.
///
/// Frame Jacobians are 6 x n in the world frame, linear rows first,
/// matching [`crate::SpatialVector`].
pub trait Kinematics {
    fn num_joints(&self) -> usize;

    /// Current joint positions.
    fn positions(&self) -> DVector<f64>;

    /// Overwrite the joint positions.
    fn set_positions(&mut self, positions: &DVector<f64>);

    /// Per-joint `(lower, upper)` position limits.
    fn position_limits(&self) -> (DVector<f64>, DVector<f64>);

    /// World transform of `frame` at the current positions.
    fn frame_transform(&self, frame: FrameId) -> Pose;

    /// World-frame Jacobian of `frame` at the current positions.
    fn frame_jacobian(&self, frame: FrameId) -> DMatrix<f64>;
}

/// Scoped save/restore of a skeleton's configuration.
///
/// Records the live joint positions on construction and writes them back on
/// drop, so planning never leaves the shared skeleton mutated regardless of
/// how the scope exits.
pub struct ConfigurationSaver<'a, K: Kinematics + ?Sized> {
    skeleton: &'a mut K,
    saved: DVector<f64>,
}

impl<'a, K: Kinematics + ?Sized> ConfigurationSaver<'a, K> {
    pub fn new(skeleton: &'a mut K) -> Self {
        let saved = skeleton.positions();
        Self { skeleton, saved }
    }

    /// The configuration that will be restored on drop.
    pub fn saved_positions(&self) -> &DVector<f64> {
        &self.saved
    }
}

impl<K: Kinematics + ?Sized> Deref for ConfigurationSaver<'_, K> {
    type Target = K;

    fn deref(&self) -> &K {
        self.skeleton
    }
}

impl<K: Kinematics + ?Sized> DerefMut for ConfigurationSaver<'_, K> {
    fn deref_mut(&mut self) -> &mut K {
        self.skeleton
    }
}

impl<K: Kinematics + ?Sized> Drop for ConfigurationSaver<'_, K> {
    fn drop(&mut self) {
        let saved = self.saved.clone();
        self.skeleton.set_positions(&saved);
    }
}

/// Serial chain of revolute joints rotating about the world z-axis.
///
/// Link `i` extends `link_lengths[i]` along its local x-axis; frame `i` is
/// the distal end of link `i`. Forward kinematics and Jacobians are
/// analytic, which makes the chain a convenient fixture for inverse
/// kinematics and the constrained planners.
#[derive(Debug, Clone)]
pub struct PlanarChain {
    link_lengths: Vec<f64>,
    positions: DVector<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl PlanarChain {
    /// Chain with the given link lengths and ±π joint limits.
    pub fn new(link_lengths: Vec<f64>) -> Self {
        let n = link_lengths.len();
        Self {
            link_lengths,
            positions: DVector::zeros(n),
            lower: DVector::from_element(n, -std::f64::consts::PI),
            upper: DVector::from_element(n, std::f64::consts::PI),
        }
    }

    pub fn with_limits(mut self, lower: DVector<f64>, upper: DVector<f64>) -> Self {
        assert_eq!(lower.len(), self.link_lengths.len());
        assert_eq!(upper.len(), self.link_lengths.len());
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Frame of the last link's distal end.
    pub fn end_effector(&self) -> FrameId {
        FrameId(self.link_lengths.len() - 1)
    }

    /// Joint origins and cumulative angles for a configuration.
    fn joint_origins(&self, positions: &DVector<f64>) -> (Vec<Vec3>, Vec<f64>) {
        let n = self.link_lengths.len();
        let mut origins = Vec::with_capacity(n + 1);
        let mut angles = Vec::with_capacity(n);
        let mut point = Vec3::zeros();
        let mut angle = 0.0;
        origins.push(point);
        for i in 0..n {
            angle += positions[i];
            angles.push(angle);
            point += Vec3::new(
                self.link_lengths[i] * angle.cos(),
                self.link_lengths[i] * angle.sin(),
                0.0,
            );
            origins.push(point);
        }
        (origins, angles)
    }

    /// World transform of `frame` for an explicit configuration, without
    /// touching the stored positions.
    pub fn frame_transform_at(&self, positions: &DVector<f64>, frame: FrameId) -> Pose {
        let (origins, angles) = self.joint_origins(positions);
        let index = frame.0.min(self.link_lengths.len() - 1);
        Pose::from_parts(
            origins[index + 1].into(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles[index]),
        )
    }
}

impl Kinematics for PlanarChain {
    fn num_joints(&self) -> usize {
        self.link_lengths.len()
    }

    fn positions(&self) -> DVector<f64> {
        self.positions.clone()
    }

    fn set_positions(&mut self, positions: &DVector<f64>) {
        self.positions.copy_from(positions);
    }

    fn position_limits(&self) -> (DVector<f64>, DVector<f64>) {
        (self.lower.clone(), self.upper.clone())
    }

    fn frame_transform(&self, frame: FrameId) -> Pose {
        self.frame_transform_at(&self.positions, frame)
    }

    fn frame_jacobian(&self, frame: FrameId) -> DMatrix<f64> {
        let n = self.link_lengths.len();
        let index = frame.0.min(n - 1);
        let (origins, _) = self.joint_origins(&self.positions);
        let tip = origins[index + 1];
        let z = Vec3::z();

        let mut jacobian = DMatrix::zeros(6, n);
        for joint in 0..=index {
            let arm = tip - origins[joint];
            let linear = z.cross(&arm);
            for row in 0..3 {
                jacobian[(row, joint)] = linear[row];
                jacobian[(row + 3, joint)] = z[row];
            }
        }
        jacobian
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_straight_chain_forward_kinematics() {
        let chain = PlanarChain::new(vec![1.0, 1.0, 0.5]);
        let pose = chain.frame_transform(chain.end_effector());
        assert_relative_eq!(pose.translation.vector, Vec3::new(2.5, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bent_chain_forward_kinematics() {
        let mut chain = PlanarChain::new(vec![1.0, 1.0]);
        chain.set_positions(&DVector::from_vec(vec![FRAC_PI_2, -FRAC_PI_2]));

        // First link points up, second link bends back to horizontal.
        let pose = chain.frame_transform(chain.end_effector());
        assert_relative_eq!(pose.translation.vector, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-12);

        let elbow = chain.frame_transform(FrameId(0));
        assert_relative_eq!(elbow.translation.vector, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let mut chain = PlanarChain::new(vec![0.8, 0.6, 0.4]);
        let q = DVector::from_vec(vec![0.3, -0.4, 0.7]);
        chain.set_positions(&q);

        let frame = chain.end_effector();
        let jacobian = chain.frame_jacobian(frame);
        let pose = chain.frame_transform(frame);

        let h = 1e-7;
        for joint in 0..3 {
            let mut dq = q.clone();
            dq[joint] += h;
            let perturbed = chain.frame_transform_at(&dq, frame);
            let numeric = (perturbed.translation.vector - pose.translation.vector) / h;
            for row in 0..3 {
                assert_relative_eq!(jacobian[(row, joint)], numeric[row], epsilon = 1e-5);
            }
            // Revolute joints about z contribute unit angular velocity.
            assert_relative_eq!(jacobian[(5, joint)], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_configuration_saver_restores_on_drop() {
        let mut chain = PlanarChain::new(vec![1.0, 1.0]);
        let original = DVector::from_vec(vec![0.2, -0.3]);
        chain.set_positions(&original);

        {
            let mut saver = ConfigurationSaver::new(&mut chain);
            saver.set_positions(&DVector::from_vec(vec![1.0, 1.0]));
            assert_relative_eq!(saver.positions()[0], 1.0, epsilon = 1e-12);
        }

        assert_relative_eq!(chain.positions(), original, epsilon = 1e-12);
    }

    #[test]
    fn test_configuration_saver_restores_after_panic() {
        let mut chain = PlanarChain::new(vec![1.0]);
        let original = DVector::from_vec(vec![0.5]);
        chain.set_positions(&original);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut saver = ConfigurationSaver::new(&mut chain);
            saver.set_positions(&DVector::from_vec(vec![2.0]));
            panic!("planner blew up");
        }));
        assert!(result.is_err());
        assert_relative_eq!(chain.positions(), original, epsilon = 1e-12);
    }
}

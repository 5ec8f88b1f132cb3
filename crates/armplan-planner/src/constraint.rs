//! Configuration-space face of a pose constraint
//!
//! The constrained tree search works on joint configurations, but the
//! constraint is stated over a frame's pose. [`FrameConstraint`] bridges the
//! two: it tests a configuration through forward kinematics and projects an
//! off-manifold configuration back with Newton iterations through the frame
//! Jacobian.

use armplan_core::kinematics::{FrameId, Kinematics};
use armplan_core::tsr::PoseConstraint;
use nalgebra::DVector;

use crate::ik::{damped_least_squares, pose_error};

/// A pose region evaluated and projected in configuration space.
pub struct FrameConstraint<'a> {
    region: &'a dyn PoseConstraint,
    frame: FrameId,
    tolerance: f64,
    max_iterations: usize,
    damping: f64,
}

impl<'a> FrameConstraint<'a> {
    pub fn new(
        region: &'a dyn PoseConstraint,
        frame: FrameId,
        tolerance: f64,
        max_iterations: usize,
        damping: f64,
    ) -> Self {
        Self {
            region,
            frame,
            tolerance,
            max_iterations,
            damping,
        }
    }

    /// Whether the frame pose at `positions` satisfies the region.
    pub fn is_satisfied<K: Kinematics + ?Sized>(
        &self,
        skeleton: &mut K,
        positions: &DVector<f64>,
    ) -> bool {
        self.is_satisfied_within(skeleton, positions, self.tolerance)
    }

    /// Like [`Self::is_satisfied`], with an explicit violation tolerance.
    pub fn is_satisfied_within<K: Kinematics + ?Sized>(
        &self,
        skeleton: &mut K,
        positions: &DVector<f64>,
        tolerance: f64,
    ) -> bool {
        skeleton.set_positions(positions);
        let pose = skeleton.frame_transform(self.frame);
        self.region.is_satisfied(&pose, tolerance)
    }

    /// Project `positions` onto the constraint manifold.
    ///
    /// Newton iteration: compute the frame pose, clamp its displacement
    /// onto the region bounds to get a target pose, and take a damped
    /// least-squares step toward it. Returns `None` when the iteration does
    /// not converge within the cap.
    pub fn project<K: Kinematics + ?Sized>(
        &self,
        skeleton: &mut K,
        positions: &DVector<f64>,
    ) -> Option<DVector<f64>> {
        let (lower, upper) = skeleton.position_limits();
        let bounds = self.region.bounds();
        let mut q = positions.clone();

        for _ in 0..self.max_iterations {
            skeleton.set_positions(&q);
            let pose = skeleton.frame_transform(self.frame);
            if self.region.is_satisfied(&pose, self.tolerance) {
                return Some(q);
            }

            let mut displacement = self.region.displacement(&pose);
            for axis in 0..6 {
                let [min, max] = bounds[axis];
                displacement[axis] = displacement[axis].clamp(min, max);
            }
            let target = self.region.recompose(&displacement);

            let error = pose_error(&pose, &target);
            let jacobian = skeleton.frame_jacobian(self.frame);
            let step = damped_least_squares(&jacobian, &error, self.damping);
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

#[cfg(test)]
mod tests {
    use super::*;
    use armplan_core::kinematics::PlanarChain;
    use armplan_core::tsr::Tsr;
    use armplan_core::Pose;

    fn corridor_along_x() -> Tsr {
        // End effector must stay within a thin band around y = 0, any x.
        Tsr::new(
            Pose::identity(),
            Pose::identity(),
            [
                [-10.0, 10.0],
                [-0.01, 0.01],
                [-0.01, 0.01],
                [-10.0, 10.0],
                [-10.0, 10.0],
                [-10.0, 10.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_satisfied_configuration_passes() {
        let mut chain = PlanarChain::new(vec![1.0, 1.0]);
        let region = corridor_along_x();
        let constraint = FrameConstraint::new(&region, chain.end_effector(), 1e-3, 20, 0.05);

        // Straight chain: end effector at (2, 0, 0), inside the band.
        assert!(constraint.is_satisfied(&mut chain, &DVector::zeros(2)));

        // Bent chain leaves the band.
        let bent = DVector::from_vec(vec![0.6, 0.0]);
        assert!(!constraint.is_satisfied(&mut chain, &bent));
    }

    #[test]
    fn test_projection_pulls_configuration_onto_manifold() {
        let mut chain = PlanarChain::new(vec![1.0, 1.0]);
        let region = corridor_along_x();
        let frame = chain.end_effector();
        let constraint = FrameConstraint::new(&region, frame, 1e-3, 50, 0.05);

        let off = DVector::from_vec(vec![0.2, -0.1]);
        let projected = constraint
            .project(&mut chain, &off)
            .expect("projection should converge from a nearby configuration");

        let pose = chain.frame_transform_at(&projected, frame);
        assert!(pose.translation.y.abs() <= 0.02);
    }

    #[test]
    fn test_projection_is_identity_on_manifold() {
        let mut chain = PlanarChain::new(vec![1.0, 1.0]);
        let region = corridor_along_x();
        let constraint = FrameConstraint::new(&region, chain.end_effector(), 1e-3, 20, 0.05);

        let on = DVector::zeros(2);
        let projected = constraint.project(&mut chain, &on).unwrap();
        assert!((projected - on).norm() < 1e-12);
    }
}

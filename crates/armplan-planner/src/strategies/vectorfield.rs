//! Vector-field integration for straight-line frame motion
//!
//! Integrates joint velocities that move a frame along a fixed world
//! direction while servoing lateral and angular drift back to zero. The
//! integration fails as soon as the frame leaves its tolerance tube, a
//! joint approaches its limits or an intermediate configuration is
//! infeasible; a failure past the minimum distance still yields a
//! truncated trajectory.

use std::sync::Arc;

use armplan_core::kinematics::{FrameId, Kinematics};
use armplan_core::statespace::{LinearInterpolator, StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;
use armplan_core::{SpatialVector, Vec3};
use nalgebra::DVector;

use crate::budget::TimeBudget;
use crate::config::VectorFieldConfig;
use crate::ik::damped_least_squares;
use crate::result::{PlanningResult, PlanningStatus};
use crate::strategies::PlanningStrategy;

/// Proportional gain on the drift-correcting twist components.
const CORRECTION_GAIN: f64 = 4.0;

const DLS_DAMPING: f64 = 0.05;

pub struct VectorFieldStrategy<'a, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    space: Arc<S>,
    skeleton: &'a mut K,
    frame: FrameId,
    /// Unit world-frame motion direction.
    direction: Vec3,
    /// Requested travel, strictly positive.
    distance: f64,
    validator: &'a V,
    config: VectorFieldConfig,
}

impl<'a, S, K, V> VectorFieldStrategy<'a, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    pub fn new(
        space: Arc<S>,
        skeleton: &'a mut K,
        frame: FrameId,
        direction: Vec3,
        distance: f64,
        validator: &'a V,
        config: VectorFieldConfig,
    ) -> Self {
        Self {
            space,
            skeleton,
            frame,
            direction,
            distance,
            validator,
            config,
        }
    }

    fn make_trajectory(&self, waypoints: Vec<(f64, DVector<f64>)>) -> Trajectory<S> {
        let mut trajectory = Trajectory::new(Arc::clone(&self.space), LinearInterpolator);
        for (t, state) in waypoints {
            trajectory.add_waypoint(t, state);
        }
        trajectory
    }

    /// Close out the integration after a failure: a truncated success if
    /// the motion already covered the minimum distance, otherwise `None`
    /// with the failure recorded.
    fn finish(
        &self,
        waypoints: Vec<(f64, DVector<f64>)>,
        displacement: f64,
        failure: PlanningStatus,
        message: &str,
        result: &mut PlanningResult,
    ) -> Option<Trajectory<S>> {
        let min_distance = self.distance - self.config.negative_distance_tolerance;
        if displacement >= min_distance && waypoints.len() >= 2 {
            result.set(PlanningStatus::Succeeded, None);
            return Some(self.make_trajectory(waypoints));
        }
        result.set(failure, Some(message.to_string()));
        None
    }
}

impl<S, K, V> PlanningStrategy<S> for VectorFieldStrategy<'_, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    fn name(&self) -> &'static str {
        "vector-field"
    }

    fn plan(&mut self, budget: &TimeBudget, result: &mut PlanningResult) -> Option<Trajectory<S>> {
        let (lower, upper) = self.skeleton.position_limits();
        let mut q = self.skeleton.positions();
        let start_pose = self.skeleton.frame_transform(self.frame);
        let start_position = start_pose.translation.vector;
        let start_rotation = start_pose.rotation;

        let dt = self.config.initial_step_size;
        let max_distance = self.distance + self.config.positive_distance_tolerance;
        // Unit-speed integration plus slack for the servoed corrections.
        let max_steps = (4.0 * max_distance / dt).ceil() as usize + 100;

        let mut waypoints = vec![(0.0, q.clone())];
        let mut displacement = 0.0;
        let mut last_checked = 0.0;

        for step in 0..max_steps {
            if budget.is_exhausted() {
                return self.finish(
                    waypoints,
                    displacement,
                    PlanningStatus::BudgetExhausted,
                    "budget expired during integration",
                    result,
                );
            }

            self.skeleton.set_positions(&q);
            let pose = self.skeleton.frame_transform(self.frame);
            let delta = pose.translation.vector - start_position;
            displacement = delta.dot(&self.direction);
            let lateral = delta - self.direction * displacement;
            let angular_drift = (start_rotation * pose.rotation.inverse()).scaled_axis();

            if lateral.norm() > self.config.position_tolerance
                || angular_drift.norm() > self.config.angular_tolerance
            {
                return self.finish(
                    waypoints,
                    displacement,
                    PlanningStatus::ProjectionFailed,
                    "frame drifted outside the motion tolerance tube",
                    result,
                );
            }

            if displacement >= self.distance {
                result.set(PlanningStatus::Succeeded, None);
                return Some(self.make_trajectory(waypoints));
            }

            // Unit speed along the direction, proportional servo on drift.
            let linear = self.direction - lateral * CORRECTION_GAIN;
            let angular = angular_drift * CORRECTION_GAIN;
            let twist = SpatialVector::new(
                linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
            );

            let jacobian = self.skeleton.frame_jacobian(self.frame);
            let velocity = damped_least_squares(&jacobian, &twist, DLS_DAMPING);
            let next = &q + velocity * dt;

            let near_limit = (0..next.len()).any(|i| {
                next[i] < lower[i] + self.config.joint_limit_tolerance
                    || next[i] > upper[i] - self.config.joint_limit_tolerance
            });
            if near_limit {
                return self.finish(
                    waypoints,
                    displacement,
                    PlanningStatus::CollisionDetected,
                    "joint limit reached during integration",
                    result,
                );
            }

            if displacement - last_checked >= self.config.constraint_check_resolution {
                last_checked = displacement;
                if !self.space.satisfies_bounds(&next) || !self.validator.is_satisfied(&next) {
                    return self.finish(
                        waypoints,
                        displacement,
                        PlanningStatus::CollisionDetected,
                        "infeasible configuration during integration",
                        result,
                    );
                }
            }

            q = next;
            waypoints.push(((step + 1) as f64 * dt, q.clone()));
        }

        self.finish(
            waypoints,
            displacement,
            PlanningStatus::ConnectionFailed,
            "integration stalled before reaching the requested distance",
            result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armplan_core::kinematics::PlanarChain;
    use armplan_core::statespace::JointSpace;
    use std::time::Duration;

    fn fixture() -> (PlanarChain, Arc<JointSpace>) {
        let mut chain = PlanarChain::new(vec![1.0, 1.0, 1.0]);
        chain.set_positions(&DVector::from_vec(vec![0.3, -0.6, 0.3]));
        let space = Arc::new(JointSpace::symmetric(3, std::f64::consts::PI));
        (chain, space)
    }

    #[test]
    fn test_vector_field_moves_frame_by_distance() {
        let (mut chain, space) = fixture();
        let frame = chain.end_effector();
        let start_pose = chain.frame_transform(frame);
        let validator = |_: &DVector<f64>| true;

        let distance = 0.2;
        let mut strategy = VectorFieldStrategy::new(
            Arc::clone(&space),
            &mut chain,
            frame,
            -Vec3::x(),
            distance,
            &validator,
            VectorFieldConfig::default(),
        );
        let budget = TimeBudget::new(Duration::from_secs(10));
        let mut result = PlanningResult::default();

        let trajectory = strategy
            .plan(&budget, &mut result)
            .expect("integration should cover the requested distance");
        assert!(result.succeeded());

        let checker = PlanarChain::new(vec![1.0, 1.0, 1.0]);
        let last = trajectory.waypoint(trajectory.num_waypoints() - 1).unwrap();
        let end_pose = checker.frame_transform_at(&last.state, frame);
        let delta = end_pose.translation.vector - start_pose.translation.vector;

        let travelled = delta.dot(&-Vec3::x());
        assert!(travelled >= distance - 0.05, "travelled {}", travelled);
        let lateral = delta + Vec3::x() * travelled;
        assert!(lateral.norm() <= 0.02);
    }

    #[test]
    fn test_vector_field_reports_mid_motion_collision() {
        let (mut chain, space) = fixture();
        let frame = chain.end_effector();
        let start_x = chain.frame_transform(frame).translation.x;

        // A wall in task space: configurations whose end effector has moved
        // more than ~0.3 along -x are infeasible, far short of the request.
        let checker = PlanarChain::new(vec![1.0, 1.0, 1.0]);
        let validator = move |state: &DVector<f64>| {
            checker.frame_transform_at(state, frame).translation.x > start_x - 0.3
        };

        let mut strategy = VectorFieldStrategy::new(
            Arc::clone(&space),
            &mut chain,
            frame,
            -Vec3::x(),
            1.5,
            &validator,
            VectorFieldConfig::default(),
        );
        let budget = TimeBudget::new(Duration::from_secs(10));
        let mut result = PlanningResult::default();

        assert!(strategy.plan(&budget, &mut result).is_none());
        assert_eq!(result.status, PlanningStatus::CollisionDetected);
    }

    #[test]
    fn test_vector_field_truncates_past_minimum_distance() {
        let (mut chain, space) = fixture();
        let frame = chain.end_effector();
        let start_x = chain.frame_transform(frame).translation.x;

        // Same wall, but the caller accepts anything past 0.2 of travel.
        let checker = PlanarChain::new(vec![1.0, 1.0, 1.0]);
        let validator = move |state: &DVector<f64>| {
            checker.frame_transform_at(state, frame).translation.x > start_x - 0.3
        };
        let config = VectorFieldConfig {
            negative_distance_tolerance: 0.2,
            ..VectorFieldConfig::default()
        };

        let mut strategy = VectorFieldStrategy::new(
            Arc::clone(&space),
            &mut chain,
            frame,
            -Vec3::x(),
            0.4,
            &validator,
            config,
        );
        let budget = TimeBudget::new(Duration::from_secs(10));
        let mut result = PlanningResult::default();

        let trajectory = strategy
            .plan(&budget, &mut result)
            .expect("truncated trajectory past the minimum distance");
        assert!(result.succeeded());

        let checker = PlanarChain::new(vec![1.0, 1.0, 1.0]);
        let last = trajectory.waypoint(trajectory.num_waypoints() - 1).unwrap();
        let travelled = start_x - checker.frame_transform_at(&last.state, frame).translation.x;
        assert!(travelled >= 0.2 - 0.05 && travelled < 0.4, "travelled {}", travelled);
    }

    #[test]
    fn test_vector_field_respects_exhausted_budget() {
        let (mut chain, space) = fixture();
        let frame = chain.end_effector();
        let validator = |_: &DVector<f64>| true;

        let mut strategy = VectorFieldStrategy::new(
            space,
            &mut chain,
            frame,
            -Vec3::x(),
            0.2,
            &validator,
            VectorFieldConfig::default(),
        );
        let budget = TimeBudget::new(Duration::ZERO);
        let mut result = PlanningResult::default();

        assert!(strategy.plan(&budget, &mut result).is_none());
        assert_eq!(result.status, PlanningStatus::BudgetExhausted);
    }
}

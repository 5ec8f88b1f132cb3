//! Snap strategy
//!
//! Direct interpolation between start and goal, accepted only when every
//! interpolant is feasible. Deterministic and cheap; always the first stage
//! of a cascade.

use std::sync::Arc;

use armplan_core::statespace::{LinearInterpolator, StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;

use crate::budget::TimeBudget;
use crate::config::SnapConfig;
use crate::result::{PlanningResult, PlanningStatus};
use crate::strategies::{motion_is_valid, PlanningStrategy};

pub struct SnapStrategy<'a, S: StateSpace, V: StateValidator<S::State> + ?Sized> {
    space: Arc<S>,
    start: S::State,
    goal: S::State,
    validator: &'a V,
    config: SnapConfig,
}

impl<'a, S: StateSpace, V: StateValidator<S::State> + ?Sized> SnapStrategy<'a, S, V> {
    pub fn new(
        space: Arc<S>,
        start: S::State,
        goal: S::State,
        validator: &'a V,
        config: SnapConfig,
    ) -> Self {
        Self {
            space,
            start,
            goal,
            validator,
            config,
        }
    }
}

impl<S, V> PlanningStrategy<S> for SnapStrategy<'_, S, V>
where
    S: StateSpace,
    V: StateValidator<S::State> + ?Sized,
{
    fn name(&self) -> &'static str {
        "snap"
    }

    fn plan(&mut self, budget: &TimeBudget, result: &mut PlanningResult) -> Option<Trajectory<S>> {
        if budget.is_exhausted() {
            result.set(PlanningStatus::BudgetExhausted, None);
            return None;
        }
        if !motion_is_valid(
            &*self.space,
            self.validator,
            &self.start,
            &self.goal,
            self.config.resolution,
        ) {
            result.set(
                PlanningStatus::CollisionDetected,
                Some("direct interpolation is infeasible".to_string()),
            );
            return None;
        }

        let mut trajectory = Trajectory::new(Arc::clone(&self.space), LinearInterpolator);
        trajectory.add_waypoint(0.0, self.start.clone());
        trajectory.add_waypoint(1.0, self.goal.clone());
        result.set(PlanningStatus::Succeeded, None);
        Some(trajectory)
    }
}

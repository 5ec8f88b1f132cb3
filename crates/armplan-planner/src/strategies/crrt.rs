//! Constrained bidirectional tree search (CRRT)
//!
//! RRT-Connect where every tree extension is projected back onto a
//! constraint manifold, so the whole path satisfies a pose constraint to
//! within the projection tolerance. Goal configurations come from a
//! constrained sampler; random samples are drawn uniformly and projected
//! onto the manifold before extension.

use std::sync::Arc;

use armplan_core::kinematics::Kinematics;
use armplan_core::statespace::{LinearInterpolator, StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;
use nalgebra::DVector;
use rand::rngs::StdRng;

use crate::budget::TimeBudget;
use crate::config::CrrtConfig;
use crate::constraint::FrameConstraint;
use crate::result::{PlanningResult, PlanningStatus};
use crate::sampler::IkSampleable;
use crate::strategies::{motion_is_valid, PlanningStrategy};

struct Node {
    state: DVector<f64>,
    parent: Option<usize>,
}

pub struct CrrtStrategy<'a, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    space: Arc<S>,
    skeleton: &'a mut K,
    start: DVector<f64>,
    goal_sampler: IkSampleable<'a, K>,
    goal_constraint: FrameConstraint<'a>,
    path_constraint: FrameConstraint<'a>,
    validator: &'a V,
    config: CrrtConfig,
    rng: StdRng,
}

impl<'a, S, K, V> CrrtStrategy<'a, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        space: Arc<S>,
        skeleton: &'a mut K,
        start: DVector<f64>,
        goal_sampler: IkSampleable<'a, K>,
        goal_constraint: FrameConstraint<'a>,
        path_constraint: FrameConstraint<'a>,
        validator: &'a V,
        config: CrrtConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            space,
            skeleton,
            start,
            goal_sampler,
            goal_constraint,
            path_constraint,
            validator,
            config,
            rng,
        }
    }

    /// Draw goal configurations from the sampler, keeping only those on
    /// both the goal region and the path constraint manifold.
    fn collect_goals(&mut self) -> Vec<DVector<f64>> {
        let mut goals = Vec::new();
        let mut generator = self.goal_sampler.create_generator();
        let mut candidate = DVector::zeros(self.space.dimension());

        for _ in 0..self.config.max_num_trials {
            if goals.len() >= self.config.max_num_trials || !generator.can_sample() {
                break;
            }
            if !generator.sample(self.skeleton, &mut self.rng, &mut candidate) {
                break;
            }
            if !self.goal_constraint.is_satisfied(self.skeleton, &candidate) {
                continue;
            }
            if self.space.satisfies_bounds(&candidate)
                && self.validator.is_satisfied(&candidate)
                && self.path_constraint.is_satisfied(self.skeleton, &candidate)
            {
                goals.push(candidate.clone());
            }
        }
        goals
    }

    fn nearest(&self, tree: &[Node], target: &DVector<f64>) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (index, node) in tree.iter().enumerate() {
            let distance = self.space.distance(&node.state, target);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        best
    }

    /// Extend `tree` toward `target` in projected steps.
    ///
    /// Each raw step of at most `max_distance_btw_projections` is projected
    /// back onto the manifold; the step is accepted only if the projection
    /// converged, landed near the raw step, made progress of at least
    /// `min_step_size` toward the target, and the motion to it is feasible.
    fn constrained_extend(&mut self, tree: &mut Vec<Node>, target: &DVector<f64>) -> Option<usize> {
        let mut current_index = self.nearest(tree, target);
        let mut total = 0.0;
        let mut added = None;

        loop {
            let current = tree[current_index].state.clone();
            let remaining = self.space.distance(&current, target);
            if remaining <= self.config.min_tree_connection_distance {
                break;
            }

            let step = remaining.min(self.config.max_distance_btw_projections);
            let alpha = step / remaining;
            let mut raw = self.space.zero_state();
            self.space.interpolate(&current, target, alpha, &mut raw);

            let projected = match self.path_constraint.project(self.skeleton, &raw) {
                Some(projected) => projected,
                None => break,
            };
            if self.space.distance(&projected, &raw) > self.config.max_distance_btw_projections {
                break;
            }
            let progress = self.space.distance(&current, &projected);
            if progress < self.config.min_step_size {
                break;
            }
            if self.space.distance(&projected, target) >= remaining {
                break;
            }
            if !self.space.satisfies_bounds(&projected) || !self.validator.is_satisfied(&projected)
            {
                break;
            }
            if !motion_is_valid(
                &*self.space,
                self.validator,
                &current,
                &projected,
                self.config.min_step_size,
            ) {
                break;
            }

            tree.push(Node {
                state: projected,
                parent: Some(current_index),
            });
            current_index = tree.len() - 1;
            added = Some(current_index);
            total += progress;
            if total >= self.config.max_extension_distance {
                break;
            }
        }
        added
    }

    /// Feasibility sweep over the junction segment between the trees.
    ///
    /// The junction is interpolated straight in joint space: its states
    /// must be collision-free and may sit off the manifold by no more than
    /// one projection step.
    fn junction_is_valid(&mut self, from: &DVector<f64>, to: &DVector<f64>) -> bool {
        if !motion_is_valid(
            &*self.space,
            self.validator,
            from,
            to,
            self.config.min_step_size,
        ) {
            return false;
        }

        let distance = self.space.distance(from, to);
        let steps = (distance / self.config.min_step_size).ceil().max(1.0) as usize;
        let mut scratch = self.space.zero_state();
        for i in 0..=steps {
            let alpha = i as f64 / steps as f64;
            self.space.interpolate(from, to, alpha, &mut scratch);
            if !self.path_constraint.is_satisfied_within(
                self.skeleton,
                &scratch,
                self.config.max_distance_btw_projections,
            ) {
                return false;
            }
        }
        true
    }

    fn path_to_root(tree: &[Node], mut index: usize) -> Vec<DVector<f64>> {
        let mut path = vec![tree[index].state.clone()];
        while let Some(parent) = tree[index].parent {
            index = parent;
            path.push(tree[index].state.clone());
        }
        path
    }

    fn build_trajectory(
        &self,
        start_tree: &[Node],
        start_index: usize,
        goal_tree: &[Node],
        goal_index: usize,
    ) -> Trajectory<S> {
        let mut states = Self::path_to_root(start_tree, start_index);
        states.reverse();
        states.extend(Self::path_to_root(goal_tree, goal_index));

        let mut trajectory = Trajectory::new(Arc::clone(&self.space), LinearInterpolator);
        for (index, state) in states.into_iter().enumerate() {
            trajectory.add_waypoint(index as f64, state);
        }
        trajectory
    }
}

impl<S, K, V> PlanningStrategy<S> for CrrtStrategy<'_, S, K, V>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    fn name(&self) -> &'static str {
        "crrt"
    }

    fn plan(&mut self, budget: &TimeBudget, result: &mut PlanningResult) -> Option<Trajectory<S>> {
        let start = self.start.clone();
        if !self.path_constraint.is_satisfied(self.skeleton, &start) {
            result.set(
                PlanningStatus::ProjectionFailed,
                Some("start configuration is off the constraint manifold".to_string()),
            );
            return None;
        }

        let goals = self.collect_goals();
        if goals.is_empty() {
            result.set(
                PlanningStatus::SamplingExhausted,
                Some("no feasible goal configuration was sampled".to_string()),
            );
            return None;
        }

        let mut tree_a = vec![Node {
            state: start,
            parent: None,
        }];
        let mut tree_b: Vec<Node> = goals
            .into_iter()
            .map(|state| Node {
                state,
                parent: None,
            })
            .collect();
        // Tracks whether tree_a currently grows from the goal side.
        let mut swapped = false;
        let mut target = self.space.zero_state();

        while !budget.is_exhausted() {
            self.space.sample_uniform(&mut self.rng, &mut target);
            let projected_target = match self.path_constraint.project(self.skeleton, &target) {
                Some(projected) => projected,
                None => continue,
            };

            if let Some(index_a) = self.constrained_extend(&mut tree_a, &projected_target) {
                let new_state = tree_a[index_a].state.clone();
                self.constrained_extend(&mut tree_b, &new_state);

                let index_b = self.nearest(&tree_b, &new_state);
                let near_state = tree_b[index_b].state.clone();
                let gap = self.space.distance(&near_state, &new_state);
                if gap <= self.config.min_tree_connection_distance
                    && self.junction_is_valid(&near_state, &new_state)
                {
                    result.set(PlanningStatus::Succeeded, None);
                    let trajectory = if swapped {
                        self.build_trajectory(&tree_b, index_b, &tree_a, index_a)
                    } else {
                        self.build_trajectory(&tree_a, index_a, &tree_b, index_b)
                    };
                    return Some(trajectory);
                }
            }

            std::mem::swap(&mut tree_a, &mut tree_b);
            swapped = !swapped;
        }

        result.set(
            PlanningStatus::ConnectionFailed,
            Some("constrained trees did not connect within the budget".to_string()),
        );
        None
    }
}

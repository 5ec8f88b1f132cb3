//! Bidirectional tree search (RRT-Connect)
//!
//! Two trees grow from start and goal. Each iteration extends one tree a
//! bounded step toward a uniform sample, then greedily connects the other
//! tree toward the new node. Probabilistically complete; runs until the
//! trees touch or the budget runs out.

use std::sync::Arc;

use armplan_core::statespace::{LinearInterpolator, StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;
use rand::rngs::StdRng;

use crate::budget::TimeBudget;
use crate::config::RrtConfig;
use crate::result::{PlanningResult, PlanningStatus};
use crate::strategies::{motion_is_valid, PlanningStrategy};

struct Node<State> {
    state: State,
    parent: Option<usize>,
}

enum Extend {
    Trapped,
    Advanced(usize),
    Reached(usize),
}

pub struct RrtConnect<'a, S: StateSpace, V: StateValidator<S::State> + ?Sized> {
    space: Arc<S>,
    start: S::State,
    goal: S::State,
    validator: &'a V,
    config: RrtConfig,
    rng: StdRng,
}

impl<'a, S: StateSpace, V: StateValidator<S::State> + ?Sized> RrtConnect<'a, S, V> {
    pub fn new(
        space: Arc<S>,
        start: S::State,
        goal: S::State,
        validator: &'a V,
        config: RrtConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            space,
            start,
            goal,
            validator,
            config,
            rng,
        }
    }

    fn nearest(&self, tree: &[Node<S::State>], target: &S::State) -> usize {
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

    /// One bounded extension of `tree` toward `target`.
    fn extend(&self, tree: &mut Vec<Node<S::State>>, target: &S::State) -> Extend {
        let nearest = self.nearest(tree, target);
        let distance = self.space.distance(&tree[nearest].state, target);
        if distance <= self.config.connection_distance {
            return Extend::Reached(nearest);
        }

        let alpha = (self.config.max_extension / distance).min(1.0);
        let mut new_state = self.space.zero_state();
        self.space
            .interpolate(&tree[nearest].state, target, alpha, &mut new_state);

        if !motion_is_valid(
            &*self.space,
            self.validator,
            &tree[nearest].state,
            &new_state,
            self.config.collision_resolution,
        ) {
            return Extend::Trapped;
        }

        let remaining = self.space.distance(&new_state, target);
        tree.push(Node {
            state: new_state,
            parent: Some(nearest),
        });
        let index = tree.len() - 1;
        if remaining <= self.config.connection_distance {
            Extend::Reached(index)
        } else {
            Extend::Advanced(index)
        }
    }

    /// Greedy repeated extension until reaching `target` or getting stuck.
    fn connect(&self, tree: &mut Vec<Node<S::State>>, target: &S::State) -> Extend {
        loop {
            match self.extend(tree, target) {
                Extend::Advanced(_) => continue,
                outcome => return outcome,
            }
        }
    }

    fn path_to_root(&self, tree: &[Node<S::State>], mut index: usize) -> Vec<S::State> {
        let mut path = vec![tree[index].state.clone()];
        while let Some(parent) = tree[index].parent {
            index = parent;
            path.push(tree[index].state.clone());
        }
        path
    }

    fn build_trajectory(
        &self,
        start_tree: &[Node<S::State>],
        start_index: usize,
        goal_tree: &[Node<S::State>],
        goal_index: usize,
    ) -> Trajectory<S> {
        let mut states = self.path_to_root(start_tree, start_index);
        states.reverse();
        states.extend(self.path_to_root(goal_tree, goal_index));

        let mut trajectory = Trajectory::new(Arc::clone(&self.space), LinearInterpolator);
        for (index, state) in states.into_iter().enumerate() {
            trajectory.add_waypoint(index as f64, state);
        }
        trajectory
    }
}

impl<S, V> PlanningStrategy<S> for RrtConnect<'_, S, V>
where
    S: StateSpace,
    V: StateValidator<S::State> + ?Sized,
{
    fn name(&self) -> &'static str {
        "rrt-connect"
    }

    fn plan(&mut self, budget: &TimeBudget, result: &mut PlanningResult) -> Option<Trajectory<S>> {
        if !self.validator.is_satisfied(&self.start) || !self.validator.is_satisfied(&self.goal) {
            result.set(
                PlanningStatus::CollisionDetected,
                Some("start or goal configuration is infeasible".to_string()),
            );
            return None;
        }

        let mut tree_a = vec![Node {
            state: self.start.clone(),
            parent: None,
        }];
        let mut tree_b = vec![Node {
            state: self.goal.clone(),
            parent: None,
        }];
        // Tracks whether tree_a currently grows from the goal.
        let mut swapped = false;
        let mut target = self.space.zero_state();

        while !budget.is_exhausted() {
            self.space.sample_uniform(&mut self.rng, &mut target);

            let extended = match self.extend(&mut tree_a, &target) {
                Extend::Trapped => None,
                Extend::Advanced(index) | Extend::Reached(index) => Some(index),
            };

            if let Some(index_a) = extended {
                let new_state = tree_a[index_a].state.clone();
                if let Extend::Reached(index_b) = self.connect(&mut tree_b, &new_state) {
                    // The junction between the trees becomes a real segment
                    // of the returned path; it gets the same sweep as every
                    // extension before the connection is accepted.
                    if !motion_is_valid(
                        &*self.space,
                        self.validator,
                        &tree_b[index_b].state,
                        &new_state,
                        self.config.collision_resolution,
                    ) {
                        std::mem::swap(&mut tree_a, &mut tree_b);
                        swapped = !swapped;
                        continue;
                    }
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
            Some("trees did not connect within the budget".to_string()),
        );
        None
    }
}

//! Planning entry points and the escalation policy
//!
//! Every entry point locks the shared skeleton for the whole call, scopes
//! its mutations with a [`ConfigurationSaver`], reads the start state from
//! the live joint positions and runs an ordered list of strategies under a
//! single wall-clock budget. Malformed input raises a [`PlanningError`];
//! every convergence failure comes back as `Ok(None)`.

use std::sync::Arc;
use std::time::Duration;

use armplan_core::geometry::{offset_goal_and_constraint, GeometryError};
use armplan_core::kinematics::{ConfigurationSaver, FrameId, Kinematics};
use armplan_core::statespace::{StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;
use armplan_core::tsr::{CyclicTsr, Tsr};
use armplan_core::Vec3;
use nalgebra::DVector;
use parking_lot::Mutex;
use rand::rngs::StdRng;

use crate::budget::TimeBudget;
use crate::config::{CrrtConfig, IkConfig, RrtConfig, SnapConfig, VectorFieldConfig};
use crate::constraint::FrameConstraint;
use crate::fork_rng;
use crate::ik::JacobianIk;
use crate::result::{PlanningError, PlanningResult};
use crate::sampler::IkSampleable;
use crate::strategies::{
    CrrtStrategy, PlanningStrategy, RrtConnect, SnapStrategy, VectorFieldStrategy,
};

/// Goal samples given to the snap-only phase of region planning.
const MAX_SNAP_SAMPLES: usize = 100;

/// Inverse-kinematics attempts per drawn region pose.
const MAX_IK_TRIALS: usize = 10;

/// Snap first, then bidirectional tree search, under one budget.
fn snap_then_rrt<S, V>(
    space: &Arc<S>,
    start: &S::State,
    goal: &S::State,
    validator: &V,
    budget: &TimeBudget,
    rng: &mut StdRng,
) -> Option<Trajectory<S>>
where
    S: StateSpace,
    V: StateValidator<S::State> + ?Sized,
{
    let mut result = PlanningResult::default();
    let mut strategies: Vec<Box<dyn PlanningStrategy<S> + '_>> = vec![
        Box::new(SnapStrategy::new(
            Arc::clone(space),
            start.clone(),
            goal.clone(),
            validator,
            SnapConfig::default(),
        )),
        Box::new(RrtConnect::new(
            Arc::clone(space),
            start.clone(),
            goal.clone(),
            validator,
            RrtConfig::default(),
            fork_rng(rng),
        )),
    ];

    for strategy in &mut strategies {
        if budget.is_exhausted() {
            break;
        }
        if let Some(trajectory) = strategy.plan(budget, &mut result) {
            log::debug!("strategy {} succeeded", strategy.name());
            return Some(trajectory);
        }
        log::debug!(
            "strategy {} failed ({:?}), escalating",
            strategy.name(),
            result.status
        );
    }
    None
}

/// Plan from the skeleton's current configuration to `goal`.
pub fn plan_to_configuration<S, K, V>(
    space: &Arc<S>,
    skeleton: &Mutex<K>,
    goal: &S::State,
    validator: &V,
    rng: &mut StdRng,
    time_limit: Duration,
) -> Result<Option<Trajectory<S>>, PlanningError>
where
    S: StateSpace,
    K: Kinematics + ?Sized,
    V: StateValidator<S::State> + ?Sized,
{
    if !space.satisfies_bounds(goal) {
        return Err(PlanningError::InvalidParameter(
            "goal configuration violates the space bounds",
        ));
    }

    let mut guard = skeleton.lock();
    let saver = ConfigurationSaver::new(&mut *guard);
    let mut start = space.zero_state();
    space.from_vector(saver.saved_positions(), &mut start);

    let budget = TimeBudget::new(time_limit);
    Ok(snap_then_rrt(space, &start, goal, validator, &budget, rng))
}

/// Plan from the current configuration to the first reachable of `goals`,
/// tried in order under one shared budget.
pub fn plan_to_configurations<S, K, V>(
    space: &Arc<S>,
    skeleton: &Mutex<K>,
    goals: &[S::State],
    validator: &V,
    rng: &mut StdRng,
    time_limit: Duration,
) -> Result<Option<Trajectory<S>>, PlanningError>
where
    S: StateSpace,
    K: Kinematics + ?Sized,
    V: StateValidator<S::State> + ?Sized,
{
    for goal in goals {
        if !space.satisfies_bounds(goal) {
            return Err(PlanningError::InvalidParameter(
                "goal configuration violates the space bounds",
            ));
        }
    }

    let mut guard = skeleton.lock();
    let saver = ConfigurationSaver::new(&mut *guard);
    let mut start = space.zero_state();
    space.from_vector(saver.saved_positions(), &mut start);

    let budget = TimeBudget::new(time_limit);
    for goal in goals {
        if budget.is_exhausted() {
            break;
        }
        if let Some(trajectory) = snap_then_rrt(space, &start, goal, validator, &budget, rng) {
            return Ok(Some(trajectory));
        }
    }
    Ok(None)
}

/// Plan to any configuration placing `frame` on the region `tsr`.
///
/// Runs a snap-only phase over up to [`MAX_SNAP_SAMPLES`] goal samples,
/// then restarts the clock and splits it into `max_num_trials` slices, each
/// running the full snap-then-tree cascade against a fresh goal sample.
#[allow(clippy::too_many_arguments)]
pub fn plan_to_tsr<S, K, V>(
    space: &Arc<S>,
    skeleton: &Mutex<K>,
    frame: FrameId,
    tsr: &Tsr,
    validator: &V,
    max_num_trials: usize,
    rng: &mut StdRng,
    time_limit: Duration,
) -> Result<Option<Trajectory<S>>, PlanningError>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    if max_num_trials == 0 {
        return Err(PlanningError::InvalidParameter(
            "max_num_trials must be positive",
        ));
    }

    let mut guard = skeleton.lock();
    let mut saver = ConfigurationSaver::new(&mut *guard);
    let start = saver.saved_positions().clone();

    let solver = JacobianIk::new(IkConfig::default());
    let sampleable = IkSampleable::new(tsr, &solver, frame, MAX_IK_TRIALS);
    let mut generator = sampleable.create_generator();
    let mut goal = DVector::zeros(space.dimension());

    // Snap-only phase: cheap attempts against many goal samples.
    let budget = TimeBudget::new(time_limit);
    for _ in 0..MAX_SNAP_SAMPLES {
        if budget.is_exhausted() || !generator.can_sample() {
            break;
        }
        saver.set_positions(&start);
        if !generator.sample(&mut *saver, rng, &mut goal) {
            break;
        }
        if !space.satisfies_bounds(&goal) {
            continue;
        }

        let mut result = PlanningResult::default();
        let mut snap = SnapStrategy::new(
            Arc::clone(space),
            start.clone(),
            goal.clone(),
            validator,
            SnapConfig::default(),
        );
        if let Some(trajectory) = snap.plan(&budget, &mut result) {
            return Ok(Some(trajectory));
        }
    }

    // Escalation phase: fresh clock, one full cascade per slice.
    log::debug!("snap-only phase failed, escalating to tree search");
    let budget = TimeBudget::new(time_limit);
    let per_trial = time_limit / max_num_trials as u32;
    let mut generator = sampleable.create_generator();

    while !budget.is_exhausted() && generator.can_sample() {
        saver.set_positions(&start);
        if !generator.sample(&mut *saver, rng, &mut goal) {
            break;
        }
        if !space.satisfies_bounds(&goal) {
            continue;
        }

        let trial_budget = TimeBudget::new(budget.slice(per_trial));
        if let Some(trajectory) =
            snap_then_rrt(space, &start, &goal, validator, &trial_budget, rng)
        {
            return Ok(Some(trajectory));
        }
    }
    Ok(None)
}

/// Plan to the region `goal_tsr` while keeping `frame` on `constraint_tsr`
/// along the whole trajectory.
#[allow(clippy::too_many_arguments)]
pub fn plan_to_tsr_with_constraint<S, K, V>(
    space: &Arc<S>,
    skeleton: &Mutex<K>,
    frame: FrameId,
    goal_tsr: &Tsr,
    constraint_tsr: &Tsr,
    validator: &V,
    config: &CrrtConfig,
    rng: &mut StdRng,
    time_limit: Duration,
) -> Result<Option<Trajectory<S>>, PlanningError>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    if config.max_num_trials == 0 {
        return Err(PlanningError::InvalidParameter(
            "max_num_trials must be positive",
        ));
    }

    let mut guard = skeleton.lock();
    let mut saver = ConfigurationSaver::new(&mut *guard);
    let start = saver.saved_positions().clone();

    let damping = IkConfig::default().damping;
    let path_constraint = FrameConstraint::new(
        constraint_tsr,
        frame,
        config.projection_tolerance,
        config.projection_max_iterations,
        damping,
    );
    if !path_constraint.is_satisfied(&mut *saver, &start) {
        return Err(PlanningError::InvalidParameter(
            "start configuration violates the trajectory constraint",
        ));
    }

    // Rotational goal bounds wrap so sampling near ±π stays well behaved.
    let cyclic_goal = CyclicTsr::new(goal_tsr.clone());
    let solver = JacobianIk::new(IkConfig::default());
    let goal_sampler = IkSampleable::new(&cyclic_goal, &solver, frame, MAX_IK_TRIALS);
    let goal_constraint = FrameConstraint::new(
        &cyclic_goal,
        frame,
        config.projection_tolerance,
        config.projection_max_iterations,
        damping,
    );

    let mut strategy = CrrtStrategy::new(
        Arc::clone(space),
        &mut *saver,
        start,
        goal_sampler,
        goal_constraint,
        path_constraint,
        validator,
        config.clone(),
        fork_rng(rng),
    );

    let budget = TimeBudget::new(time_limit);
    let mut result = PlanningResult::default();
    let trajectory = strategy.plan(&budget, &mut result);
    if trajectory.is_none() {
        log::debug!("constrained tree search failed ({:?})", result.status);
    }
    Ok(trajectory)
}

/// Plan a straight-line motion of `frame` by `distance` along `direction`.
///
/// A zero direction is a hard error. A negative distance is canonicalized
/// by flipping the direction. Vector-field integration runs first; the
/// remaining budget goes to a constrained tree search toward the offset
/// goal region, constrained to the travel corridor.
#[allow(clippy::too_many_arguments)]
pub fn plan_to_end_effector_offset<S, K, V>(
    space: &Arc<S>,
    skeleton: &Mutex<K>,
    frame: FrameId,
    direction: &Vec3,
    distance: f64,
    validator: &V,
    vf_config: &VectorFieldConfig,
    crrt_config: &CrrtConfig,
    rng: &mut StdRng,
    time_limit: Duration,
) -> Result<Option<Trajectory<S>>, PlanningError>
where
    S: StateSpace<State = DVector<f64>>,
    K: Kinematics + ?Sized,
    V: StateValidator<DVector<f64>> + ?Sized,
{
    if direction.norm() < 1e-9 {
        return Err(GeometryError::ZeroDirectionVector.into());
    }
    let mut unit = direction.normalize();
    let mut travel = distance;
    if travel < 0.0 {
        travel = -travel;
        unit = -unit;
    }

    let mut guard = skeleton.lock();
    let mut saver = ConfigurationSaver::new(&mut *guard);
    let start = saver.saved_positions().clone();
    let ee_pose = saver.frame_transform(frame);

    let budget = TimeBudget::new(time_limit);
    let mut result = PlanningResult::default();

    let mut vector_field = VectorFieldStrategy::new(
        Arc::clone(space),
        &mut *saver,
        frame,
        unit,
        travel,
        validator,
        vf_config.clone(),
    );
    if let Some(trajectory) = vector_field.plan(&budget, &mut result) {
        return Ok(Some(trajectory));
    }
    log::debug!(
        "vector-field integration failed ({:?}), escalating to constrained tree search",
        result.status
    );

    let (goal_tsr, constraint_tsr) = offset_goal_and_constraint(
        &ee_pose,
        &unit,
        travel,
        vf_config.position_tolerance,
        vf_config.angular_tolerance,
    )?;

    saver.set_positions(&start);
    let damping = IkConfig::default().damping;
    let cyclic_goal = CyclicTsr::new(goal_tsr);
    let solver = JacobianIk::new(IkConfig::default());
    let goal_sampler = IkSampleable::new(&cyclic_goal, &solver, frame, MAX_IK_TRIALS);
    let goal_constraint = FrameConstraint::new(
        &cyclic_goal,
        frame,
        crrt_config.projection_tolerance,
        crrt_config.projection_max_iterations,
        damping,
    );
    let path_constraint = FrameConstraint::new(
        &constraint_tsr,
        frame,
        crrt_config.projection_tolerance,
        crrt_config.projection_max_iterations,
        damping,
    );

    let mut strategy = CrrtStrategy::new(
        Arc::clone(space),
        &mut *saver,
        start,
        goal_sampler,
        goal_constraint,
        path_constraint,
        validator,
        crrt_config.clone(),
        fork_rng(rng),
    );
    let trajectory = strategy.plan(&budget, &mut result);
    if trajectory.is_none() {
        log::debug!("constrained tree search failed ({:?})", result.status);
    }
    Ok(trajectory)
}

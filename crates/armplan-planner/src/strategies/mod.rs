//! Planning strategies
//!
//! Each strategy is constructed with everything it needs (space, endpoints,
//! validator, configuration) and exposes one [`PlanningStrategy::plan`]
//! call. The cascade holds strategies behind the trait and escalates down
//! an ordered list under a shared budget.

pub mod crrt;
pub mod rrt;
pub mod snap;
pub mod vectorfield;

pub use crrt::CrrtStrategy;
pub use rrt::RrtConnect;
pub use snap::SnapStrategy;
pub use vectorfield::VectorFieldStrategy;

use armplan_core::statespace::{StateSpace, StateValidator};
use armplan_core::trajectory::Trajectory;

use crate::budget::TimeBudget;
use crate::result::PlanningResult;

/// One planning attempt behind a uniform interface.
pub trait PlanningStrategy<S: StateSpace> {
    fn name(&self) -> &'static str;

    /// Run the strategy under `budget`. Returns the trajectory on success;
    /// `None` records the failure class in `result` and lets the cascade
    /// escalate.
    fn plan(&mut self, budget: &TimeBudget, result: &mut PlanningResult) -> Option<Trajectory<S>>;
}

/// Whether the straight-line motion between two states is feasible, checked
/// at interpolants no further than `resolution` apart.
pub(crate) fn motion_is_valid<S, V>(
    space: &S,
    validator: &V,
    from: &S::State,
    to: &S::State,
    resolution: f64,
) -> bool
where
    S: StateSpace,
    V: StateValidator<S::State> + ?Sized,
{
    let distance = space.distance(from, to);
    let steps = (distance / resolution).ceil().max(1.0) as usize;
    let mut scratch = space.zero_state();
    for i in 0..=steps {
        let alpha = i as f64 / steps as f64;
        space.interpolate(from, to, alpha, &mut scratch);
        if !space.satisfies_bounds(&scratch) || !validator.is_satisfied(&scratch) {
            return false;
        }
    }
    true
}

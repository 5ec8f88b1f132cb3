//! Configuration-space contracts
//!
//! The planner never manipulates joint values directly; it goes through a
//! [`StateSpace`], which supplies the metric, interpolation and sampling
//! primitives, and a [`StateValidator`], the feasibility oracle. Both are
//! narrow contracts so that skeleton backends can plug in their own
//! representations. [`JointSpace`] is the shipped bounded R^n space.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

/// State space construction errors
#[derive(Debug, Error)]
pub enum StateSpaceError {
    #[error("lower bound dimension {lower} does not match upper bound dimension {upper}")]
    DimensionMismatch { lower: usize, upper: usize },
    #[error("joint {index} has lower limit {lower} above upper limit {upper}")]
    InvertedLimits { index: usize, lower: f64, upper: f64 },
}

/// A manifold of valid configurations.
///
/// States are opaque to callers: all mutation goes through explicit
/// operations on a caller-owned scratch state, never through implicit
/// copies.
pub trait StateSpace {
    type State: Clone + std::fmt::Debug;

    /// Number of real-valued coordinates of a state.
    fn dimension(&self) -> usize;

    /// Allocate a scratch state for use with the `out`-style operations.
    fn zero_state(&self) -> Self::State;

    /// Metric distance. Non-negative and symmetric.
    fn distance(&self, from: &Self::State, to: &Self::State) -> f64;

    /// Write the interpolant at `alpha` in `[0, 1]` into `out`.
    ///
    /// Exact at the endpoints: `alpha = 0` yields `from`, `alpha = 1`
    /// yields `to`.
    fn interpolate(&self, from: &Self::State, to: &Self::State, alpha: f64, out: &mut Self::State);

    /// Draw a state uniformly within the space bounds.
    fn sample_uniform(&self, rng: &mut StdRng, out: &mut Self::State);

    /// Coordinate vector of a state.
    fn to_vector(&self, state: &Self::State) -> DVector<f64>;

    /// Write the state for a coordinate vector into `out`.
    fn from_vector(&self, vector: &DVector<f64>, out: &mut Self::State);

    /// Whether the state lies within the space bounds.
    fn satisfies_bounds(&self, state: &Self::State) -> bool;
}

/// Feasibility oracle over states. A pure predicate with no side effects.
pub trait StateValidator<State> {
    fn is_satisfied(&self, state: &State) -> bool;
}

impl<State, F> StateValidator<State> for F
where
    F: Fn(&State) -> bool,
{
    fn is_satisfied(&self, state: &State) -> bool {
        self(state)
    }
}

/// Interpolation rule between two states of a space.
pub trait Interpolator<S: StateSpace> {
    /// Write the interpolant at `alpha` in `[0, 1]` into `out`.
    fn interpolate(&self, space: &S, from: &S::State, to: &S::State, alpha: f64, out: &mut S::State);

    /// Highest derivative order this interpolator supports.
    fn num_derivatives(&self) -> usize;

    /// Derivative of the given order with respect to `alpha`, or `None`
    /// when the order is outside the supported range.
    fn derivative(
        &self,
        space: &S,
        from: &S::State,
        to: &S::State,
        order: usize,
    ) -> Option<DVector<f64>>;
}

/// Straight-line (geodesic) interpolation with one supported derivative.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl<S: StateSpace> Interpolator<S> for LinearInterpolator {
    fn interpolate(&self, space: &S, from: &S::State, to: &S::State, alpha: f64, out: &mut S::State) {
        space.interpolate(from, to, alpha, out);
    }

    fn num_derivatives(&self) -> usize {
        1
    }

    fn derivative(
        &self,
        space: &S,
        from: &S::State,
        to: &S::State,
        order: usize,
    ) -> Option<DVector<f64>> {
        if order != 1 {
            return None;
        }
        Some(space.to_vector(to) - space.to_vector(from))
    }
}

/// Bounded R^n joint space with per-joint position limits.
#[derive(Debug, Clone)]
pub struct JointSpace {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl JointSpace {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, StateSpaceError> {
        if lower.len() != upper.len() {
            return Err(StateSpaceError::DimensionMismatch {
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        for i in 0..lower.len() {
            if lower[i] > upper[i] {
                return Err(StateSpaceError::InvertedLimits {
                    index: i,
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Symmetric limits of `half_range` on every joint.
    pub fn symmetric(dimension: usize, half_range: f64) -> Self {
        Self {
            lower: DVector::from_element(dimension, -half_range.abs()),
            upper: DVector::from_element(dimension, half_range.abs()),
        }
    }

    pub fn lower_limits(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper_limits(&self) -> &DVector<f64> {
        &self.upper
    }
}

impl StateSpace for JointSpace {
    type State = DVector<f64>;

    fn dimension(&self) -> usize {
        self.lower.len()
    }

    fn zero_state(&self) -> Self::State {
        DVector::zeros(self.lower.len())
    }

    fn distance(&self, from: &Self::State, to: &Self::State) -> f64 {
        (to - from).norm()
    }

    fn interpolate(&self, from: &Self::State, to: &Self::State, alpha: f64, out: &mut Self::State) {
        out.copy_from(from);
        out.axpy(alpha, &(to - from), 1.0);
    }

    fn sample_uniform(&self, rng: &mut StdRng, out: &mut Self::State) {
        for i in 0..self.lower.len() {
            out[i] = if self.upper[i] > self.lower[i] {
                rng.gen_range(self.lower[i]..self.upper[i])
            } else {
                self.lower[i]
            };
        }
    }

    fn to_vector(&self, state: &Self::State) -> DVector<f64> {
        state.clone()
    }

    fn from_vector(&self, vector: &DVector<f64>, out: &mut Self::State) {
        out.copy_from(vector);
    }

    fn satisfies_bounds(&self, state: &Self::State) -> bool {
        (0..self.lower.len()).all(|i| state[i] >= self.lower[i] && state[i] <= self.upper[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn space() -> JointSpace {
        JointSpace::symmetric(3, 2.0)
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let err = JointSpace::new(
            DVector::from_vec(vec![1.0, 0.0]),
            DVector::from_vec(vec![0.0, 1.0]),
        );
        assert!(err.is_err());

        let err = JointSpace::new(DVector::zeros(2), DVector::zeros(3));
        assert!(err.is_err());
    }

    #[test]
    fn test_interpolation_exact_at_endpoints() {
        let space = space();
        let a = DVector::from_vec(vec![0.5, -1.0, 1.5]);
        let b = DVector::from_vec(vec![-0.5, 1.0, 0.0]);
        let mut out = space.zero_state();

        space.interpolate(&a, &b, 0.0, &mut out);
        assert_relative_eq!(out, a, epsilon = 1e-12);

        space.interpolate(&a, &b, 1.0, &mut out);
        assert_relative_eq!(out, b, epsilon = 1e-12);

        space.interpolate(&a, &b, 0.5, &mut out);
        assert_relative_eq!(out, (&a + &b) * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_symmetric_and_nonnegative() {
        let space = space();
        let a = DVector::from_vec(vec![0.5, -1.0, 1.5]);
        let b = DVector::from_vec(vec![-0.5, 1.0, 0.0]);

        assert!(space.distance(&a, &b) >= 0.0);
        assert_relative_eq!(space.distance(&a, &b), space.distance(&b, &a), epsilon = 1e-12);
        assert_relative_eq!(space.distance(&a, &a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sampling_stays_within_bounds() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = space.zero_state();

        for _ in 0..100 {
            space.sample_uniform(&mut rng, &mut state);
            assert!(space.satisfies_bounds(&state));
        }
    }

    #[test]
    fn test_sampling_reproducible_for_fixed_seed() {
        let space = space();
        let mut a = space.zero_state();
        let mut b = space.zero_state();

        let mut rng = StdRng::seed_from_u64(42);
        space.sample_uniform(&mut rng, &mut a);
        let mut rng = StdRng::seed_from_u64(42);
        space.sample_uniform(&mut rng, &mut b);

        assert_relative_eq!(a, b, epsilon = 0.0);
    }

    #[test]
    fn test_linear_interpolator_derivative() {
        let space = space();
        let a = DVector::from_vec(vec![0.0, 0.0, 0.0]);
        let b = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let interp = LinearInterpolator;

        let d = Interpolator::derivative(&interp, &space, &a, &b, 1).unwrap();
        assert_relative_eq!(d, &b - &a, epsilon = 1e-12);

        assert!(Interpolator::derivative(&interp, &space, &a, &b, 0).is_none());
        assert!(Interpolator::derivative(&interp, &space, &a, &b, 2).is_none());
    }
}

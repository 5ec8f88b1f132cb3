//! Constrained configuration sampling
//!
//! [`IkSampleable`] turns a pose region into a stream of joint
//! configurations: draw a pose from the region, draw a random seed, run
//! inverse kinematics, keep solutions within the joint limits. Sampling is
//! nondeterministic and may fail per call; a full round of failures marks
//! the generator exhausted.

use armplan_core::kinematics::{FrameId, Kinematics};
use armplan_core::tsr::PoseConstraint;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::Rng;

use crate::ik::IkSolver;

/// A pose region made sampleable in configuration space through an inverse
/// kinematics solver.
pub struct IkSampleable<'a, K: Kinematics + ?Sized> {
    region: &'a dyn PoseConstraint,
    solver: &'a dyn IkSolver<K>,
    frame: FrameId,
    max_num_trials: usize,
}

impl<'a, K: Kinematics + ?Sized> IkSampleable<'a, K> {
    pub fn new(
        region: &'a dyn PoseConstraint,
        solver: &'a dyn IkSolver<K>,
        frame: FrameId,
        max_num_trials: usize,
    ) -> Self {
        Self {
            region,
            solver,
            frame,
            max_num_trials,
        }
    }

    pub fn create_generator(&self) -> SampleGenerator<'a, '_, K> {
        SampleGenerator {
            sampleable: self,
            exhausted: false,
        }
    }
}

/// Stateful generator over an [`IkSampleable`].
pub struct SampleGenerator<'a, 'b, K: Kinematics + ?Sized> {
    sampleable: &'b IkSampleable<'a, K>,
    exhausted: bool,
}

impl<K: Kinematics + ?Sized> SampleGenerator<'_, '_, K> {
    /// Whether another call to [`Self::sample`] may still produce a
    /// configuration.
    pub fn can_sample(&self) -> bool {
        !self.exhausted
    }

    /// Try to write one feasible configuration into `out`.
    ///
    /// Each call makes up to `max_num_trials` attempts, each with a fresh
    /// region pose and a fresh uniform seed. A call in which every attempt
    /// fails marks the generator exhausted.
    pub fn sample(&mut self, skeleton: &mut K, rng: &mut StdRng, out: &mut DVector<f64>) -> bool {
        if self.exhausted {
            return false;
        }

        let (lower, upper) = skeleton.position_limits();
        for _ in 0..self.sampleable.max_num_trials {
            let target = self.sampleable.region.sample(rng);
            let mut seed = DVector::zeros(lower.len());
            for i in 0..lower.len() {
                seed[i] = if upper[i] > lower[i] {
                    rng.gen_range(lower[i]..upper[i])
                } else {
                    lower[i]
                };
            }

            if let Some(solution) =
                self.sampleable
                    .solver
                    .solve(skeleton, self.sampleable.frame, &target, &seed)
            {
                let within_limits =
                    (0..solution.len()).all(|i| solution[i] >= lower[i] && solution[i] <= upper[i]);
                if within_limits {
                    out.copy_from(&solution);
                    return true;
                }
            }
        }

        self.exhausted = true;
        false
    }
}

//! Task-space regions
//!
//! A [`Tsr`] is a pose constraint parametrized by an anchor transform
//! `T0_w`, an end-effector offset `Tw_e` and a 6x2 bounds matrix over the
//! displacement between them (three translational axes, three rotational).
//! It can be sampled (draw a feasible pose) and projected onto (correct a
//! pose toward the constraint manifold). [`CyclicTsr`] decorates a region so
//! its rotational axes wrap at ±π.

use std::f64::consts::PI;

use nalgebra::{Translation3, UnitQuaternion, Vector6};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Pose;

/// Task-space region errors
#[derive(Debug, Error)]
pub enum TsrError {
    #[error("axis {axis} has lower bound {min} above upper bound {max}")]
    InvalidBounds { axis: usize, min: f64, max: f64 },
    #[error("projection did not converge within {0} iterations")]
    ProjectionDidNotConverge(usize),
}

/// A pose constraint that can be sampled and projected onto.
///
/// The displacement of a pose is its 6-vector of coordinates relative to
/// the region's frames (xyz translation, then roll/pitch/yaw); the bounds
/// give the allowed interval per axis. A zero-width axis is an equality
/// constraint.
pub trait PoseConstraint {
    /// Per-axis `[min, max]` bounds over the displacement.
    fn bounds(&self) -> &[[f64; 2]; 6];

    /// Displacement coordinates of `pose` relative to the region frames.
    fn displacement(&self, pose: &Pose) -> Vector6<f64>;

    /// Pose for a given displacement vector.
    fn recompose(&self, displacement: &Vector6<f64>) -> Pose;

    /// Draw a pose whose displacement is uniform within the bounds.
    fn sample(&self, rng: &mut StdRng) -> Pose {
        let bounds = self.bounds();
        let mut displacement = Vector6::zeros();
        for axis in 0..6 {
            let [min, max] = bounds[axis];
            displacement[axis] = if max > min {
                rng.gen_range(min..max)
            } else {
                min
            };
        }
        self.recompose(&displacement)
    }

    /// Signed per-axis excess outside the bounds; zero inside.
    fn violation(&self, pose: &Pose) -> Vector6<f64> {
        let bounds = self.bounds();
        let displacement = self.displacement(pose);
        let mut violation = Vector6::zeros();
        for axis in 0..6 {
            let [min, max] = bounds[axis];
            if displacement[axis] < min {
                violation[axis] = displacement[axis] - min;
            } else if displacement[axis] > max {
                violation[axis] = displacement[axis] - max;
            }
        }
        violation
    }

    fn is_satisfied(&self, pose: &Pose, tolerance: f64) -> bool {
        self.violation(pose).norm() <= tolerance
    }

    /// Iteratively correct `pose` toward the nearest point satisfying the
    /// bounds: clamp the displacement per axis and recompose until the
    /// violation falls under `tolerance`.
    fn project(&self, pose: &Pose, tolerance: f64, max_iterations: usize) -> Result<Pose, TsrError> {
        let bounds = self.bounds();
        let mut current = *pose;
        for _ in 0..max_iterations {
            if self.violation(&current).norm() <= tolerance {
                return Ok(current);
            }
            let mut displacement = self.displacement(&current);
            for axis in 0..6 {
                let [min, max] = bounds[axis];
                displacement[axis] = displacement[axis].clamp(min, max);
            }
            current = self.recompose(&displacement);
        }
        if self.violation(&current).norm() <= tolerance {
            Ok(current)
        } else {
            Err(TsrError::ProjectionDidNotConverge(max_iterations))
        }
    }
}

/// Task-space region: `T0_w` places the region frame `w` in the world,
/// `Tw_e` offsets the end-effector frame from `w`, and the bounds constrain
/// the displacement between them. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tsr {
    t0_w: Pose,
    tw_e: Pose,
    bounds: [[f64; 2]; 6],
}

impl Tsr {
    pub fn new(t0_w: Pose, tw_e: Pose, bounds: [[f64; 2]; 6]) -> Result<Self, TsrError> {
        for (axis, [min, max]) in bounds.iter().enumerate() {
            if min > max {
                return Err(TsrError::InvalidBounds {
                    axis,
                    min: *min,
                    max: *max,
                });
            }
        }
        Ok(Self { t0_w, tw_e, bounds })
    }

    /// Point region: an equality constraint pinning the exact `pose`.
    pub fn point(pose: Pose) -> Self {
        Self {
            t0_w: pose,
            tw_e: Pose::identity(),
            bounds: [[0.0; 2]; 6],
        }
    }

    pub fn t0_w(&self) -> &Pose {
        &self.t0_w
    }

    pub fn tw_e(&self) -> &Pose {
        &self.tw_e
    }
}

impl PoseConstraint for Tsr {
    fn bounds(&self) -> &[[f64; 2]; 6] {
        &self.bounds
    }

    fn displacement(&self, pose: &Pose) -> Vector6<f64> {
        let offset = self.t0_w.inverse() * pose * self.tw_e.inverse();
        let (roll, pitch, yaw) = offset.rotation.euler_angles();
        Vector6::new(
            offset.translation.x,
            offset.translation.y,
            offset.translation.z,
            roll,
            pitch,
            yaw,
        )
    }

    fn recompose(&self, displacement: &Vector6<f64>) -> Pose {
        self.t0_w * offset_pose(displacement) * self.tw_e
    }
}

/// Cyclic variant of a region: rotational displacement axes are wrapped at
/// ±π around the bound interval's center, so sampling and projection agree
/// across the wrap boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclicTsr {
    inner: Tsr,
}

impl CyclicTsr {
    pub fn new(inner: Tsr) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Tsr {
        &self.inner
    }
}

impl PoseConstraint for CyclicTsr {
    fn bounds(&self) -> &[[f64; 2]; 6] {
        self.inner.bounds()
    }

    fn displacement(&self, pose: &Pose) -> Vector6<f64> {
        let mut displacement = self.inner.displacement(pose);
        let bounds = self.inner.bounds();
        for axis in 3..6 {
            let [min, max] = bounds[axis];
            let center = 0.5 * (min + max);
            displacement[axis] = center + wrap_to_pi(displacement[axis] - center);
        }
        displacement
    }

    fn recompose(&self, displacement: &Vector6<f64>) -> Pose {
        self.inner.recompose(displacement)
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

fn offset_pose(displacement: &Vector6<f64>) -> Pose {
    Pose::from_parts(
        Translation3::new(displacement[0], displacement[1], displacement[2]),
        UnitQuaternion::from_euler_angles(displacement[3], displacement[4], displacement[5]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3;
    use approx::assert_relative_eq;
    use nalgebra::Translation3;
    use rand::SeedableRng;

    fn boxy_tsr() -> Tsr {
        let anchor = Pose::from_parts(
            Translation3::new(1.0, 0.0, 0.5),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.3),
        );
        Tsr::new(
            anchor,
            Pose::identity(),
            [
                [-0.1, 0.1],
                [-0.2, 0.2],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [-0.5, 0.5],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let result = Tsr::new(
            Pose::identity(),
            Pose::identity(),
            [
                [0.1, -0.1],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
            ],
        );
        assert!(matches!(result, Err(TsrError::InvalidBounds { axis: 0, .. })));
    }

    #[test]
    fn test_samples_lie_within_bounds() {
        let tsr = boxy_tsr();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let pose = tsr.sample(&mut rng);
            let displacement = tsr.displacement(&pose);
            for axis in 0..6 {
                let [min, max] = tsr.bounds()[axis];
                assert!(
                    displacement[axis] >= min - 1e-9 && displacement[axis] <= max + 1e-9,
                    "axis {} displacement {} outside [{}, {}]",
                    axis,
                    displacement[axis],
                    min,
                    max
                );
            }
            assert!(tsr.is_satisfied(&pose, 1e-9));
        }
    }

    #[test]
    fn test_sampling_reproducible_for_fixed_seed() {
        let tsr = boxy_tsr();
        let a = tsr.sample(&mut StdRng::seed_from_u64(11));
        let b = tsr.sample(&mut StdRng::seed_from_u64(11));
        assert_relative_eq!(a.translation.vector, b.translation.vector, epsilon = 0.0);
    }

    #[test]
    fn test_point_region_pins_pose() {
        let pose = Pose::from_parts(
            Translation3::new(0.4, -0.2, 0.9),
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
        );
        let tsr = Tsr::point(pose);

        assert!(tsr.is_satisfied(&pose, 1e-9));
        let sampled = tsr.sample(&mut StdRng::seed_from_u64(0));
        assert_relative_eq!(sampled.translation.vector, pose.translation.vector, epsilon = 1e-12);

        let elsewhere = pose * Pose::translation(0.05, 0.0, 0.0);
        assert!(!tsr.is_satisfied(&elsewhere, 1e-3));
    }

    #[test]
    fn test_projection_clamps_onto_bounds() {
        let tsr = boxy_tsr();
        // Push a feasible pose out along x; projection should pull it back
        // to the boundary.
        let outside = tsr.recompose(&Vector6::new(0.3, 0.0, 0.0, 0.0, 0.0, 0.0));
        let projected = tsr.project(&outside, 1e-9, 10).unwrap();
        let displacement = tsr.displacement(&projected);
        assert_relative_eq!(displacement[0], 0.1, epsilon = 1e-9);
        assert!(tsr.is_satisfied(&projected, 1e-9));
    }

    #[test]
    fn test_projection_identity_for_satisfied_pose() {
        let tsr = boxy_tsr();
        let inside = tsr.recompose(&Vector6::new(0.05, -0.1, 0.0, 0.0, 0.0, 0.2));
        let projected = tsr.project(&inside, 1e-9, 10).unwrap();
        assert_relative_eq!(
            projected.translation.vector,
            inside.translation.vector,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_projection_reports_non_convergence() {
        let tsr = boxy_tsr();
        let outside = tsr.recompose(&Vector6::new(0.3, 0.0, 0.0, 0.0, 0.0, 0.0));
        // Zero iterations cannot reach the manifold.
        assert!(matches!(
            tsr.project(&outside, 1e-9, 0),
            Err(TsrError::ProjectionDidNotConverge(0))
        ));
    }

    #[test]
    fn test_cyclic_region_wraps_rotation() {
        // Yaw bounds centered on π: a pose at -π + 0.1 is on the manifold
        // once wrapped, even though its raw yaw displacement is far away.
        let tsr = Tsr::new(
            Pose::identity(),
            Pose::identity(),
            [
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [PI - 0.2, PI + 0.2],
            ],
        )
        .unwrap();
        let cyclic = CyclicTsr::new(tsr.clone());

        let pose = Pose::rotation(Vec3::new(0.0, 0.0, -PI + 0.1));
        assert!(!tsr.is_satisfied(&pose, 1e-6));
        assert!(cyclic.is_satisfied(&pose, 1e-6));
    }

    #[test]
    fn test_cyclic_projection_crosses_wrap_boundary() {
        // Yaw bounds straddle π. A pose whose raw yaw sits past the wrap is
        // nearest to the upper bound across the ±π boundary; projection must
        // take the short way there instead of clamping to the lower bound.
        let tsr = Tsr::new(
            Pose::identity(),
            Pose::identity(),
            [
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [PI - 0.2, PI + 0.2],
            ],
        )
        .unwrap();
        let cyclic = CyclicTsr::new(tsr);

        let pose = Pose::rotation(Vec3::new(0.0, 0.0, -PI + 0.5));
        assert!(!cyclic.is_satisfied(&pose, 1e-6));
        assert_relative_eq!(cyclic.displacement(&pose)[5], PI + 0.5, epsilon = 1e-9);

        let projected = cyclic.project(&pose, 1e-9, 10).unwrap();
        assert!(cyclic.is_satisfied(&projected, 1e-9));
        assert_relative_eq!(cyclic.displacement(&projected)[5], PI + 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_wrap_to_pi() {
        assert_relative_eq!(wrap_to_pi(0.3), 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(2.0 * PI + 0.3), 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(-2.0 * PI - 0.3), -0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(PI), PI, epsilon = 1e-12);
    }
}

//! Time-stamped waypoint trajectories
//!
//! A [`Trajectory`] stores waypoints sorted by time and evaluates between
//! them with a configurable interpolator. Evaluation outside the time range
//! is a hard domain error; callers are expected to clamp first.

use std::sync::Arc;

use nalgebra::DVector;
use thiserror::Error;

use crate::statespace::{Interpolator, LinearInterpolator, StateSpace};

/// Trajectory evaluation errors
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("time {time} is outside the trajectory range [{start}, {end}]")]
    DomainError { time: f64, start: f64, end: f64 },
    #[error("derivative order {0} is not supported by the interpolator")]
    UnsupportedDerivative(usize),
    #[error("trajectory has no waypoints")]
    Empty,
}

/// A single time-stamped state.
#[derive(Debug, Clone)]
pub struct Waypoint<State> {
    pub t: f64,
    pub state: State,
}

/// Ordered, time-stamped waypoints in a state space.
///
/// The waypoint sequence is kept sorted by time on insertion. Waypoints
/// inserted with an already-present time land after the existing ones, so
/// equal-time insertion order is stable.
pub struct Trajectory<S: StateSpace, I: Interpolator<S> = LinearInterpolator> {
    space: Arc<S>,
    interpolator: I,
    waypoints: Vec<Waypoint<S::State>>,
}

impl<S: StateSpace, I: Interpolator<S>> Trajectory<S, I> {
    /// Create an empty trajectory over `space`.
    pub fn new(space: Arc<S>, interpolator: I) -> Self {
        Self {
            space,
            interpolator,
            waypoints: Vec::new(),
        }
    }

    pub fn state_space(&self) -> &Arc<S> {
        &self.space
    }

    pub fn num_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint<S::State>> {
        self.waypoints.get(index)
    }

    pub fn waypoints(&self) -> &[Waypoint<S::State>] {
        &self.waypoints
    }

    /// Insert a waypoint, keeping the sequence sorted by time.
    pub fn add_waypoint(&mut self, t: f64, state: S::State) {
        let index = self.waypoints.partition_point(|w| w.t <= t);
        self.waypoints.insert(index, Waypoint { t, state });
    }

    /// Time of the first waypoint.
    pub fn start_time(&self) -> Option<f64> {
        self.waypoints.first().map(|w| w.t)
    }

    /// Time of the last waypoint.
    pub fn end_time(&self) -> Option<f64> {
        self.waypoints.last().map(|w| w.t)
    }

    /// End time minus start time; zero for fewer than two waypoints.
    pub fn duration(&self) -> f64 {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }

    /// Index of the first waypoint whose time is strictly greater than `t`.
    ///
    /// Returns 0 for `t` before the first waypoint. Errors for `t` at or
    /// beyond the last waypoint's time: no strictly-later waypoint exists
    /// there, and `t == t_end` is deliberately included in the error so the
    /// boundary is unambiguous (evaluation handles the end time without a
    /// lookup).
    pub fn waypoint_index_after_time(&self, t: f64) -> Result<usize, TrajectoryError> {
        let last = self.waypoints.last().ok_or(TrajectoryError::Empty)?;
        if t >= last.t {
            return Err(TrajectoryError::DomainError {
                time: t,
                start: self.waypoints[0].t,
                end: last.t,
            });
        }
        Ok(self.waypoints.partition_point(|w| w.t <= t))
    }

    /// Write the interpolated state at time `t` into `out`.
    pub fn evaluate(&self, t: f64, out: &mut S::State) -> Result<(), TrajectoryError> {
        let (first, last) = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(TrajectoryError::Empty),
        };
        if t < first.t || t > last.t {
            return Err(TrajectoryError::DomainError {
                time: t,
                start: first.t,
                end: last.t,
            });
        }
        if t == last.t {
            out.clone_from(&last.state);
            return Ok(());
        }

        let index = self.waypoint_index_after_time(t)?;
        debug_assert!(index >= 1);
        let prev = &self.waypoints[index - 1];
        let next = &self.waypoints[index];
        let dt = next.t - prev.t;
        let alpha = if dt > 0.0 { (t - prev.t) / dt } else { 0.0 };
        self.interpolator
            .interpolate(&self.space, &prev.state, &next.state, alpha, out);
        Ok(())
    }

    /// Derivative of the given order at time `t`, from the bracketing
    /// segment's interpolation.
    pub fn evaluate_derivative(&self, t: f64, order: usize) -> Result<DVector<f64>, TrajectoryError> {
        let (first, last) = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(TrajectoryError::Empty),
        };
        if t < first.t || t > last.t {
            return Err(TrajectoryError::DomainError {
                time: t,
                start: first.t,
                end: last.t,
            });
        }
        if order == 0 || order > self.interpolator.num_derivatives() {
            return Err(TrajectoryError::UnsupportedDerivative(order));
        }

        // The end time falls back to the final segment.
        let index = if t == last.t {
            self.waypoints.len() - 1
        } else {
            self.waypoint_index_after_time(t)?.max(1)
        };
        let prev = &self.waypoints[index - 1];
        let next = &self.waypoints[index];
        let derivative = self
            .interpolator
            .derivative(&self.space, &prev.state, &next.state, order)
            .ok_or(TrajectoryError::UnsupportedDerivative(order))?;

        let dt = next.t - prev.t;
        if dt > 0.0 {
            Ok(derivative / dt.powi(order as i32))
        } else {
            Ok(DVector::zeros(derivative.len()))
        }
    }
}

//! Shared wall-clock budget
//!
//! A [`TimeBudget`] is a deadline computed once per cascade invocation and
//! threaded by reference through every stage, so elapsed time is monotonic
//! and never resets between stages.

use std::time::{Duration, Instant};

/// Deadline derived from a caller-supplied limit.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            deadline: Instant::now() + limit,
        }
    }

    /// Time left until the deadline; zero once exhausted.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Clamp a per-attempt slice to the remaining global budget.
    pub fn slice(&self, per_attempt: Duration) -> Duration {
        per_attempt.min(self.remaining())
    }
}

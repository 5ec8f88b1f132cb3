//! Per-attempt reporting and hard errors
//!
//! Convergence failures (IK misses, projection divergence, exhausted
//! searches) are never errors: they surface as `None` results and drive
//! escalation, with a [`PlanningResult`] carrying the out-of-band
//! diagnostics for the attempt. [`PlanningError`] is reserved for malformed
//! input that the caller must fix.

use armplan_core::geometry::GeometryError;
use armplan_core::tsr::TsrError;
use thiserror::Error;

/// Hard input errors. Raised immediately, never retried.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    InvalidRegion(#[from] TsrError),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Outcome classification of a single planning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanningStatus {
    /// No attempt recorded yet
    #[default]
    Pending,
    Succeeded,
    /// An interpolated or extended state failed the feasibility oracle
    CollisionDetected,
    /// The wall-clock budget ran out mid-stage
    BudgetExhausted,
    /// The constrained sampler ran out of trials
    SamplingExhausted,
    /// Tree search never connected within the budget
    ConnectionFailed,
    /// Manifold projection kept diverging
    ProjectionFailed,
}

/// Status code plus optional diagnostic message for one attempt. Not a
/// trajectory: purely out-of-band reporting.
#[derive(Debug, Clone, Default)]
pub struct PlanningResult {
    pub status: PlanningStatus,
    pub message: Option<String>,
}

impl PlanningResult {
    pub fn set(&mut self, status: PlanningStatus, message: impl Into<Option<String>>) {
        self.status = status;
        self.message = message.into();
    }

    pub fn succeeded(&self) -> bool {
        self.status == PlanningStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_defaults_to_pending() {
        let result = PlanningResult::default();
        assert_eq!(result.status, PlanningStatus::Pending);
        assert!(result.message.is_none());
        assert!(!result.succeeded());
    }

    #[test]
    fn test_set_overwrites_status_and_message() {
        let mut result = PlanningResult::default();
        result.set(PlanningStatus::CollisionDetected, Some("blocked".to_string()));
        assert_eq!(result.status, PlanningStatus::CollisionDetected);
        assert_eq!(result.message.as_deref(), Some("blocked"));

        result.set(PlanningStatus::Succeeded, None);
        assert!(result.succeeded());
        assert!(result.message.is_none());
    }
}

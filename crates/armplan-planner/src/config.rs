//! Strategy configuration
//!
//! Parameter structs for the planning strategies, with defaults matching
//! the values the cascade was tuned with.

use serde::{Deserialize, Serialize};

/// Snap (direct interpolation) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapConfig {
    /// Maximum metric distance between consecutive feasibility checks
    pub resolution: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { resolution: 0.1 }
    }
}

/// Bidirectional tree search (RRT-Connect) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RrtConfig {
    /// Maximum metric length of a single tree extension
    pub max_extension: f64,
    /// Maximum metric distance between collision checks along an extension
    pub collision_resolution: f64,
    /// Distance below which the two trees count as connected
    pub connection_distance: f64,
}

impl Default for RrtConfig {
    fn default() -> Self {
        Self {
            max_extension: 0.5,
            collision_resolution: 0.1,
            connection_distance: 1e-4,
        }
    }
}

/// Constrained tree search (CRRT) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrrtConfig {
    /// Maximum total metric length of one constrained extension
    pub max_extension_distance: f64,
    /// Maximum distance between a raw extension step and its projection;
    /// also the step granularity of constrained extensions
    pub max_distance_btw_projections: f64,
    /// Minimum progress per accepted step
    pub min_step_size: f64,
    /// Distance below which the trees count as connected
    pub min_tree_connection_distance: f64,
    /// Iteration cap for manifold projection
    pub projection_max_iterations: usize,
    /// Convergence tolerance for manifold projection
    pub projection_tolerance: f64,
    /// IK seed attempts per goal sample
    pub max_num_trials: usize,
}

impl Default for CrrtConfig {
    fn default() -> Self {
        Self {
            max_extension_distance: f64::INFINITY,
            max_distance_btw_projections: 0.1,
            min_step_size: 0.05,
            min_tree_connection_distance: 0.1,
            projection_max_iterations: 20,
            projection_tolerance: 1e-4,
            max_num_trials: 5,
        }
    }
}

/// Vector-field integration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFieldConfig {
    /// Integration time step [s]
    pub initial_step_size: f64,
    /// Margin kept from the joint position limits
    pub joint_limit_tolerance: f64,
    /// Displacement interval between feasibility checks
    pub constraint_check_resolution: f64,
    /// Acceptable shortfall below the requested distance
    pub negative_distance_tolerance: f64,
    /// Acceptable overshoot beyond the requested distance
    pub positive_distance_tolerance: f64,
    /// Maximum lateral drift of the frame off the motion line
    pub position_tolerance: f64,
    /// Maximum angular drift of the frame from its starting orientation
    pub angular_tolerance: f64,
}

impl Default for VectorFieldConfig {
    fn default() -> Self {
        Self {
            initial_step_size: 0.02,
            joint_limit_tolerance: 1e-3,
            constraint_check_resolution: 0.01,
            negative_distance_tolerance: 0.01,
            positive_distance_tolerance: 0.01,
            position_tolerance: 0.01,
            angular_tolerance: 0.15,
        }
    }
}

/// Damped least-squares inverse kinematics parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkConfig {
    /// Damping factor for the least-squares solve
    pub damping: f64,
    /// Pose error norm below which a solution is accepted
    pub tolerance: f64,
    /// Iteration cap per seed
    pub max_iterations: usize,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            damping: 0.05,
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let crrt = CrrtConfig::default();
        assert!(crrt.min_step_size <= crrt.max_distance_btw_projections);
        assert!(crrt.projection_tolerance > 0.0);
        assert!(crrt.max_num_trials > 0);

        let vf = VectorFieldConfig::default();
        assert!(vf.initial_step_size > 0.0);
        assert!(vf.negative_distance_tolerance >= 0.0);

        let rrt = RrtConfig::default();
        assert!(rrt.collision_resolution <= rrt.max_extension);
    }
}

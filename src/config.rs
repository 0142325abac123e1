//! Engine configuration.
//!
//! Loaded from TOML with per-field defaults, so a partial file (or none at
//! all) yields a working setup. Validation runs once before streaming starts
//! and turns bad parameters into configuration errors instead of mid-run
//! surprises.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphSlamError, Result};

/// Top-level configuration for the graph-SLAM engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSlamConfig {
    pub node_decider: NodeDeciderConfig,
    pub edge_decider: EdgeDeciderConfig,
    pub loop_closer: LoopCloserConfig,
    pub optimizer: OptimizerConfig,
}

/// Parameters for node registration deciders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDeciderConfig {
    /// Accumulated translation that triggers a new node, in meters.
    pub linear_distance_threshold: f32,
    /// Accumulated rotation that triggers a new node, in radians.
    pub angular_distance_threshold: f32,
    /// Odometry translation noise, std-dev in meters per registered edge.
    pub odometry_translation_std_dev: f32,
    /// Odometry rotation noise, std-dev in radians per registered edge.
    pub odometry_rotation_std_dev: f32,
}

impl Default for NodeDeciderConfig {
    fn default() -> Self {
        Self {
            linear_distance_threshold: 0.5,
            angular_distance_threshold: 0.35,
            odometry_translation_std_dev: 0.02,
            odometry_rotation_std_dev: 0.01,
        }
    }
}

/// Parameters for scan-alignment edge registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDeciderConfig {
    /// Minimum alignment quality score for an edge to be accepted, in (0, 1].
    pub alignment_quality_threshold: f32,
    /// ICP correspondence gate, in meters.
    pub max_correspondence_distance: f32,
    /// ICP iteration cap.
    pub max_icp_iterations: usize,
    /// ICP convergence threshold on the per-iteration transform update.
    pub icp_epsilon: f32,
}

impl Default for EdgeDeciderConfig {
    fn default() -> Self {
        Self {
            alignment_quality_threshold: 0.6,
            max_correspondence_distance: 0.5,
            max_icp_iterations: 30,
            icp_epsilon: 1e-4,
        }
    }
}

/// Parameters for the pairwise-consistency loop closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopCloserConfig {
    /// Radius for joining nodes into spatial partitions, in meters.
    pub partition_radius: f32,
    /// Combined translation + weighted-rotation discrepancy below which two
    /// candidate edges count as mutually consistent.
    pub consistency_tolerance: f32,
    /// Minimum id gap between the new node and a loop-closure candidate.
    pub min_nodes_apart: u64,
    /// Minimum alignment score for a candidate edge to survive.
    pub min_alignment_score: f32,
    /// Weight applied to the heading discrepancy, in meters per radian.
    pub rotation_weight: f32,
    /// Cap on candidate edges considered per round.
    pub max_candidates_per_round: usize,
}

impl Default for LoopCloserConfig {
    fn default() -> Self {
        Self {
            partition_radius: 2.0,
            consistency_tolerance: 0.25,
            min_nodes_apart: 5,
            min_alignment_score: 0.7,
            rotation_weight: 1.0,
            max_candidates_per_round: 8,
        }
    }
}

/// Parameters for the Levenberg-Marquardt optimizer and its trigger policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Chi-squared improvement below which iteration stops, taken relative
    /// to the current chi-squared when it exceeds 1, absolute otherwise.
    pub convergence_tolerance: f64,
    pub initial_damping: f64,
    /// Run the optimizer after this many new edges (loop closures always
    /// trigger a run immediately).
    pub optimize_every_n_edges: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_tolerance: 1e-9,
            initial_damping: 1e-4,
            optimize_every_n_edges: 10,
        }
    }
}

impl GraphSlamConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: GraphSlamConfig = toml::from_str(&text)
            .map_err(|e| GraphSlamError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter range. Called by the engine before streaming.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f32) -> Result<()> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(GraphSlamError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }
        fn unit_interval(name: &str, value: f32) -> Result<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(GraphSlamError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )))
            }
        }

        positive(
            "node_decider.linear_distance_threshold",
            self.node_decider.linear_distance_threshold,
        )?;
        positive(
            "node_decider.angular_distance_threshold",
            self.node_decider.angular_distance_threshold,
        )?;
        positive(
            "node_decider.odometry_translation_std_dev",
            self.node_decider.odometry_translation_std_dev,
        )?;
        positive(
            "node_decider.odometry_rotation_std_dev",
            self.node_decider.odometry_rotation_std_dev,
        )?;

        unit_interval(
            "edge_decider.alignment_quality_threshold",
            self.edge_decider.alignment_quality_threshold,
        )?;
        positive(
            "edge_decider.max_correspondence_distance",
            self.edge_decider.max_correspondence_distance,
        )?;
        if self.edge_decider.max_icp_iterations == 0 {
            return Err(GraphSlamError::Config(
                "edge_decider.max_icp_iterations must be at least 1".into(),
            ));
        }
        positive("edge_decider.icp_epsilon", self.edge_decider.icp_epsilon)?;

        positive("loop_closer.partition_radius", self.loop_closer.partition_radius)?;
        positive(
            "loop_closer.consistency_tolerance",
            self.loop_closer.consistency_tolerance,
        )?;
        if self.loop_closer.min_nodes_apart == 0 {
            return Err(GraphSlamError::Config(
                "loop_closer.min_nodes_apart must be at least 1".into(),
            ));
        }
        unit_interval(
            "loop_closer.min_alignment_score",
            self.loop_closer.min_alignment_score,
        )?;
        if self.loop_closer.rotation_weight < 0.0 {
            return Err(GraphSlamError::Config(format!(
                "loop_closer.rotation_weight must be non-negative, got {}",
                self.loop_closer.rotation_weight
            )));
        }
        if self.loop_closer.max_candidates_per_round == 0 {
            return Err(GraphSlamError::Config(
                "loop_closer.max_candidates_per_round must be at least 1".into(),
            ));
        }

        if self.optimizer.max_iterations == 0 {
            return Err(GraphSlamError::Config(
                "optimizer.max_iterations must be at least 1".into(),
            ));
        }
        if self.optimizer.convergence_tolerance <= 0.0 {
            return Err(GraphSlamError::Config(format!(
                "optimizer.convergence_tolerance must be positive, got {}",
                self.optimizer.convergence_tolerance
            )));
        }
        if self.optimizer.initial_damping <= 0.0 {
            return Err(GraphSlamError::Config(format!(
                "optimizer.initial_damping must be positive, got {}",
                self.optimizer.initial_damping
            )));
        }
        if self.optimizer.optimize_every_n_edges == 0 {
            return Err(GraphSlamError::Config(
                "optimizer.optimize_every_n_edges must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

//! Run statistics.

use std::time::Duration;

/// Accumulated wall time per pipeline stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub node_decider: Duration,
    pub edge_decider: Duration,
    pub optimizer: Duration,
}

/// Counters and timings accumulated over a run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub records_processed: u64,
    pub nodes_registered: u64,
    pub edges_registered: u64,
    pub loop_closures: u64,
    pub optimizer_runs: u64,
    /// Optimizer runs that stopped without converging.
    pub optimizer_failures: u64,
    pub timings: StageTimings,
    /// Translational error against ground truth, one sample per registered
    /// node: (timestamp_us, error in meters). Empty without a trajectory.
    pub pose_errors: Vec<(u64, f32)>,
}

impl RunStats {
    /// Mean translational error against ground truth, `None` if no samples
    /// were recorded.
    pub fn mean_pose_error(&self) -> Option<f32> {
        if self.pose_errors.is_empty() {
            return None;
        }
        let sum: f32 = self.pose_errors.iter().map(|(_, e)| e).sum();
        Some(sum / self.pose_errors.len() as f32)
    }
}

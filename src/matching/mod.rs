//! Point-cloud alignment.
//!
//! Deciders estimate relative-pose measurements by aligning the observation
//! at one node against the observation at another. The only implementation
//! is point-to-point ICP ([`PointToPointIcp`]); the trait seam keeps the
//! deciders independent of the algorithm.

mod icp;

pub use icp::{IcpConfig, PointToPointIcp};

use crate::core::types::{PointCloud2D, Pose2D};

/// Outcome of aligning a source cloud against a target cloud.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentResult {
    /// Transform mapping source-frame points into the target frame.
    pub transform: Pose2D,
    /// Quality score in [0, 1], derived from the final correspondence error.
    pub score: f32,
    /// Whether the algorithm converged.
    pub converged: bool,
    pub iterations: u32,
    /// Mean squared correspondence error, in square meters.
    pub mse: f32,
}

impl AlignmentResult {
    /// A failed alignment: identity transform, zero score.
    pub fn failed() -> Self {
        Self {
            transform: Pose2D::identity(),
            score: 0.0,
            converged: false,
            iterations: 0,
            mse: f32::MAX,
        }
    }
}

/// An algorithm that estimates the rigid transform between two clouds.
pub trait ScanMatcher {
    /// Align `source` to `target`, starting from `initial_guess`
    /// (a source-frame to target-frame transform).
    fn align(
        &self,
        source: &PointCloud2D,
        target: &PointCloud2D,
        initial_guess: &Pose2D,
    ) -> AlignmentResult;
}

//! Alignment-based edge registration.

use super::{alignment_information, EdgeDecider, EdgeProposal};
use crate::config::EdgeDeciderConfig;
use crate::core::types::PointCloud2D;
use crate::graph::{EdgeKind, PoseGraph, PoseNode};
use crate::matching::{IcpConfig, PointToPointIcp, ScanMatcher};

/// Aligns each new node's observation against the previous registered
/// node's observation. A single edge is accepted when the match quality
/// clears the threshold; failure or low quality emits nothing.
pub struct AlignmentEdgeDecider {
    matcher: PointToPointIcp,
    quality_threshold: f32,
    /// Id and observation of the most recent registered node that had one.
    previous: Option<(u64, PointCloud2D)>,
}

impl AlignmentEdgeDecider {
    pub fn new(config: EdgeDeciderConfig) -> Self {
        Self {
            matcher: PointToPointIcp::new(IcpConfig {
                max_iterations: config.max_icp_iterations as u32,
                epsilon: config.icp_epsilon,
                max_correspondence_distance: config.max_correspondence_distance,
                ..IcpConfig::default()
            }),
            quality_threshold: config.alignment_quality_threshold,
            previous: None,
        }
    }
}

impl EdgeDecider for AlignmentEdgeDecider {
    fn consider(
        &mut self,
        node: &PoseNode,
        scan: Option<&PointCloud2D>,
        graph: &PoseGraph,
    ) -> Vec<EdgeProposal> {
        let mut proposals = Vec::new();

        if let (Some(scan), Some((prev_id, prev_scan))) = (scan, &self.previous) {
            // Current graph estimates give the initial guess.
            let guess = match (graph.node_pose(*prev_id), graph.node_pose(node.id)) {
                (Some(prev), Some(current)) => prev.relative_to(&current),
                _ => crate::core::types::Pose2D::identity(),
            };
            let result = self.matcher.align(scan, prev_scan, &guess);
            if result.converged && result.score >= self.quality_threshold {
                proposals.push(EdgeProposal {
                    from: *prev_id,
                    relative_pose: result.transform,
                    information: alignment_information(result.score),
                    kind: EdgeKind::Alignment,
                });
            } else {
                log::debug!(
                    "alignment edge {} -> {} rejected (converged={}, score={:.3})",
                    prev_id,
                    node.id,
                    result.converged,
                    result.score
                );
            }
        }

        if let Some(scan) = scan {
            self.previous = Some((node.id, scan.clone()));
        }
        proposals
    }
}

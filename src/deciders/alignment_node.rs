//! Alignment-based node registration.

use super::{alignment_information, FixedIntervalNodeDecider, NodeDecider, NodeProposal};
use crate::config::{EdgeDeciderConfig, NodeDeciderConfig};
use crate::core::types::PointCloud2D;
use crate::graph::{EdgeKind, PoseGraph};
use crate::io::StreamRecord;
use crate::matching::{IcpConfig, PointToPointIcp, ScanMatcher};

/// Same trigger as the fixed-interval decider, but the connecting edge is
/// measured by aligning the current observation against the one buffered at
/// the last registered node. Falls back to raw odometry when the alignment
/// fails or scores below the quality threshold.
pub struct AlignmentNodeDecider {
    trigger: FixedIntervalNodeDecider,
    matcher: PointToPointIcp,
    quality_threshold: f32,
    /// Observation at the most recent registered node.
    buffered: Option<PointCloud2D>,
}

impl AlignmentNodeDecider {
    pub fn new(node_config: NodeDeciderConfig, edge_config: EdgeDeciderConfig) -> Self {
        Self {
            trigger: FixedIntervalNodeDecider::new(node_config),
            matcher: PointToPointIcp::new(IcpConfig {
                max_iterations: edge_config.max_icp_iterations as u32,
                epsilon: edge_config.icp_epsilon,
                max_correspondence_distance: edge_config.max_correspondence_distance,
                ..IcpConfig::default()
            }),
            quality_threshold: edge_config.alignment_quality_threshold,
            buffered: None,
        }
    }
}

impl NodeDecider for AlignmentNodeDecider {
    fn consider(&mut self, record: &StreamRecord, graph: &PoseGraph) -> Option<NodeProposal> {
        // The very first observation anchors the root node.
        if self.buffered.is_none() {
            if let Some(scan) = &record.scan {
                self.buffered = Some(scan.clone());
            }
        }

        if !self.trigger.accumulate(&record.odometry) {
            return None;
        }
        let previous = graph.last_node_id().and_then(|id| graph.node_pose(id))?;
        let increment = self.trigger.take_increment();

        // Prefer the alignment measurement; odometry is the fallback.
        let mut relative_pose = increment;
        let mut information = self.trigger.odometry_information();
        let mut kind = EdgeKind::Odometry;
        if let (Some(scan), Some(buffered)) = (&record.scan, &self.buffered) {
            let result = self.matcher.align(scan, buffered, &increment);
            if result.converged && result.score >= self.quality_threshold {
                relative_pose = result.transform;
                information = alignment_information(result.score);
                kind = EdgeKind::Alignment;
            } else {
                log::debug!(
                    "node alignment rejected (converged={}, score={:.3}), using odometry",
                    result.converged,
                    result.score
                );
            }
        }

        if let Some(scan) = &record.scan {
            self.buffered = Some(scan.clone());
        }

        Some(NodeProposal {
            pose: previous.compose(&relative_pose),
            relative_pose,
            information,
            kind,
        })
    }
}

//! Node and edge registration deciders.
//!
//! Deciders are the pluggable policies of the pipeline: node deciders decide
//! *when* the trajectory gets a new pose node, edge deciders decide *which*
//! additional constraints connect it to the past. Each is selected by name
//! at engine construction through [`make_node_decider`] /
//! [`make_edge_decider`].

mod alignment_edge;
mod alignment_node;
mod empty;
mod fixed_interval;
mod loop_closer;

pub use alignment_edge::AlignmentEdgeDecider;
pub use alignment_node::AlignmentNodeDecider;
pub use empty::{EmptyEdgeDecider, EmptyNodeDecider};
pub use fixed_interval::FixedIntervalNodeDecider;
pub use loop_closer::LoopCloserEdgeDecider;

use crate::config::GraphSlamConfig;
use crate::core::types::{PointCloud2D, Pose2D};
use crate::error::{GraphSlamError, Result};
use crate::graph::{EdgeKind, Information2D, PoseGraph, PoseNode};
use crate::io::StreamRecord;

/// A node decider's verdict: register a new node here.
#[derive(Debug, Clone)]
pub struct NodeProposal {
    /// Initial global pose estimate for the new node.
    pub pose: Pose2D,
    /// Measured pose of the new node in the previous node's frame.
    pub relative_pose: Pose2D,
    pub information: Information2D,
    pub kind: EdgeKind,
}

/// An edge decider's verdict: one additional constraint onto the new node.
#[derive(Debug, Clone)]
pub struct EdgeProposal {
    /// Older endpoint; the newer endpoint is the node under consideration.
    pub from: u64,
    /// Measured pose of the new node in the frame of `from`.
    pub relative_pose: Pose2D,
    pub information: Information2D,
    pub kind: EdgeKind,
}

/// Decides when the trajectory warrants a new pose node.
pub trait NodeDecider {
    /// Inspect one stream record. Returns a proposal when a node should be
    /// registered at this record's pose, `None` otherwise. Internal
    /// accumulators reset as part of proposing.
    fn consider(&mut self, record: &StreamRecord, graph: &PoseGraph) -> Option<NodeProposal>;
}

/// Decides which extra edges connect a newly registered node to the graph.
pub trait EdgeDecider {
    /// Invoked once per registered node, root included (the root call binds
    /// its observation). Returns zero or more accepted edge proposals;
    /// rejection is silent and never mutates graph state.
    fn consider(
        &mut self,
        node: &PoseNode,
        scan: Option<&PointCloud2D>,
        graph: &PoseGraph,
    ) -> Vec<EdgeProposal>;
}

/// Listing metadata for a registered component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const NODE_DECIDERS: &[ComponentInfo] = &[
    ComponentInfo {
        name: "fixed-interval",
        description: "Register a node every time the accumulated odometry \
                      translation or rotation exceeds its threshold",
    },
    ComponentInfo {
        name: "alignment",
        description: "Fixed-interval trigger, but the connecting edge is \
                      measured by scan alignment against the previous node \
                      (odometry fallback)",
    },
    ComponentInfo {
        name: "none",
        description: "Never register a node",
    },
];

pub const EDGE_DECIDERS: &[ComponentInfo] = &[
    ComponentInfo {
        name: "alignment",
        description: "Add a scan-alignment edge to the previous registered \
                      node when the match quality passes the threshold",
    },
    ComponentInfo {
        name: "loop-closer",
        description: "Detect revisited places via spatial partitions and add \
                      the largest pairwise-consistent set of loop-closure \
                      edges",
    },
    ComponentInfo {
        name: "none",
        description: "Never register an edge",
    },
];

/// Build a node decider by registry name.
pub fn make_node_decider(name: &str, config: &GraphSlamConfig) -> Result<Box<dyn NodeDecider>> {
    match name {
        "fixed-interval" => Ok(Box::new(FixedIntervalNodeDecider::new(
            config.node_decider.clone(),
        ))),
        "alignment" => Ok(Box::new(AlignmentNodeDecider::new(
            config.node_decider.clone(),
            config.edge_decider.clone(),
        ))),
        "none" => Ok(Box::new(EmptyNodeDecider::new())),
        other => Err(GraphSlamError::Config(format!(
            "unknown node decider '{}' (available: {})",
            other,
            component_names(NODE_DECIDERS)
        ))),
    }
}

/// Build an edge decider by registry name.
pub fn make_edge_decider(name: &str, config: &GraphSlamConfig) -> Result<Box<dyn EdgeDecider>> {
    match name {
        "alignment" => Ok(Box::new(AlignmentEdgeDecider::new(
            config.edge_decider.clone(),
        ))),
        "loop-closer" => Ok(Box::new(LoopCloserEdgeDecider::new(
            config.loop_closer.clone(),
            config.edge_decider.clone(),
        ))),
        "none" => Ok(Box::new(EmptyEdgeDecider::new())),
        other => Err(GraphSlamError::Config(format!(
            "unknown edge decider '{}' (available: {})",
            other,
            component_names(EDGE_DECIDERS)
        ))),
    }
}

pub(crate) fn component_names(table: &[ComponentInfo]) -> String {
    table
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Information matrix for a scan-alignment measurement, weighted by the
/// 0-1 quality score so poorer matches pull less in the optimizer.
pub(crate) fn alignment_information(score: f32) -> Information2D {
    Information2D::from_std_dev(0.03, 0.015).scaled(score.clamp(0.0, 1.0))
}

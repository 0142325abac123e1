//! No-op deciders, for baselines and tests.

use super::{EdgeDecider, EdgeProposal, NodeDecider, NodeProposal};
use crate::core::types::PointCloud2D;
use crate::graph::{PoseGraph, PoseNode};
use crate::io::StreamRecord;

/// Never registers a node.
#[derive(Debug, Default)]
pub struct EmptyNodeDecider;

impl EmptyNodeDecider {
    pub fn new() -> Self {
        Self
    }
}

impl NodeDecider for EmptyNodeDecider {
    fn consider(&mut self, _record: &StreamRecord, _graph: &PoseGraph) -> Option<NodeProposal> {
        None
    }
}

/// Never registers an edge.
#[derive(Debug, Default)]
pub struct EmptyEdgeDecider;

impl EmptyEdgeDecider {
    pub fn new() -> Self {
        Self
    }
}

impl EdgeDecider for EmptyEdgeDecider {
    fn consider(
        &mut self,
        _node: &PoseNode,
        _scan: Option<&PointCloud2D>,
        _graph: &PoseGraph,
    ) -> Vec<EdgeProposal> {
        Vec::new()
    }
}

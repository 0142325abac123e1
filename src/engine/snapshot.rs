//! Visualization snapshots.

use crate::graph::{PoseEdge, PoseGraph, PoseNode};

/// An immutable copy of the graph for external observers.
///
/// Pushed through a `crossbeam_channel::Sender` after each processed
/// record; the consumer sees the estimate evolve but can never feed back
/// into the decision loop.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    /// Monotonic sequence number, one per push.
    pub sequence: u64,
    pub nodes: Vec<PoseNode>,
    pub edges: Vec<PoseEdge>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &PoseGraph, sequence: u64) -> Self {
        Self {
            sequence,
            nodes: graph.nodes().to_vec(),
            edges: graph.edges().to_vec(),
        }
    }
}

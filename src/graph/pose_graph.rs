//! Nodes, edges, and the graph container.
//!
//! Nodes live in a contiguous vector with id == index and are never deleted.
//! Node poses are mutated only by the optimizer; edges are immutable once
//! added. The root node (id 0) is fixed and anchors the gauge.

use serde::{Deserialize, Serialize};

use crate::core::types::Pose2D;

/// Provenance of a relative-pose constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Composed odometry increment between consecutive registered nodes.
    Odometry,
    /// Scan-alignment measurement between nearby nodes.
    Alignment,
    /// Accepted loop-closure constraint between revisited places.
    LoopClosure,
}

/// Information (inverse covariance) of a 2D pose measurement, stored as the
/// upper triangle of the symmetric 3x3 matrix over (x, y, theta).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Information2D {
    pub xx: f32,
    pub xy: f32,
    pub xt: f32,
    pub yy: f32,
    pub yt: f32,
    pub tt: f32,
}

impl Information2D {
    /// Identity information: unit weight on every component.
    pub fn identity() -> Self {
        Self {
            xx: 1.0,
            xy: 0.0,
            xt: 0.0,
            yy: 1.0,
            yt: 0.0,
            tt: 1.0,
        }
    }

    /// Diagonal information from per-component standard deviations.
    pub fn from_std_dev(sigma_xy: f32, sigma_theta: f32) -> Self {
        let w_xy = 1.0 / (sigma_xy * sigma_xy).max(1e-9);
        let w_t = 1.0 / (sigma_theta * sigma_theta).max(1e-9);
        Self {
            xx: w_xy,
            xy: 0.0,
            xt: 0.0,
            yy: w_xy,
            yt: 0.0,
            tt: w_t,
        }
    }

    /// Uniformly scale every entry, used to weight edges by match quality.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            xx: self.xx * factor,
            xy: self.xy * factor,
            xt: self.xt * factor,
            yy: self.yy * factor,
            yt: self.yt * factor,
            tt: self.tt * factor,
        }
    }
}

/// A pose estimate in the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseNode {
    pub id: u64,
    pub pose: Pose2D,
    /// Fixed nodes are excluded from optimization. Only the root is fixed.
    pub fixed: bool,
    pub timestamp_us: u64,
}

/// A relative-pose constraint between two nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseEdge {
    pub from: u64,
    pub to: u64,
    /// Measured pose of `to` in the frame of `from`.
    pub relative_pose: Pose2D,
    pub information: Information2D,
    pub kind: EdgeKind,
}

/// The pose graph: contiguous nodes plus a flat edge list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseGraph {
    nodes: Vec<PoseNode>,
    edges: Vec<PoseEdge>,
}

impl PoseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, assigning the next id. Returns the id.
    pub fn add_node(&mut self, pose: Pose2D, fixed: bool, timestamp_us: u64) -> u64 {
        let id = self.nodes.len() as u64;
        self.nodes.push(PoseNode {
            id,
            pose,
            fixed,
            timestamp_us,
        });
        id
    }

    /// Append an edge. Both endpoints must already exist; an edge naming a
    /// missing node is dropped with a warning rather than corrupting the
    /// graph.
    pub fn add_edge(&mut self, edge: PoseEdge) {
        let n = self.nodes.len() as u64;
        if edge.from >= n || edge.to >= n || edge.from == edge.to {
            log::warn!(
                "dropping edge with invalid endpoints {} -> {} (graph has {} nodes)",
                edge.from,
                edge.to,
                n
            );
            return;
        }
        self.edges.push(edge);
    }

    pub fn node(&self, id: u64) -> Option<&PoseNode> {
        self.nodes.get(id as usize)
    }

    pub fn node_pose(&self, id: u64) -> Option<Pose2D> {
        self.nodes.get(id as usize).map(|n| n.pose)
    }

    /// Set a node's pose. Used by the optimizer; fixed nodes are left alone.
    pub fn set_node_pose(&mut self, id: u64, pose: Pose2D) {
        if let Some(node) = self.nodes.get_mut(id as usize) {
            if !node.fixed {
                node.pose = pose;
            }
        }
    }

    pub fn nodes(&self) -> &[PoseNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PoseEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id of the most recently added node.
    pub fn last_node_id(&self) -> Option<u64> {
        self.nodes.last().map(|n| n.id)
    }

    /// Remove every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ids_are_contiguous_from_zero() {
        let mut graph = PoseGraph::new();
        for i in 0..4 {
            let id = graph.add_node(Pose2D::new(i as f32, 0.0, 0.0), i == 0, i * 100);
            assert_eq!(id, i);
        }
        for (i, node) in graph.nodes().iter().enumerate() {
            assert_eq!(node.id, i as u64);
        }
    }

    #[test]
    fn edge_with_missing_endpoint_is_dropped() {
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.add_edge(PoseEdge {
            from: 0,
            to: 5,
            relative_pose: Pose2D::identity(),
            information: Information2D::identity(),
            kind: EdgeKind::Odometry,
        });
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn fixed_node_pose_is_not_overwritten() {
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.set_node_pose(0, Pose2D::new(1.0, 1.0, 1.0));
        let root = graph.node(0).unwrap();
        assert_relative_eq!(root.pose.x, 0.0);
        assert_relative_eq!(root.pose.theta, 0.0);
    }

    #[test]
    fn information_from_std_dev() {
        let info = Information2D::from_std_dev(0.1, 0.05);
        assert_relative_eq!(info.xx, 100.0, epsilon = 1e-3);
        assert_relative_eq!(info.yy, 100.0, epsilon = 1e-3);
        assert_relative_eq!(info.tt, 400.0, epsilon = 1e-3);
        assert_relative_eq!(info.xy, 0.0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.add_node(Pose2D::new(1.0, 0.0, 0.0), false, 100);
        graph.add_edge(PoseEdge {
            from: 0,
            to: 1,
            relative_pose: Pose2D::new(1.0, 0.0, 0.0),
            information: Information2D::identity(),
            kind: EdgeKind::Odometry,
        });
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }
}

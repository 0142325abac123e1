//! Pose graph storage.

mod pose_graph;

pub use pose_graph::{EdgeKind, Information2D, PoseEdge, PoseGraph, PoseNode};

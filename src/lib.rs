//! MargaSLAM - Incremental 2D pose-graph SLAM with pluggable deciders
//!
//! # Architecture
//!
//! The crate is organized into 5 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      bin/                           │  ← Executables
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │        (record loop, trigger policy, stats)         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │             deciders/ + optimizer/                  │  ← Strategies
//! │   (node/edge registration, loop closure, levmarq)   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              graph/ + matching/ + io/               │  ← Building blocks
//! │     (pose graph, ICP alignment, record streams)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (types, math)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! One [`StreamRecord`] at a time, the [`GraphSlamEngine`] asks its node
//! decider whether the trajectory warrants a new pose node; if so, it
//! appends the node plus its connecting edge and offers the node to the
//! edge decider for additional constraints (scan-alignment edges, loop
//! closures). Accepted loop closures trigger an immediate
//! Levenberg-Marquardt pass; otherwise optimization runs every N edges.
//! All three strategies are trait objects selected by registry name, so a
//! run can mix and match:
//!
//! ```ignore
//! use marga_slam::{GraphSlamConfig, GraphSlamEngine};
//!
//! let mut engine = GraphSlamEngine::new(
//!     "fixed-interval",
//!     "loop-closer",
//!     "levmarq",
//!     GraphSlamConfig::default(),
//! )?;
//! let stats = engine.run(&mut stream)?;
//! println!("{} nodes, {} loop closures", stats.nodes_registered, stats.loop_closures);
//! ```

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Building blocks (depend on core)
// ============================================================================
pub mod graph;
pub mod io;
pub mod matching;

// ============================================================================
// Layer 3: Pluggable strategies (depend on core, graph, matching, io)
// ============================================================================
pub mod deciders;
pub mod optimizer;

// ============================================================================
// Layer 4: Orchestration (depends on everything below)
// ============================================================================
pub mod engine;

// ============================================================================
// Crate-wide configuration and errors
// ============================================================================
pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::math;
pub use crate::core::types::{Point2D, PointCloud2D, Pose2D, Timestamped};

// Graph
pub use graph::{EdgeKind, Information2D, PoseEdge, PoseGraph, PoseNode};

// Matching
pub use matching::{AlignmentResult, IcpConfig, PointToPointIcp, ScanMatcher};

// I/O
pub use io::{GroundTruth, MemoryStream, RecordStream, StreamRecord};

// Deciders
pub use deciders::{
    make_edge_decider, make_node_decider, AlignmentEdgeDecider, AlignmentNodeDecider,
    ComponentInfo, EdgeDecider, EdgeProposal, EmptyEdgeDecider, EmptyNodeDecider,
    FixedIntervalNodeDecider, LoopCloserEdgeDecider, NodeDecider, NodeProposal, EDGE_DECIDERS,
    NODE_DECIDERS,
};

// Optimizer
pub use optimizer::{
    make_optimizer, GraphOptimizer, LevMarqOptimizer, OptimizationResult, TerminationReason,
    OPTIMIZERS,
};

// Engine
pub use engine::{GraphSlamEngine, GraphSnapshot, RunStats, StageTimings};

// Configuration and errors
pub use config::{
    EdgeDeciderConfig, GraphSlamConfig, LoopCloserConfig, NodeDeciderConfig, OptimizerConfig,
};
pub use error::{GraphSlamError, Result};

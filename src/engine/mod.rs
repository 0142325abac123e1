//! The graph-SLAM engine.
//!
//! Orchestrates the pipeline: one record in, node decider, edge decider,
//! optimizer trigger, snapshot push, statistics. Single-threaded and
//! synchronous; the optimizer runs to completion inside the loop.

mod snapshot;
mod stats;

pub use snapshot::GraphSnapshot;
pub use stats::{RunStats, StageTimings};

use std::time::Instant;

use crossbeam_channel::Sender;

use crate::config::GraphSlamConfig;
use crate::core::types::Point2D;
use crate::deciders::{make_edge_decider, make_node_decider, EdgeDecider, NodeDecider};
use crate::error::{GraphSlamError, Result};
use crate::graph::{EdgeKind, PoseEdge, PoseGraph};
use crate::io::{GroundTruth, RecordStream, StreamRecord};
use crate::optimizer::{make_optimizer, GraphOptimizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Streaming,
    Finalized,
}

/// Incremental pose-graph SLAM over a record stream.
///
/// Constructed from component names and a validated configuration; fed one
/// [`StreamRecord`] at a time (or a whole stream via [`run`](Self::run)).
pub struct GraphSlamEngine {
    config: GraphSlamConfig,
    graph: PoseGraph,
    node_decider: Box<dyn NodeDecider>,
    edge_decider: Box<dyn EdgeDecider>,
    optimizer: Box<dyn GraphOptimizer>,
    state: EngineState,
    last_timestamp_us: Option<u64>,
    /// Edges added since the last optimizer run, for the trigger policy.
    edges_since_optimization: usize,
    /// Whether the root has received its first observation.
    root_bound: bool,
    snapshot_tx: Option<Sender<GraphSnapshot>>,
    snapshot_sequence: u64,
    ground_truth: Option<GroundTruth>,
    stats: RunStats,
}

impl GraphSlamEngine {
    /// Build an engine from registry names. Unknown names and invalid
    /// parameters fail here, before any record is processed.
    pub fn new(
        node_decider_name: &str,
        edge_decider_name: &str,
        optimizer_name: &str,
        config: GraphSlamConfig,
    ) -> Result<Self> {
        config.validate()?;
        let node_decider = make_node_decider(node_decider_name, &config)?;
        let edge_decider = make_edge_decider(edge_decider_name, &config)?;
        let optimizer = make_optimizer(optimizer_name, &config)?;

        // The root node anchors the gauge: fixed at the origin.
        let mut graph = PoseGraph::new();
        graph.add_node(crate::core::types::Pose2D::identity(), true, 0);

        log::info!(
            "engine ready: node decider '{}', edge decider '{}', optimizer '{}'",
            node_decider_name,
            edge_decider_name,
            optimizer_name
        );
        Ok(Self {
            config,
            graph,
            node_decider,
            edge_decider,
            optimizer,
            state: EngineState::Streaming,
            last_timestamp_us: None,
            edges_since_optimization: 0,
            root_bound: false,
            snapshot_tx: None,
            snapshot_sequence: 0,
            ground_truth: None,
            stats: RunStats::default(),
        })
    }

    /// Attach a snapshot sink. Pushes are non-blocking; a full channel
    /// drops the snapshot rather than stalling the loop.
    pub fn attach_snapshot_sink(&mut self, sender: Sender<GraphSnapshot>) {
        self.snapshot_tx = Some(sender);
    }

    /// Attach a reference trajectory for observational error reporting.
    pub fn attach_ground_truth(&mut self, ground_truth: GroundTruth) {
        self.ground_truth = Some(ground_truth);
    }

    pub fn graph(&self) -> &PoseGraph {
        &self.graph
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process one stream record.
    pub fn process_record(&mut self, record: &StreamRecord) -> Result<()> {
        if self.state == EngineState::Finalized {
            return Err(GraphSlamError::StreamFormat(
                "record received after finalize".into(),
            ));
        }
        if let Some(last) = self.last_timestamp_us {
            if record.timestamp_us < last {
                return Err(GraphSlamError::StreamFormat(format!(
                    "timestamps went backwards: {} after {}",
                    record.timestamp_us, last
                )));
            }
        }
        self.last_timestamp_us = Some(record.timestamp_us);
        self.stats.records_processed += 1;

        // The first observation belongs to the root node; the edge decider
        // sees it once so its buffers start from the root.
        if !self.root_bound {
            if let Some(scan) = &record.scan {
                let started = Instant::now();
                if let Some(root) = self.graph.node(0).copied() {
                    let _ = self.edge_decider.consider(&root, Some(scan), &self.graph);
                }
                self.stats.timings.edge_decider += started.elapsed();
                self.root_bound = true;
            }
        }

        let started = Instant::now();
        let proposal = self.node_decider.consider(record, &self.graph);
        self.stats.timings.node_decider += started.elapsed();

        let mut loop_closure_accepted = false;
        let mut registered_node = None;
        if let Some(proposal) = proposal {
            let previous = match self.graph.last_node_id() {
                Some(id) => id,
                None => return Err(GraphSlamError::StreamFormat("graph has no root".into())),
            };
            let id = self
                .graph
                .add_node(proposal.pose, false, record.timestamp_us);
            self.graph.add_edge(PoseEdge {
                from: previous,
                to: id,
                relative_pose: proposal.relative_pose,
                information: proposal.information,
                kind: proposal.kind,
            });
            self.stats.nodes_registered += 1;
            self.stats.edges_registered += 1;
            self.edges_since_optimization += 1;
            registered_node = Some(id);
            log::debug!("registered node {} at t={}us", id, record.timestamp_us);

            // Extra constraints onto the new node.
            let node = match self.graph.node(id).copied() {
                Some(node) => node,
                None => return Err(GraphSlamError::StreamFormat("node vanished".into())),
            };
            let started = Instant::now();
            let proposals = self
                .edge_decider
                .consider(&node, record.scan.as_ref(), &self.graph);
            self.stats.timings.edge_decider += started.elapsed();
            for edge in proposals {
                if edge.kind == EdgeKind::LoopClosure {
                    loop_closure_accepted = true;
                    self.stats.loop_closures += 1;
                }
                self.graph.add_edge(PoseEdge {
                    from: edge.from,
                    to: id,
                    relative_pose: edge.relative_pose,
                    information: edge.information,
                    kind: edge.kind,
                });
                self.stats.edges_registered += 1;
                self.edges_since_optimization += 1;
            }
        }

        // Trigger policy: loop closures optimize immediately, everything
        // else waits for the edge counter.
        if loop_closure_accepted
            || self.edges_since_optimization >= self.config.optimizer.optimize_every_n_edges
        {
            self.run_optimizer();
        }

        if let (Some(gt), Some(id)) = (&self.ground_truth, registered_node) {
            if let (Some(truth), Some(estimate)) =
                (gt.pose_at(record.timestamp_us), self.graph.node_pose(id))
            {
                let error = Point2D::new(estimate.x, estimate.y)
                    .distance(&Point2D::new(truth.x, truth.y));
                self.stats.pose_errors.push((record.timestamp_us, error));
            }
        }

        self.push_snapshot();
        Ok(())
    }

    /// Drain a stream and finalize.
    pub fn run(&mut self, stream: &mut dyn RecordStream) -> Result<RunStats> {
        while let Some(record) = stream.next_record() {
            self.process_record(&record?)?;
        }
        Ok(self.finalize())
    }

    /// One last optimizer pass regardless of the trigger counter, a final
    /// snapshot, and the accumulated statistics. Records arriving after
    /// this are rejected.
    pub fn finalize(&mut self) -> RunStats {
        if self.state == EngineState::Finalized {
            return self.stats.clone();
        }
        self.run_optimizer();
        self.push_snapshot();
        self.state = EngineState::Finalized;
        log::info!(
            "finalized: {} nodes, {} edges ({} loop closures) from {} records",
            self.stats.nodes_registered + 1,
            self.stats.edges_registered,
            self.stats.loop_closures,
            self.stats.records_processed
        );
        self.stats.clone()
    }

    fn run_optimizer(&mut self) {
        let started = Instant::now();
        let result = self.optimizer.optimize(&mut self.graph);
        self.stats.timings.optimizer += started.elapsed();
        self.stats.optimizer_runs += 1;
        self.edges_since_optimization = 0;
        if !result.converged {
            self.stats.optimizer_failures += 1;
            log::warn!(
                "optimizer stopped without converging ({:?}) after {} iterations, \
                 chi2 {:.3e} -> {:.3e}; keeping best estimate",
                result.reason,
                result.iterations,
                result.initial_chi2,
                result.final_chi2
            );
        }
    }

    fn push_snapshot(&mut self) {
        if let Some(tx) = &self.snapshot_tx {
            let snapshot = GraphSnapshot::from_graph(&self.graph, self.snapshot_sequence);
            self.snapshot_sequence += 1;
            if tx.try_send(snapshot).is_err() {
                log::debug!("snapshot channel full or disconnected, dropping snapshot");
            }
        }
    }
}

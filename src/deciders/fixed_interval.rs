//! Fixed-interval node registration.

use super::{NodeDecider, NodeProposal};
use crate::config::NodeDeciderConfig;
use crate::core::types::Pose2D;
use crate::graph::{EdgeKind, Information2D, PoseGraph};
use crate::io::StreamRecord;

/// Registers a node whenever the odometry accumulated since the last
/// registered node exceeds the linear or angular threshold. The composed
/// increment becomes the connecting odometry edge.
pub struct FixedIntervalNodeDecider {
    config: NodeDeciderConfig,
    /// Composed pose increment since the last registered node.
    accumulated: Pose2D,
    /// Path-length style scalar accumulators; these trigger registration.
    linear: f32,
    angular: f32,
}

impl FixedIntervalNodeDecider {
    pub fn new(config: NodeDeciderConfig) -> Self {
        Self {
            config,
            accumulated: Pose2D::identity(),
            linear: 0.0,
            angular: 0.0,
        }
    }

    /// Fold one odometry increment into the accumulators and report whether
    /// a threshold was reached.
    pub(crate) fn accumulate(&mut self, increment: &Pose2D) -> bool {
        self.accumulated = self.accumulated.compose(increment);
        self.linear += increment.translation_norm();
        self.angular += increment.theta.abs();
        self.linear >= self.config.linear_distance_threshold
            || self.angular >= self.config.angular_distance_threshold
    }

    /// Take the composed increment and reset state. The scalar accumulators
    /// keep the residual above their threshold so oversized increments are
    /// not silently swallowed.
    pub(crate) fn take_increment(&mut self) -> Pose2D {
        let increment = self.accumulated;
        self.accumulated = Pose2D::identity();
        self.linear = (self.linear - self.config.linear_distance_threshold).max(0.0);
        self.angular = (self.angular - self.config.angular_distance_threshold).max(0.0);
        increment
    }

    pub(crate) fn odometry_information(&self) -> Information2D {
        Information2D::from_std_dev(
            self.config.odometry_translation_std_dev,
            self.config.odometry_rotation_std_dev,
        )
    }
}

impl NodeDecider for FixedIntervalNodeDecider {
    fn consider(&mut self, record: &StreamRecord, graph: &PoseGraph) -> Option<NodeProposal> {
        if !self.accumulate(&record.odometry) {
            return None;
        }
        let previous = graph.last_node_id().and_then(|id| graph.node_pose(id))?;
        let increment = self.take_increment();
        Some(NodeProposal {
            pose: previous.compose(&increment),
            relative_pose: increment,
            information: self.odometry_information(),
            kind: EdgeKind::Odometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn graph_with_root() -> PoseGraph {
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph
    }

    fn decider(linear: f32) -> FixedIntervalNodeDecider {
        FixedIntervalNodeDecider::new(NodeDeciderConfig {
            linear_distance_threshold: linear,
            ..NodeDeciderConfig::default()
        })
    }

    #[test]
    fn below_threshold_proposes_nothing() {
        let mut decider = decider(0.5);
        let graph = graph_with_root();
        let rec = StreamRecord::new(100, Pose2D::new(0.2, 0.0, 0.0));
        assert!(decider.consider(&rec, &graph).is_none());
        let rec = StreamRecord::new(200, Pose2D::new(0.2, 0.0, 0.0));
        assert!(decider.consider(&rec, &graph).is_none());
    }

    #[test]
    fn crossing_threshold_proposes_with_residual_carry() {
        let mut decider = decider(0.5);
        let graph = graph_with_root();

        assert!(decider
            .consider(&StreamRecord::new(100, Pose2D::new(0.2, 0.0, 0.0)), &graph)
            .is_none());
        assert!(decider
            .consider(&StreamRecord::new(200, Pose2D::new(0.2, 0.0, 0.0)), &graph)
            .is_none());

        let proposal = decider
            .consider(&StreamRecord::new(300, Pose2D::new(0.2, 0.0, 0.0)), &graph)
            .unwrap();
        assert_relative_eq!(proposal.relative_pose.x, 0.6, epsilon = 1e-6);
        assert_eq!(proposal.kind, EdgeKind::Odometry);
        // 0.6 accumulated - 0.5 threshold leaves 0.1 in the accumulator.
        assert_relative_eq!(decider.linear, 0.1, epsilon = 1e-6);
        assert_relative_eq!(decider.accumulated.x, 0.0);
    }

    #[test]
    fn rotation_alone_triggers() {
        let mut decider = FixedIntervalNodeDecider::new(NodeDeciderConfig {
            angular_distance_threshold: 0.3,
            ..NodeDeciderConfig::default()
        });
        let graph = graph_with_root();
        assert!(decider
            .consider(&StreamRecord::new(100, Pose2D::new(0.0, 0.0, 0.2)), &graph)
            .is_none());
        let proposal = decider
            .consider(&StreamRecord::new(200, Pose2D::new(0.0, 0.0, 0.2)), &graph)
            .unwrap();
        assert_relative_eq!(proposal.relative_pose.theta, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn global_pose_composes_onto_previous_node() {
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::new(1.0, 2.0, 0.0), true, 0);
        let mut decider = decider(0.5);
        let proposal = decider
            .consider(&StreamRecord::new(100, Pose2D::new(0.6, 0.0, 0.0)), &graph)
            .unwrap();
        assert_relative_eq!(proposal.pose.x, 1.6, epsilon = 1e-6);
        assert_relative_eq!(proposal.pose.y, 2.0, epsilon = 1e-6);
    }
}

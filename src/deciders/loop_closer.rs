//! Pairwise-consistent loop closure.
//!
//! Registered nodes are grouped into spatial partitions by position. When a
//! new node lands near a partition containing much older nodes, each such
//! node becomes a loop-closure candidate: its stored observation is aligned
//! against the new one. Surviving candidates are then checked pairwise for
//! mutual consistency, and only the largest mutually consistent subset is
//! accepted. A single inconsistent round never mutates graph state.

use std::collections::HashMap;

use super::{alignment_information, EdgeDecider, EdgeProposal};
use crate::config::{EdgeDeciderConfig, LoopCloserConfig};
use crate::core::math;
use crate::core::types::{Point2D, PointCloud2D, Pose2D};
use crate::graph::{EdgeKind, PoseGraph, PoseNode};
use crate::matching::{IcpConfig, PointToPointIcp, ScanMatcher};

/// A spatial bucket of registered nodes.
struct Partition {
    centroid: Point2D,
    node_ids: Vec<u64>,
}

/// A candidate loop-closure edge that survived alignment.
struct Candidate {
    from: u64,
    /// Measured pose of the new node in the candidate node's frame.
    relative_pose: Pose2D,
    score: f32,
    /// Global pose of the new node implied by this candidate.
    implied: Pose2D,
}

/// Loop-closure edge decider.
pub struct LoopCloserEdgeDecider {
    config: LoopCloserConfig,
    matcher: PointToPointIcp,
    partitions: Vec<Partition>,
    scans: HashMap<u64, PointCloud2D>,
}

impl LoopCloserEdgeDecider {
    pub fn new(config: LoopCloserConfig, edge_config: EdgeDeciderConfig) -> Self {
        Self {
            config,
            matcher: PointToPointIcp::new(IcpConfig {
                max_iterations: edge_config.max_icp_iterations as u32,
                epsilon: edge_config.icp_epsilon,
                max_correspondence_distance: edge_config.max_correspondence_distance,
                ..IcpConfig::default()
            }),
            partitions: Vec::new(),
            scans: HashMap::new(),
        }
    }

    /// Add a node to the nearest partition within the join radius, or open
    /// a new partition around it.
    fn assign_to_partition(&mut self, id: u64, position: Point2D) {
        let radius_sq = self.config.partition_radius * self.config.partition_radius;
        let nearest = self
            .partitions
            .iter_mut()
            .map(|p| (position.distance_squared(&p.centroid), p))
            .filter(|(d, _)| *d <= radius_sq)
            .min_by(|(a, _), (b, _)| a.total_cmp(b));
        match nearest {
            Some((_, partition)) => {
                // Incremental centroid update over member count.
                let n = partition.node_ids.len() as f32;
                partition.centroid.x = (partition.centroid.x * n + position.x) / (n + 1.0);
                partition.centroid.y = (partition.centroid.y * n + position.y) / (n + 1.0);
                partition.node_ids.push(id);
            }
            None => self.partitions.push(Partition {
                centroid: position,
                node_ids: vec![id],
            }),
        }
    }

    /// Ids of prior nodes worth aligning against: members of in-range
    /// partitions that are old enough to represent a revisit, nearest first.
    fn candidate_ids(&self, node: &PoseNode, graph: &PoseGraph) -> Vec<u64> {
        let position = Point2D::new(node.pose.x, node.pose.y);
        let radius_sq = self.config.partition_radius * self.config.partition_radius;

        let mut ids: Vec<(f32, u64)> = Vec::new();
        for partition in &self.partitions {
            if position.distance_squared(&partition.centroid) > radius_sq {
                continue;
            }
            for &id in &partition.node_ids {
                if node.id < id + self.config.min_nodes_apart {
                    continue;
                }
                if !self.scans.contains_key(&id) {
                    continue;
                }
                if let Some(pose) = graph.node_pose(id) {
                    let d = position.distance_squared(&Point2D::new(pose.x, pose.y));
                    ids.push((d, id));
                }
            }
        }
        ids.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        ids.truncate(self.config.max_candidates_per_round);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Align the new observation against each candidate's stored one.
    fn align_candidates(
        &self,
        node: &PoseNode,
        scan: &PointCloud2D,
        candidate_ids: &[u64],
        graph: &PoseGraph,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for &id in candidate_ids {
            let (candidate_pose, candidate_scan) = match (graph.node_pose(id), self.scans.get(&id))
            {
                (Some(pose), Some(scan)) => (pose, scan),
                _ => continue,
            };
            let guess = candidate_pose.relative_to(&node.pose);
            let result = self.matcher.align(scan, candidate_scan, &guess);
            if !result.converged || result.score < self.config.min_alignment_score {
                log::debug!(
                    "loop candidate {} -> {} dropped (converged={}, score={:.3})",
                    id,
                    node.id,
                    result.converged,
                    result.score
                );
                continue;
            }
            candidates.push(Candidate {
                from: id,
                relative_pose: result.transform,
                score: result.score,
                implied: candidate_pose.compose(&result.transform),
            });
        }
        candidates
    }

    /// Discrepancy between the new-node poses implied by two candidates:
    /// combined translation plus weighted heading difference.
    fn discrepancy(&self, a: &Candidate, b: &Candidate) -> f32 {
        let dx = a.implied.x - b.implied.x;
        let dy = a.implied.y - b.implied.y;
        let dt = math::angle_diff(a.implied.theta, b.implied.theta) * self.config.rotation_weight;
        (dx * dx + dy * dy + dt * dt).sqrt()
    }

    /// Largest mutually consistent subset, by greedy seeded extension.
    ///
    /// Every candidate is tried as a seed; the rest are added in descending
    /// score order when consistent with everything already in the set. The
    /// biggest set wins, ties broken by higher summed score.
    fn consistent_subset(&self, candidates: &[Candidate]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

        let consistent = |i: usize, j: usize| {
            self.discrepancy(&candidates[i], &candidates[j]) <= self.config.consistency_tolerance
        };

        let mut best: Vec<usize> = Vec::new();
        let mut best_score = 0.0f32;
        for &seed in &order {
            let mut set = vec![seed];
            let mut score = candidates[seed].score;
            for &other in &order {
                if other == seed {
                    continue;
                }
                if set.iter().all(|&member| consistent(member, other)) {
                    set.push(other);
                    score += candidates[other].score;
                }
            }
            if set.len() > best.len() || (set.len() == best.len() && score > best_score) {
                best = set;
                best_score = score;
            }
        }
        best
    }
}

impl EdgeDecider for LoopCloserEdgeDecider {
    fn consider(
        &mut self,
        node: &PoseNode,
        scan: Option<&PointCloud2D>,
        graph: &PoseGraph,
    ) -> Vec<EdgeProposal> {
        let candidate_ids = match scan {
            Some(scan) if !scan.is_empty() => {
                let ids = self.candidate_ids(node, graph);
                self.scans.insert(node.id, scan.clone());
                ids
            }
            _ => Vec::new(),
        };
        self.assign_to_partition(node.id, Point2D::new(node.pose.x, node.pose.y));

        let scan = match scan {
            Some(scan) => scan,
            None => return Vec::new(),
        };
        if candidate_ids.is_empty() {
            return Vec::new();
        }

        let candidates = self.align_candidates(node, scan, &candidate_ids, graph);
        if candidates.is_empty() {
            return Vec::new();
        }

        let accepted = if candidates.len() == 1 {
            vec![0]
        } else {
            let subset = self.consistent_subset(&candidates);
            // Multiple hypotheses with no mutual support: ambiguous, so
            // reject the whole round.
            if subset.len() <= 1 {
                log::debug!(
                    "rejecting {} mutually inconsistent loop candidates at node {}",
                    candidates.len(),
                    node.id
                );
                return Vec::new();
            }
            subset
        };

        log::info!(
            "node {}: accepting {} of {} loop-closure candidates",
            node.id,
            accepted.len(),
            candidates.len()
        );
        accepted
            .into_iter()
            .map(|i| {
                let c = &candidates[i];
                EdgeProposal {
                    from: c.from,
                    relative_pose: c.relative_pose,
                    information: alignment_information(c.score),
                    kind: EdgeKind::LoopClosure,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn corner_cloud(n: usize, length: f32) -> PointCloud2D {
        let mut cloud = PointCloud2D::with_capacity(2 * n);
        for i in 0..n {
            let s = (i as f32 / (n - 1) as f32) * length;
            cloud.push(Point2D::new(s, 0.0));
            if i > 0 {
                cloud.push(Point2D::new(0.0, s));
            }
        }
        cloud
    }

    fn decider(config: LoopCloserConfig) -> LoopCloserEdgeDecider {
        LoopCloserEdgeDecider::new(config, EdgeDeciderConfig::default())
    }

    /// Feed a node through the decider, with the scan the robot would see
    /// from `true_pose` in a world observed as `world` from the origin.
    fn observe(
        decider: &mut LoopCloserEdgeDecider,
        graph: &PoseGraph,
        id: u64,
        world: &PointCloud2D,
        true_pose: Pose2D,
    ) -> Vec<EdgeProposal> {
        let node = *graph.node(id).unwrap();
        let seen = world.transform(&true_pose.inverse());
        decider.consider(&node, Some(&seen), graph)
    }

    #[test]
    fn distant_nodes_produce_no_candidates() {
        let mut decider = decider(LoopCloserConfig {
            partition_radius: 1.0,
            min_nodes_apart: 1,
            ..LoopCloserConfig::default()
        });
        let world = corner_cloud(40, 2.0);
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.add_node(Pose2D::new(10.0, 0.0, 0.0), false, 100);

        assert!(observe(&mut decider, &graph, 0, &world, Pose2D::identity()).is_empty());
        let far_world = corner_cloud(40, 2.0).transform(&Pose2D::new(10.0, 0.0, 0.0));
        assert!(observe(
            &mut decider,
            &graph,
            1,
            &far_world,
            Pose2D::new(10.0, 0.0, 0.0)
        )
        .is_empty());
    }

    #[test]
    fn recent_nodes_are_not_candidates() {
        let mut decider = decider(LoopCloserConfig {
            min_nodes_apart: 5,
            ..LoopCloserConfig::default()
        });
        let world = corner_cloud(40, 2.0);
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.add_node(Pose2D::new(0.1, 0.0, 0.0), false, 100);

        assert!(observe(&mut decider, &graph, 0, &world, Pose2D::identity()).is_empty());
        // Node 1 is only 1 id away from node 0: below min_nodes_apart.
        assert!(observe(&mut decider, &graph, 1, &world, Pose2D::new(0.1, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn sole_candidate_is_accepted() {
        let mut decider = decider(LoopCloserConfig {
            min_nodes_apart: 1,
            ..LoopCloserConfig::default()
        });
        let world = corner_cloud(50, 2.0);
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        // Revisit near the origin; graph estimate drifted a little.
        graph.add_node(Pose2D::new(0.12, 0.05, 0.0), false, 100);

        assert!(observe(&mut decider, &graph, 0, &world, Pose2D::identity()).is_empty());
        let truth = Pose2D::new(0.1, 0.05, 0.0);
        let proposals = observe(&mut decider, &graph, 1, &world, truth);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].from, 0);
        assert_eq!(proposals[0].kind, EdgeKind::LoopClosure);
        assert_relative_eq!(proposals[0].relative_pose.x, truth.x, epsilon = 0.03);
    }

    #[test]
    fn consistent_pair_is_accepted_together() {
        let mut decider = decider(LoopCloserConfig {
            min_nodes_apart: 1,
            consistency_tolerance: 0.25,
            ..LoopCloserConfig::default()
        });
        let world = corner_cloud(50, 2.0);
        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        graph.add_node(Pose2D::new(0.2, 0.0, 0.0), false, 100);
        graph.add_node(Pose2D::new(0.15, 0.1, 0.0), false, 200);

        assert!(observe(&mut decider, &graph, 0, &world, Pose2D::identity()).is_empty());
        let _ = observe(&mut decider, &graph, 1, &world, Pose2D::new(0.2, 0.0, 0.0));
        let proposals = observe(&mut decider, &graph, 2, &world, Pose2D::new(0.15, 0.1, 0.0));
        assert_eq!(proposals.len(), 2);
        assert!(proposals.iter().all(|p| p.kind == EdgeKind::LoopClosure));
    }

    #[test]
    fn inconsistent_candidates_reject_the_round() {
        let mut decider = decider(LoopCloserConfig {
            min_nodes_apart: 1,
            consistency_tolerance: 0.05,
            min_alignment_score: 0.1,
            ..LoopCloserConfig::default()
        });
        let world = corner_cloud(50, 2.0);

        let mut graph = PoseGraph::new();
        graph.add_node(Pose2D::identity(), true, 0);
        // Node 1's graph estimate is 0.15 m off its true pose, so the pose
        // it implies for node 2 disagrees with node 0's by 0.15 m, well
        // beyond the 0.05 m tolerance.
        graph.add_node(Pose2D::new(0.2, 0.0, 0.0), false, 100);
        graph.add_node(Pose2D::new(0.1, 0.0, 0.0), false, 200);

        assert!(observe(&mut decider, &graph, 0, &world, Pose2D::identity()).is_empty());
        // Node 1 truly sits closer to the origin than its estimate says.
        let _ = observe(&mut decider, &graph, 1, &world, Pose2D::new(0.05, 0.0, 0.0));
        let proposals = observe(&mut decider, &graph, 2, &world, Pose2D::new(0.1, 0.0, 0.0));
        assert!(proposals.is_empty());
    }

    #[test]
    fn consistency_metric_weights_rotation() {
        let decider = decider(LoopCloserConfig {
            rotation_weight: 2.0,
            ..LoopCloserConfig::default()
        });
        let a = Candidate {
            from: 0,
            relative_pose: Pose2D::identity(),
            score: 1.0,
            implied: Pose2D::new(0.0, 0.0, 0.1),
        };
        let b = Candidate {
            from: 1,
            relative_pose: Pose2D::identity(),
            score: 1.0,
            implied: Pose2D::new(0.0, 0.0, -0.1),
        };
        assert_relative_eq!(decider.discrepancy(&a, &b), 0.4, epsilon = 1e-5);
    }
}

//! End-to-end engine scenarios over in-memory record streams.

use marga_slam::{
    GraphSlamConfig, GraphSlamEngine, GraphSlamError, GroundTruth, MemoryStream, Point2D,
    PointCloud2D, Pose2D, StreamRecord, Timestamped,
};

fn make_engine(node: &str, edge: &str, config: GraphSlamConfig) -> GraphSlamEngine {
    GraphSlamEngine::new(node, edge, "levmarq", config).expect("engine construction")
}

fn forward(timestamp_us: u64, dx: f32) -> StreamRecord {
    StreamRecord::new(timestamp_us, Pose2D::new(dx, 0.0, 0.0))
}

/// Walls of the room surrounding the loop, in the robot's start frame.
fn room_walls(side_x: f32, side_y: f32, margin: f32, spacing: f32) -> PointCloud2D {
    let (x0, x1) = (-margin, side_x + margin);
    let (y0, y1) = (-margin, side_y + margin);
    let mut cloud = PointCloud2D::new();
    let mut x = x0;
    while x <= x1 {
        cloud.push(Point2D::new(x, y0));
        cloud.push(Point2D::new(x, y1));
        x += spacing;
    }
    let mut y = y0 + spacing;
    while y < y1 {
        cloud.push(Point2D::new(x0, y));
        cloud.push(Point2D::new(x1, y));
        y += spacing;
    }
    cloud
}

/// True poses around a rectangular loop anchored at the origin, with 90°
/// turns at the corners.
fn loop_poses(side_x: f32, side_y: f32, step: f32, laps: usize) -> Vec<Pose2D> {
    let corners = [
        Pose2D::new(0.0, 0.0, 0.0),
        Pose2D::new(side_x, 0.0, std::f32::consts::FRAC_PI_2),
        Pose2D::new(side_x, side_y, std::f32::consts::PI),
        Pose2D::new(0.0, side_y, -std::f32::consts::FRAC_PI_2),
    ];
    let mut poses = Vec::new();
    for _ in 0..laps {
        for (i, corner) in corners.iter().enumerate() {
            let next = corners[(i + 1) % corners.len()];
            let dist = ((next.x - corner.x).powi(2) + (next.y - corner.y).powi(2)).sqrt();
            let steps = (dist / step).ceil() as usize;
            for s in 0..steps {
                let t = s as f32 / steps as f32;
                poses.push(Pose2D::new(
                    corner.x + (next.x - corner.x) * t,
                    corner.y + (next.y - corner.y) * t,
                    corner.theta,
                ));
            }
        }
    }
    poses
}

/// Exact odometry and exact scans along a trajectory.
fn exact_stream(poses: &[Pose2D], world: &PointCloud2D) -> MemoryStream {
    let mut stream = MemoryStream::default();
    let mut previous = Pose2D::identity();
    for (i, pose) in poses.iter().enumerate() {
        let increment = previous.relative_to(pose);
        let scan = world.transform(&pose.inverse());
        stream.push(StreamRecord::with_scan(
            (i as u64 + 1) * 100_000,
            increment,
            scan,
        ));
        previous = *pose;
    }
    stream
}

#[test]
fn unknown_component_names_are_config_errors() {
    let config = GraphSlamConfig::default();
    for (node, edge, opt) in [
        ("bogus", "none", "levmarq"),
        ("none", "bogus", "levmarq"),
        ("none", "none", "bogus"),
    ] {
        let result = GraphSlamEngine::new(node, edge, opt, config.clone());
        assert!(
            matches!(result, Err(GraphSlamError::Config(_))),
            "expected Config error for ({node}, {edge}, {opt})"
        );
    }
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = GraphSlamConfig::default();
    config.optimizer.max_iterations = 0;
    assert!(GraphSlamEngine::new("none", "none", "levmarq", config).is_err());
}

#[test]
fn noop_deciders_leave_only_the_root() {
    let mut engine = make_engine("none", "none", GraphSlamConfig::default());
    let mut stream = MemoryStream::new(vec![
        forward(100, 0.5),
        forward(200, 0.5),
        forward(300, 0.5),
    ]);
    let stats = engine.run(&mut stream).unwrap();

    assert_eq!(engine.graph().node_count(), 1);
    assert_eq!(engine.graph().edge_count(), 0);
    assert!(engine.graph().node(0).unwrap().fixed);
    assert_eq!(stats.nodes_registered, 0);
    assert_eq!(stats.records_processed, 3);
}

#[test]
fn fixed_interval_registers_on_threshold_crossing() {
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.5;
    let mut engine = make_engine("fixed-interval", "none", config);

    // 0.4 m accumulated: no node yet.
    engine.process_record(&forward(100, 0.2)).unwrap();
    engine.process_record(&forward(200, 0.2)).unwrap();
    assert_eq!(engine.graph().node_count(), 1);

    // Reaching 0.6 m registers exactly one node with its odometry edge.
    engine.process_record(&forward(300, 0.2)).unwrap();
    assert_eq!(engine.graph().node_count(), 2);
    assert_eq!(engine.graph().edge_count(), 1);
    let node = engine.graph().node(1).unwrap();
    assert!(!node.fixed);
    assert_eq!(node.timestamp_us, 300);
    assert!((node.pose.x - 0.6).abs() < 1e-5);
}

#[test]
fn node_ids_increase_strictly_from_zero() {
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.1;
    let mut engine = make_engine("fixed-interval", "none", config);
    let mut stream = MemoryStream::new(
        (1..=20)
            .map(|i| forward(i as u64 * 100, 0.15))
            .collect(),
    );
    engine.run(&mut stream).unwrap();

    let nodes = engine.graph().nodes();
    assert!(nodes.len() > 2);
    for (i, node) in nodes.iter().enumerate() {
        assert_eq!(node.id, i as u64);
    }
}

#[test]
fn out_of_order_timestamps_abort_the_run() {
    let mut engine = make_engine("fixed-interval", "none", GraphSlamConfig::default());
    engine.process_record(&forward(500, 0.1)).unwrap();
    match engine.process_record(&forward(400, 0.1)) {
        Err(GraphSlamError::StreamFormat(_)) => {}
        other => panic!("expected StreamFormat error, got {other:?}"),
    }
    // Equal timestamps are fine (non-decreasing order).
    let mut engine = make_engine("fixed-interval", "none", GraphSlamConfig::default());
    engine.process_record(&forward(500, 0.1)).unwrap();
    engine.process_record(&forward(500, 0.1)).unwrap();
}

#[test]
fn finalize_runs_a_last_pass_and_rejects_records() {
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.5;
    config.optimizer.optimize_every_n_edges = 100;
    let mut engine = make_engine("fixed-interval", "none", config);

    engine.process_record(&forward(100, 0.6)).unwrap();
    engine.process_record(&forward(200, 0.6)).unwrap();
    let stats = engine.finalize();
    // The trigger counter never fired, so the only run is the final pass.
    assert_eq!(stats.optimizer_runs, 1);

    assert!(engine.process_record(&forward(300, 0.6)).is_err());
    // A second finalize is a no-op.
    let again = engine.finalize();
    assert_eq!(again.optimizer_runs, 1);
}

#[test]
fn edge_counter_triggers_optimization() {
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.5;
    config.optimizer.optimize_every_n_edges = 2;
    let mut engine = make_engine("fixed-interval", "none", config);

    engine.process_record(&forward(100, 0.6)).unwrap();
    assert_eq!(engine.stats().optimizer_runs, 0);
    engine.process_record(&forward(200, 0.6)).unwrap();
    assert_eq!(engine.stats().optimizer_runs, 1);
}

#[test]
fn root_pose_survives_optimization() {
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.3;
    config.optimizer.optimize_every_n_edges = 1;
    let mut engine = make_engine("fixed-interval", "none", config);

    let mut stream = MemoryStream::new(
        (1..=15)
            .map(|i| {
                StreamRecord::new(i as u64 * 100, Pose2D::new(0.35, 0.01 * i as f32, 0.02))
            })
            .collect(),
    );
    engine.run(&mut stream).unwrap();

    let root = engine.graph().node(0).unwrap();
    assert!(root.fixed);
    assert_eq!(root.pose.x, 0.0);
    assert_eq!(root.pose.y, 0.0);
    assert_eq!(root.pose.theta, 0.0);
}

#[test]
fn snapshots_arrive_without_blocking() {
    let (tx, rx) = crossbeam_channel::bounded(4);
    let mut engine = make_engine("fixed-interval", "none", GraphSlamConfig::default());
    engine.attach_snapshot_sink(tx);

    // More records than channel capacity: extras are dropped, never block.
    for i in 1..=10 {
        engine.process_record(&forward(i * 100, 0.2)).unwrap();
    }
    engine.finalize();

    let snapshots: Vec<_> = rx.try_iter().collect();
    assert!(!snapshots.is_empty());
    assert!(snapshots.len() <= 4);
    // Sequence numbers are strictly increasing.
    for pair in snapshots.windows(2) {
        assert!(pair[1].sequence > pair[0].sequence);
    }
}

#[test]
fn ground_truth_errors_are_recorded_per_node() {
    let truth = GroundTruth::new(vec![
        Timestamped::new(Pose2D::identity(), 0),
        Timestamped::new(Pose2D::new(2.0, 0.0, 0.0), 2_000),
    ]);
    let mut config = GraphSlamConfig::default();
    config.node_decider.linear_distance_threshold = 0.5;
    let mut engine = make_engine("fixed-interval", "none", config);
    engine.attach_ground_truth(truth);

    let mut stream = MemoryStream::new(
        (1..=10)
            .map(|i| forward(i as u64 * 200, 0.2))
            .collect(),
    );
    let stats = engine.run(&mut stream).unwrap();
    assert_eq!(stats.pose_errors.len() as u64, stats.nodes_registered);
    // Exact odometry: the estimate tracks the truth closely.
    assert!(stats.mean_pose_error().unwrap() < 0.01);
}

#[test]
fn full_pipeline_closes_the_loop_on_a_revisited_room() {
    let world = room_walls(4.0, 3.0, 0.5, 0.05);
    let poses = loop_poses(4.0, 3.0, 0.1, 2);
    let mut stream = exact_stream(&poses, &world);

    let mut engine = make_engine("fixed-interval", "loop-closer", GraphSlamConfig::default());
    let truth: Vec<_> = poses
        .iter()
        .enumerate()
        .map(|(i, p)| Timestamped::new(*p, (i as u64 + 1) * 100_000))
        .collect();
    engine.attach_ground_truth(GroundTruth::new(truth));

    let stats = engine.run(&mut stream).unwrap();

    assert!(stats.nodes_registered > 10);
    assert!(
        stats.loop_closures > 0,
        "second lap should close at least one loop"
    );
    // Exact data: the trajectory stays on the ground truth.
    assert!(stats.mean_pose_error().unwrap() < 0.1);
}

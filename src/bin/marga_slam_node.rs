//! Demo binary: run the graph-SLAM engine over a synthetic noisy loop.
//!
//! A simulated robot drives two laps around a rectangular room, observing
//! the walls from each pose. Odometry is corrupted with uniform noise, so
//! the trajectory drifts until the loop closer pulls it back together.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use marga_slam::{
    ComponentInfo, GraphSlamConfig, GraphSlamEngine, GroundTruth, MemoryStream, Point2D,
    PointCloud2D, Pose2D, StreamRecord, Timestamped, EDGE_DECIDERS, NODE_DECIDERS, OPTIMIZERS,
};

#[derive(Parser, Debug)]
#[command(
    name = "marga-slam-node",
    about = "Incremental pose-graph SLAM over a synthetic loop trajectory"
)]
struct Args {
    /// Node registration decider.
    #[arg(long, default_value = "fixed-interval")]
    node_reg: String,

    /// Edge registration decider.
    #[arg(long, default_value = "loop-closer")]
    edge_reg: String,

    /// Graph optimizer.
    #[arg(long, default_value = "levmarq")]
    optimizer: String,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ground-truth trajectory file (lines of `timestamp_us x y theta`).
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// List available node registration deciders and exit.
    #[arg(long)]
    list_node_regs: bool,

    /// List available edge registration deciders and exit.
    #[arg(long)]
    list_edge_regs: bool,

    /// List all registration deciders and exit.
    #[arg(long)]
    list_regs: bool,

    /// List available optimizers and exit.
    #[arg(long)]
    list_optimizers: bool,

    /// Number of simulated laps around the room.
    #[arg(long, default_value_t = 2)]
    laps: usize,

    /// Odometry noise bound, in meters per step.
    #[arg(long, default_value_t = 0.005)]
    noise: f32,

    /// RNG seed for the simulation.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn print_table(title: &str, table: &[ComponentInfo]) {
    println!("{title}:");
    for info in table {
        println!("  {:<16} {}", info.name, info.description);
    }
}

/// The room the simulated robot observes: four walls as a point cloud in
/// the robot's start frame, with `margin` of clearance around the loop.
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

/// True poses around a rectangular loop anchored at the origin, `step`
/// meters apart, with 90° turns at the corners.
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

/// Build the record stream: noisy odometry increments plus the scan each
/// true pose would observe. Returns the stream and the true trajectory.
fn simulate(args: &Args) -> (MemoryStream, Vec<Timestamped<Pose2D>>) {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let world = room_walls(4.0, 3.0, 0.5, 0.05);
    let poses = loop_poses(4.0, 3.0, 0.1, args.laps);

    let mut stream = MemoryStream::default();
    let mut truth = Vec::with_capacity(poses.len());
    let mut previous = Pose2D::identity();
    for (i, pose) in poses.iter().enumerate() {
        let timestamp_us = (i as u64 + 1) * 100_000;
        let mut increment = previous.relative_to(pose);
        if args.noise > 0.0 {
            increment = Pose2D::new(
                increment.x + rng.gen_range(-args.noise..args.noise),
                increment.y + rng.gen_range(-args.noise..args.noise),
                increment.theta + rng.gen_range(-args.noise..args.noise) * 0.5,
            );
        }
        let scan = world.transform(&pose.inverse());
        stream.push(StreamRecord::with_scan(timestamp_us, increment, scan));
        truth.push(Timestamped::new(*pose, timestamp_us));
        previous = *pose;
    }
    (stream, truth)
}

fn run(args: &Args) -> marga_slam::Result<()> {
    let config = match &args.config {
        Some(path) => GraphSlamConfig::from_file(path)?,
        None => GraphSlamConfig::default(),
    };

    let mut engine = GraphSlamEngine::new(&args.node_reg, &args.edge_reg, &args.optimizer, config)?;

    let (mut stream, truth) = simulate(args);
    match &args.ground_truth {
        Some(path) => engine.attach_ground_truth(GroundTruth::from_file(path)?),
        None => engine.attach_ground_truth(GroundTruth::new(truth)),
    }

    let records = stream.len();
    let stats = engine.run(&mut stream)?;

    println!("processed {records} records");
    println!(
        "graph: {} nodes, {} edges ({} loop closures)",
        engine.graph().node_count(),
        engine.graph().edge_count(),
        stats.loop_closures
    );
    println!(
        "optimizer: {} runs, {} without convergence",
        stats.optimizer_runs, stats.optimizer_failures
    );
    println!(
        "time: node decider {:?}, edge decider {:?}, optimizer {:?}",
        stats.timings.node_decider, stats.timings.edge_decider, stats.timings.optimizer
    );
    if let Some(mean) = stats.mean_pose_error() {
        println!("mean pose error vs ground truth: {mean:.3} m");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.list_regs || args.list_node_regs {
        print_table("node registration deciders", NODE_DECIDERS);
    }
    if args.list_regs || args.list_edge_regs {
        print_table("edge registration deciders", EDGE_DECIDERS);
    }
    if args.list_optimizers {
        print_table("optimizers", OPTIMIZERS);
    }
    if args.list_regs || args.list_node_regs || args.list_edge_regs || args.list_optimizers {
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

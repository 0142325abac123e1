//! Point-to-point iterative closest point.
//!
//! Each iteration pairs every transformed source point with its nearest
//! target neighbor (k-d tree), solves the closed-form 2D rigid registration
//! over the surviving pairs, and folds the increment into the running
//! transform until the increment falls below epsilon.

use kiddo::SquaredEuclidean;

use super::{AlignmentResult, ScanMatcher};
use crate::core::types::{PointCloud2D, Pose2D};

/// k-d tree over target points. The bucket size must exceed the number of
/// points kiddo can see at the same coordinate on one axis during a split,
/// or construction panics; wall scans put hundreds of points on a single
/// axis value, so the default (32) is far too small.
type ScanTree = kiddo::float::kdtree::KdTree<f32, u64, 2, 512, u32>;

/// Sub-resolution offset spreading coordinate ties among tree entries, so
/// even degenerate clouds larger than a bucket cannot overflow a split.
/// Small enough (< 0.1 mm) to be invisible to the correspondence gate.
const TIE_SPACING: f32 = 1e-6;
const TIE_CYCLE: usize = 64;

/// Tuning parameters for [`PointToPointIcp`].
#[derive(Debug, Clone)]
pub struct IcpConfig {
    pub max_iterations: u32,
    /// Convergence threshold on the per-iteration transform update,
    /// applied to both translation (meters) and rotation (radians).
    pub epsilon: f32,
    /// Pairs farther apart than this are discarded, in meters.
    pub max_correspondence_distance: f32,
    /// Minimum surviving pairs; fewer and the alignment fails.
    pub min_correspondences: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 1e-4,
            max_correspondence_distance: 0.5,
            min_correspondences: 10,
        }
    }
}

/// Point-to-point ICP over a k-d tree.
#[derive(Debug, Clone)]
pub struct PointToPointIcp {
    config: IcpConfig,
}

impl PointToPointIcp {
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    fn build_tree(cloud: &PointCloud2D) -> ScanTree {
        let mut tree = ScanTree::with_capacity(cloud.len());
        for (i, point) in cloud.points.iter().enumerate() {
            // The offsets only perturb where entries land in the tree; the
            // exact coordinates are looked up by index for the solve.
            let tie = (i % TIE_CYCLE) as f32 * TIE_SPACING;
            tree.add(&[point.x + tie, point.y + tie], i as u64);
        }
        tree
    }

    /// Pair each transformed source point with its nearest target point.
    /// Returns (source index, target index) pairs within the distance gate.
    fn correspondences(
        &self,
        source: &PointCloud2D,
        tree: &ScanTree,
        transform: &Pose2D,
    ) -> Vec<(usize, usize)> {
        let gate_sq = self.config.max_correspondence_distance.powi(2);
        let mut pairs = Vec::with_capacity(source.len());
        for (i, point) in source.points.iter().enumerate() {
            let moved = transform.transform_point(point);
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[moved.x, moved.y]);
            if nearest.distance <= gate_sq {
                pairs.push((i, nearest.item as usize));
            }
        }
        pairs
    }

    /// Closed-form least-squares rigid registration of the paired points,
    /// returning the increment to fold into the running transform.
    fn solve_increment(
        source: &PointCloud2D,
        target: &PointCloud2D,
        pairs: &[(usize, usize)],
        transform: &Pose2D,
    ) -> Pose2D {
        let n = pairs.len() as f32;

        let mut src_cx = 0.0f32;
        let mut src_cy = 0.0f32;
        let mut tgt_cx = 0.0f32;
        let mut tgt_cy = 0.0f32;
        for &(si, ti) in pairs {
            let sp = transform.transform_point(&source.points[si]);
            src_cx += sp.x;
            src_cy += sp.y;
            tgt_cx += target.points[ti].x;
            tgt_cy += target.points[ti].y;
        }
        src_cx /= n;
        src_cy /= n;
        tgt_cx /= n;
        tgt_cy /= n;

        // Cross-covariance of the centered pairs.
        let mut sxx = 0.0f32;
        let mut sxy = 0.0f32;
        let mut syx = 0.0f32;
        let mut syy = 0.0f32;
        for &(si, ti) in pairs {
            let sp = transform.transform_point(&source.points[si]);
            let sx = sp.x - src_cx;
            let sy = sp.y - src_cy;
            let tx = target.points[ti].x - tgt_cx;
            let ty = target.points[ti].y - tgt_cy;
            sxx += sx * tx;
            sxy += sx * ty;
            syx += sy * tx;
            syy += sy * ty;
        }

        let dtheta = (syx - sxy).atan2(sxx + syy);
        let (sin_dt, cos_dt) = dtheta.sin_cos();
        let dx = tgt_cx - (src_cx * cos_dt - src_cy * sin_dt);
        let dy = tgt_cy - (src_cx * sin_dt + src_cy * cos_dt);
        // Increment in the world frame: rotate about the origin, then shift.
        Pose2D::new(dx, dy, dtheta)
    }

    fn mean_squared_error(
        source: &PointCloud2D,
        target: &PointCloud2D,
        pairs: &[(usize, usize)],
        transform: &Pose2D,
    ) -> f32 {
        if pairs.is_empty() {
            return f32::MAX;
        }
        let mut sum = 0.0f32;
        for &(si, ti) in pairs {
            let sp = transform.transform_point(&source.points[si]);
            sum += sp.distance_squared(&target.points[ti]);
        }
        sum / pairs.len() as f32
    }

    /// Map the final mean squared error onto a 0-1 quality score.
    /// Exponential decay: 1.0 at zero error, ~0.37 at 0.01 m² MSE (10 cm RMSE).
    fn score(mse: f32) -> f32 {
        (-mse * 100.0).exp()
    }
}

impl ScanMatcher for PointToPointIcp {
    fn align(
        &self,
        source: &PointCloud2D,
        target: &PointCloud2D,
        initial_guess: &Pose2D,
    ) -> AlignmentResult {
        if source.is_empty() || target.is_empty() {
            return AlignmentResult::failed();
        }

        let tree = Self::build_tree(target);
        let mut transform = *initial_guess;
        let mut iterations = 0u32;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let pairs = self.correspondences(source, &tree, &transform);
            if pairs.len() < self.config.min_correspondences {
                return AlignmentResult::failed();
            }

            let increment = Self::solve_increment(source, target, &pairs, &transform);
            // The increment acts on already-transformed points, so it
            // pre-composes onto the running transform.
            transform = increment.compose(&transform);

            if increment.translation_norm() < self.config.epsilon
                && increment.theta.abs() < self.config.epsilon
            {
                let mse = Self::mean_squared_error(source, target, &pairs, &transform);
                return AlignmentResult {
                    transform,
                    score: Self::score(mse),
                    converged: true,
                    iterations,
                    mse,
                };
            }
        }

        // Iteration cap reached: report the best estimate without claiming
        // convergence.
        let pairs = self.correspondences(source, &tree, &transform);
        let mse = Self::mean_squared_error(source, target, &pairs, &transform);
        AlignmentResult {
            transform,
            score: Self::score(mse),
            converged: false,
            iterations,
            mse,
        }
    }
}

//! Point-cloud observation type.

use serde::{Deserialize, Serialize};

use super::{Point2D, Pose2D};

/// A 2D point cloud in the robot-local frame.
///
/// The observation payload attached to stream records and stored by the
/// edge deciders for pairwise alignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud2D {
    pub points: Vec<Point2D>,
}

impl PointCloud2D {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create an empty cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Build a cloud from raw points.
    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point2D> {
        self.points.iter()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Return a copy of this cloud with every point mapped through `pose`.
    pub fn transform(&self, pose: &Pose2D) -> PointCloud2D {
        PointCloud2D {
            points: self.points.iter().map(|p| pose.transform_point(p)).collect(),
        }
    }
}

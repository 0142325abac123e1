//! Ground-truth trajectory loading.
//!
//! Text format, one pose per line: `timestamp_us x y theta`, whitespace
//! separated, `#`-prefixed comment lines skipped. Poses are sorted by
//! timestamp on load and queried by interpolation.

use std::path::Path;

use crate::core::types::{Pose2D, Timestamped};
use crate::error::{GraphSlamError, Result};

/// A reference trajectory for observational error reporting.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    poses: Vec<Timestamped<Pose2D>>,
}

impl GroundTruth {
    pub fn new(mut poses: Vec<Timestamped<Pose2D>>) -> Self {
        poses.sort_by_key(|p| p.timestamp_us);
        Self { poses }
    }

    /// Load a trajectory from a text file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|msg| {
            GraphSlamError::StreamFormat(format!("{}: {}", path.display(), msg))
        })
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut poses = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let mut next_field = |name: &str| {
                fields
                    .next()
                    .ok_or_else(|| format!("line {}: missing {}", line_no + 1, name))
            };
            let timestamp_us: u64 = next_field("timestamp")?
                .parse()
                .map_err(|e| format!("line {}: bad timestamp: {}", line_no + 1, e))?;
            let mut coord = |name: &str| -> std::result::Result<f32, String> {
                next_field(name)?
                    .parse()
                    .map_err(|e| format!("line {}: bad {}: {}", line_no + 1, name, e))
            };
            let x = coord("x")?;
            let y = coord("y")?;
            let theta = coord("theta")?;
            poses.push(Timestamped::new(Pose2D::new(x, y, theta), timestamp_us));
        }
        Ok(Self::new(poses))
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Interpolated pose at `timestamp_us`, `None` outside the trajectory.
    pub fn pose_at(&self, timestamp_us: u64) -> Option<Pose2D> {
        if self.poses.is_empty() {
            return None;
        }
        let idx = self
            .poses
            .partition_point(|p| p.timestamp_us <= timestamp_us);
        if idx == 0 {
            return None;
        }
        let before = &self.poses[idx - 1];
        if before.timestamp_us == timestamp_us {
            return Some(before.data);
        }
        let after = self.poses.get(idx)?;
        Pose2D::interpolate(before, after, timestamp_us)
    }
}

//! Core data types shared by every layer.

mod pose;
mod scan;
mod timestamped;

pub use pose::{Point2D, Pose2D};
pub use scan::PointCloud2D;
pub use timestamped::Timestamped;

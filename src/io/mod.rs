//! Record streams and ground-truth trajectories.

mod ground_truth;
mod stream;

pub use ground_truth::GroundTruth;
pub use stream::{MemoryStream, RecordStream, StreamRecord};

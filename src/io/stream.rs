//! Ordered record source.

use serde::{Deserialize, Serialize};

use crate::core::types::{PointCloud2D, Pose2D};
use crate::error::Result;

/// One step of the input stream: a motion increment since the previous
/// record, optionally paired with an observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub timestamp_us: u64,
    /// Odometry increment relative to the previous record's pose.
    pub odometry: Pose2D,
    pub scan: Option<PointCloud2D>,
}

impl StreamRecord {
    pub fn new(timestamp_us: u64, odometry: Pose2D) -> Self {
        Self {
            timestamp_us,
            odometry,
            scan: None,
        }
    }

    pub fn with_scan(timestamp_us: u64, odometry: Pose2D, scan: PointCloud2D) -> Self {
        Self {
            timestamp_us,
            odometry,
            scan: Some(scan),
        }
    }
}

/// A source of time-ordered records.
///
/// Implementations yield records in non-decreasing timestamp order; the
/// engine aborts the run if they do not.
pub trait RecordStream {
    /// The next record, `None` at end of stream. Errors are fatal.
    fn next_record(&mut self) -> Option<Result<StreamRecord>>;
}

/// An in-memory stream, used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct MemoryStream {
    records: std::collections::VecDeque<StreamRecord>,
}

impl MemoryStream {
    pub fn new(records: Vec<StreamRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn push(&mut self, record: StreamRecord) {
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStream for MemoryStream {
    fn next_record(&mut self) -> Option<Result<StreamRecord>> {
        self.records.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_yields_in_order() {
        let mut stream = MemoryStream::new(vec![
            StreamRecord::new(100, Pose2D::new(0.1, 0.0, 0.0)),
            StreamRecord::new(200, Pose2D::new(0.2, 0.0, 0.0)),
        ]);
        assert_eq!(stream.next_record().unwrap().unwrap().timestamp_us, 100);
        assert_eq!(stream.next_record().unwrap().unwrap().timestamp_us, 200);
        assert!(stream.next_record().is_none());
    }
}

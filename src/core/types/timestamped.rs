//! Timestamp wrapper.

use serde::{Deserialize, Serialize};

/// A value stamped with a time in microseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    pub timestamp_us: u64,
}

impl<T> Timestamped<T> {
    #[inline]
    pub fn new(data: T, timestamp_us: u64) -> Self {
        Self { data, timestamp_us }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_data_and_stamp() {
        let ts = Timestamped::new(7u32, 42);
        assert_eq!(ts.data, 7);
        assert_eq!(ts.timestamp_us, 42);
    }
}

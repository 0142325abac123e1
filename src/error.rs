//! Error types for the graph-SLAM engine.

use thiserror::Error;

/// Errors that abort a run.
///
/// Recoverable conditions (a failed alignment, a rejected loop-closure
/// batch, an optimizer that hit its iteration cap) are reported through
/// component results and counters instead of this enum.
#[derive(Error, Debug)]
pub enum GraphSlamError {
    /// Invalid configuration: unknown component name, out-of-range
    /// parameter, or a malformed config file.
    #[error("configuration error: {0}")]
    Config(String),

    /// A stream record that cannot be interpreted, including records
    /// whose timestamps go backwards.
    #[error("stream format error: {0}")]
    StreamFormat(String),

    /// Underlying I/O failure while reading config or data files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphSlamError>;

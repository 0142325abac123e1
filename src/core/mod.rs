//! Foundation layer: math primitives and core data types.

pub mod math;
pub mod types;

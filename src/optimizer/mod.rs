//! Graph optimization.

mod levmarq;

pub use levmarq::LevMarqOptimizer;

use crate::config::GraphSlamConfig;
use crate::deciders::{component_names, ComponentInfo};
use crate::error::{GraphSlamError, Result};
use crate::graph::PoseGraph;

/// Why an optimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Residual improvement fell below the tolerance, or the residual
    /// itself reached the pose noise floor.
    Converged,
    MaxIterations,
    /// Every step was rejected until the damping factor hit its ceiling.
    DampingCeiling,
    /// The normal equations could not be solved.
    SolveFailed,
    /// Nothing to optimize.
    NoEdges,
}

/// Summary of one optimization run.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationResult {
    pub iterations: usize,
    pub initial_chi2: f64,
    pub final_chi2: f64,
    pub converged: bool,
    pub reason: TerminationReason,
}

/// Minimizes the sum of squared Mahalanobis edge residuals over the free
/// (non-fixed) node poses. Fixed nodes anchor the gauge and never move.
pub trait GraphOptimizer {
    fn optimize(&mut self, graph: &mut PoseGraph) -> OptimizationResult;
}

pub const OPTIMIZERS: &[ComponentInfo] = &[ComponentInfo {
    name: "levmarq",
    description: "Levenberg-Marquardt over analytic SE(2) Jacobians with a \
                  dense Cholesky solve",
}];

/// Build an optimizer by registry name.
pub fn make_optimizer(name: &str, config: &GraphSlamConfig) -> Result<Box<dyn GraphOptimizer>> {
    match name {
        "levmarq" => Ok(Box::new(LevMarqOptimizer::new(config.optimizer.clone()))),
        other => Err(GraphSlamError::Config(format!(
            "unknown optimizer '{}' (available: {})",
            other,
            component_names(OPTIMIZERS)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_unknown_optimizer() {
        assert!(make_optimizer("newton", &GraphSlamConfig::default()).is_err());
    }

    #[test]
    fn registry_builds_levmarq() {
        assert!(make_optimizer("levmarq", &GraphSlamConfig::default()).is_ok());
    }
}

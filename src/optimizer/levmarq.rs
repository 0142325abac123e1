//! Levenberg-Marquardt pose-graph optimization.
//!
//! Damped Gauss-Newton over the free node poses. Each iteration linearizes
//! every edge residual with analytic SE(2) Jacobians, accumulates the
//! block-structured normal equations, damps the diagonal, and solves by
//! dense Cholesky. Steps that reduce the total weighted residual are kept
//! and lower the damping; steps that do not are reverted and raise it.
//!
//! Poses are stored in `f32` but all accumulation and solving happens in
//! `f64`, so converged residuals are limited by the pose precision rather
//! than the solver's.

use std::collections::HashMap;

use super::{GraphOptimizer, OptimizationResult, TerminationReason};
use crate::config::OptimizerConfig;
use crate::core::math;
use crate::core::types::Pose2D;
use crate::graph::{PoseEdge, PoseGraph};

const DAMPING_CEILING: f64 = 1e8;
const DAMPING_DECREASE: f64 = 0.5;
const DAMPING_INCREASE: f64 = 10.0;

/// Residuals below this are noise: `f32` poses round each residual component
/// to about 1e-7 of its magnitude, so a graph of unit-scale edges bottoms out
/// around 1e-11 total. Anything under the floor counts as converged.
const CHI2_FLOOR: f64 = 1e-10;

type Mat3 = [[f64; 3]; 3];
type Vec3 = [f64; 3];

/// Levenberg-Marquardt graph optimizer.
pub struct LevMarqOptimizer {
    config: OptimizerConfig,
}

impl LevMarqOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    fn result(
        iterations: usize,
        initial_chi2: f64,
        final_chi2: f64,
        reason: TerminationReason,
    ) -> OptimizationResult {
        OptimizationResult {
            iterations,
            initial_chi2,
            final_chi2,
            converged: matches!(reason, TerminationReason::Converged | TerminationReason::NoEdges),
            reason,
        }
    }
}

/// Residual of one edge: implied relative pose minus measurement, with the
/// heading wrapped.
fn edge_residual(edge: &PoseEdge, from: &Pose2D, to: &Pose2D) -> Vec3 {
    let implied = from.relative_to(to);
    [
        (implied.x - edge.relative_pose.x) as f64,
        (implied.y - edge.relative_pose.y) as f64,
        math::angle_diff(edge.relative_pose.theta, implied.theta) as f64,
    ]
}

fn edge_information(edge: &PoseEdge) -> Mat3 {
    let info = &edge.information;
    [
        [info.xx as f64, info.xy as f64, info.xt as f64],
        [info.xy as f64, info.yy as f64, info.yt as f64],
        [info.xt as f64, info.yt as f64, info.tt as f64],
    ]
}

/// Jacobians of the implied relative pose with respect to the two endpoint
/// poses, evaluated at the current estimates.
fn edge_jacobians(from: &Pose2D, to: &Pose2D) -> (Mat3, Mat3) {
    let (sin_t, cos_t) = (from.theta as f64).sin_cos();
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    let j_from = [
        [-cos_t, -sin_t, -sin_t * dx + cos_t * dy],
        [sin_t, -cos_t, -cos_t * dx - sin_t * dy],
        [0.0, 0.0, -1.0],
    ];
    let j_to = [
        [cos_t, sin_t, 0.0],
        [-sin_t, cos_t, 0.0],
        [0.0, 0.0, 1.0],
    ];
    (j_from, j_to)
}

fn mat3_transpose(m: &Mat3) -> Mat3 {
    let mut t = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            t[j][i] = v;
        }
    }
    t
}

fn mat3_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for (k, b_row) in b.iter().enumerate() {
                out[i][j] += a[i][k] * b_row[j];
            }
        }
    }
    out
}

fn mat3_mul_vec(m: &Mat3, v: &Vec3) -> Vec3 {
    let mut out = [0.0; 3];
    for (i, row) in m.iter().enumerate() {
        for (k, &val) in v.iter().enumerate() {
            out[i] += row[k] * val;
        }
    }
    out
}

/// Total weighted squared residual of the graph.
fn chi_squared(graph: &PoseGraph) -> f64 {
    let mut total = 0.0;
    for edge in graph.edges() {
        let (from, to) = match (graph.node_pose(edge.from), graph.node_pose(edge.to)) {
            (Some(f), Some(t)) => (f, t),
            _ => continue,
        };
        let r = edge_residual(edge, &from, &to);
        let omega = edge_information(edge);
        let wr = mat3_mul_vec(&omega, &r);
        total += r[0] * wr[0] + r[1] * wr[1] + r[2] * wr[2];
    }
    total
}

/// In-place Cholesky solve of `A x = b` for a symmetric positive-definite
/// `A` of size `dim`. Returns `None` if the factorization breaks down.
fn cholesky_solve(a: &mut [f64], b: &mut [f64], dim: usize) -> Option<()> {
    // Factor A = L Lᵀ, L stored in the lower triangle.
    for j in 0..dim {
        let mut diag = a[j * dim + j];
        for k in 0..j {
            diag -= a[j * dim + k] * a[j * dim + k];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        a[j * dim + j] = diag;
        for i in (j + 1)..dim {
            let mut v = a[i * dim + j];
            for k in 0..j {
                v -= a[i * dim + k] * a[j * dim + k];
            }
            a[i * dim + j] = v / diag;
        }
    }
    // Forward substitution: L y = b.
    for i in 0..dim {
        let mut v = b[i];
        for k in 0..i {
            v -= a[i * dim + k] * b[k];
        }
        b[i] = v / a[i * dim + i];
    }
    // Back substitution: Lᵀ x = y.
    for i in (0..dim).rev() {
        let mut v = b[i];
        for k in (i + 1)..dim {
            v -= a[k * dim + i] * b[k];
        }
        b[i] = v / a[i * dim + i];
    }
    Some(())
}

impl GraphOptimizer for LevMarqOptimizer {
    fn optimize(&mut self, graph: &mut PoseGraph) -> OptimizationResult {
        if graph.edge_count() == 0 {
            return Self::result(0, 0.0, 0.0, TerminationReason::NoEdges);
        }

        // Gauge fix: fixed nodes are not variables, so their rows and
        // columns never enter the system.
        let free: Vec<u64> = graph
            .nodes()
            .iter()
            .filter(|n| !n.fixed)
            .map(|n| n.id)
            .collect();
        if free.is_empty() {
            let chi2 = chi_squared(graph);
            return Self::result(0, chi2, chi2, TerminationReason::Converged);
        }
        let column: HashMap<u64, usize> = free
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx * 3))
            .collect();
        let dim = free.len() * 3;

        let initial_chi2 = chi_squared(graph);
        let mut chi2 = initial_chi2;
        if chi2 < CHI2_FLOOR {
            return Self::result(0, initial_chi2, chi2, TerminationReason::Converged);
        }

        let mut lambda = self.config.initial_damping;
        let mut iterations = 0;
        let mut reason = TerminationReason::MaxIterations;

        let mut hessian = vec![0.0f64; dim * dim];
        let mut gradient = vec![0.0f64; dim];

        while iterations < self.config.max_iterations {
            iterations += 1;

            hessian.iter_mut().for_each(|v| *v = 0.0);
            gradient.iter_mut().for_each(|v| *v = 0.0);

            for edge in graph.edges() {
                let (from, to) = match (graph.node_pose(edge.from), graph.node_pose(edge.to)) {
                    (Some(f), Some(t)) => (f, t),
                    _ => continue,
                };
                let r = edge_residual(edge, &from, &to);
                let omega = edge_information(edge);
                let (j_from, j_to) = edge_jacobians(&from, &to);
                let col_from = column.get(&edge.from).copied();
                let col_to = column.get(&edge.to).copied();

                if let Some(cf) = col_from {
                    let jt = mat3_transpose(&j_from);
                    let jt_omega = mat3_mul(&jt, &omega);
                    add_block(&mut hessian, dim, cf, cf, &mat3_mul(&jt_omega, &j_from));
                    add_vec(&mut gradient, cf, &mat3_mul_vec(&jt_omega, &r));
                    if let Some(ct) = col_to {
                        let off = mat3_mul(&jt_omega, &j_to);
                        add_block(&mut hessian, dim, cf, ct, &off);
                        add_block(&mut hessian, dim, ct, cf, &mat3_transpose(&off));
                    }
                }
                if let Some(ct) = col_to {
                    let jt = mat3_transpose(&j_to);
                    let jt_omega = mat3_mul(&jt, &omega);
                    add_block(&mut hessian, dim, ct, ct, &mat3_mul(&jt_omega, &j_to));
                    add_vec(&mut gradient, ct, &mat3_mul_vec(&jt_omega, &r));
                }
            }

            // Damped system: (H + λI) Δ = -g.
            let mut system = hessian.clone();
            for i in 0..dim {
                system[i * dim + i] += lambda;
            }
            let mut step: Vec<f64> = gradient.iter().map(|g| -g).collect();
            if cholesky_solve(&mut system, &mut step, dim).is_none() {
                lambda *= DAMPING_INCREASE;
                if lambda > DAMPING_CEILING {
                    reason = TerminationReason::SolveFailed;
                    break;
                }
                continue;
            }

            // Tentatively apply the step.
            let saved: Vec<(u64, Pose2D)> = free
                .iter()
                .filter_map(|&id| graph.node_pose(id).map(|p| (id, p)))
                .collect();
            for (&id, &col) in &column {
                if let Some(pose) = graph.node_pose(id) {
                    graph.set_node_pose(
                        id,
                        Pose2D::new(
                            pose.x + step[col] as f32,
                            pose.y + step[col + 1] as f32,
                            pose.theta + step[col + 2] as f32,
                        ),
                    );
                }
            }

            let new_chi2 = chi_squared(graph);
            if new_chi2 <= chi2 {
                // Absolute improvement, with the scale clamped so the test
                // stays meaningful when chi2 decays multiplicatively toward
                // zero instead of stalling at a nonzero minimum.
                let improvement = chi2 - new_chi2;
                chi2 = new_chi2;
                lambda = (lambda * DAMPING_DECREASE).max(1e-12);
                if improvement < self.config.convergence_tolerance * chi2.max(1.0)
                    || chi2 < CHI2_FLOOR
                {
                    reason = TerminationReason::Converged;
                    break;
                }
            } else {
                for (id, pose) in saved {
                    graph.set_node_pose(id, pose);
                }
                lambda *= DAMPING_INCREASE;
                if lambda > DAMPING_CEILING {
                    // A rejected step at the pose noise floor is convergence,
                    // not a damping failure.
                    reason = if chi2 < CHI2_FLOOR {
                        TerminationReason::Converged
                    } else {
                        TerminationReason::DampingCeiling
                    };
                    break;
                }
            }
        }

        log::debug!(
            "optimizer: {:?} after {} iterations, chi2 {:.6e} -> {:.6e}",
            reason,
            iterations,
            initial_chi2,
            chi2
        );
        Self::result(iterations, initial_chi2, chi2, reason)
    }
}

fn add_block(matrix: &mut [f64], dim: usize, row: usize, col: usize, block: &Mat3) {
    for (i, block_row) in block.iter().enumerate() {
        for (j, &v) in block_row.iter().enumerate() {
            matrix[(row + i) * dim + (col + j)] += v;
        }
    }
}

fn add_vec(vector: &mut [f64], offset: usize, v: &Vec3) {
    for (i, &val) in v.iter().enumerate() {
        vector[offset + i] += val;
    }
}

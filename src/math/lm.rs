//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ (y_i - f(x_i; p))²` for a small parameter vector `p`.
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! where `J = ∂f/∂p` and `r = y - f`. A step that lowers the SSE is accepted
//! and `λ` shrinks; otherwise `λ` grows and the step is retried. When no
//! damping level improves the SSE we are at a (numerical) minimum and stop.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Relative SSE decrease below which an accepted step counts as converged.
const SSE_REL_TOL: f64 = 1e-12;
/// Relative step size below which an accepted step counts as converged.
const STEP_REL_TOL: f64 = 1e-10;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// A model that can be fitted.
pub trait LeastSquaresProblem {
    fn param_count(&self) -> usize;
    fn observation_count(&self) -> usize;
    /// Write `y_i - f(x_i; params)` into `out`.
    fn residuals(&self, params: &[f64], out: &mut DVector<f64>);
    /// Write `∂f(x_i; params)/∂params_j` into `out[(i, j)]`.
    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmError {
    #[error("did not converge within {0} iterations")]
    IterationLimit(usize),
    #[error("non-finite residuals at the starting point")]
    NonFiniteStart,
    #[error("parameter count mismatch: expected {expected}, got {actual}")]
    ParamCount { expected: usize, actual: usize },
}

/// Run Levenberg–Marquardt from `initial` with at most `max_iterations` outer iterations.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: &[f64],
    max_iterations: usize,
) -> Result<LmSolution, LmError> {
    let p = problem.param_count();
    let n = problem.observation_count();
    if initial.len() != p {
        return Err(LmError::ParamCount {
            expected: p,
            actual: initial.len(),
        });
    }

    let mut params = initial.to_vec();
    let mut r = DVector::<f64>::zeros(n);
    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut r_trial = DVector::<f64>::zeros(n);

    problem.residuals(&params, &mut r);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return Err(LmError::NonFiniteStart);
    }

    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=max_iterations {
        if sse == 0.0 {
            return Ok(LmSolution { params, sse, iterations: iteration - 1 });
        }

        problem.jacobian(&params, &mut jac);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &r;
        if grad.amax() == 0.0 {
            return Ok(LmSolution { params, sse, iterations: iteration - 1 });
        }

        // Scale damping by the curvature of each parameter, with a floor so a
        // parameter the data does not constrain still gets damped.
        let diag_floor = jtj.diagonal().amax() * 1e-12;

        loop {
            let mut damped = jtj.clone();
            for j in 0..p {
                damped[(j, j)] += lambda * jtj[(j, j)].max(diag_floor);
            }

            let step = damped.cholesky().map(|c| c.solve(&grad));
            let Some(step) = step.filter(|s| s.iter().all(|v| v.is_finite())) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Ok(LmSolution { params, sse, iterations: iteration });
                }
                continue;
            };

            let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(a, d)| a + d).collect();
            problem.residuals(&trial, &mut r_trial);
            let sse_trial = r_trial.norm_squared();

            if sse_trial.is_finite() && sse_trial < sse {
                let rel_drop = (sse - sse_trial) / sse;
                let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
                let small_step = step.norm() <= STEP_REL_TOL * (param_norm + STEP_REL_TOL);

                params = trial;
                std::mem::swap(&mut r, &mut r_trial);
                sse = sse_trial;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if rel_drop < SSE_REL_TOL || small_step {
                    return Ok(LmSolution { params, sse, iterations: iteration });
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Ok(LmSolution { params, sse, iterations: iteration });
            }
        }
    }

    Err(LmError::IterationLimit(max_iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a · exp(b · x)
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn param_count(&self) -> usize {
            2
        }

        fn observation_count(&self) -> usize {
            self.x.len()
        }

        fn residuals(&self, params: &[f64], out: &mut DVector<f64>) {
            for i in 0..self.x.len() {
                out[i] = self.y[i] - params[0] * (params[1] * self.x[i]).exp();
            }
        }

        fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
            for i in 0..self.x.len() {
                let e = (params[1] * self.x[i]).exp();
                out[(i, 0)] = e;
                out[(i, 1)] = params[0] * self.x[i] * e;
            }
        }
    }

    fn decay_problem() -> ExpDecay {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.1).collect();
        let y = x.iter().map(|&v| 2.5 * (-1.3 * v).exp()).collect();
        ExpDecay { x, y }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let problem = decay_problem();
        let sol = levenberg_marquardt(&problem, &[1.0, -0.5], 200).unwrap();
        assert!((sol.params[0] - 2.5).abs() < 1e-6, "{:?}", sol.params);
        assert!((sol.params[1] + 1.3).abs() < 1e-6, "{:?}", sol.params);
        assert!(sol.sse < 1e-12);
    }

    #[test]
    fn exact_start_converges_immediately() {
        let problem = decay_problem();
        let sol = levenberg_marquardt(&problem, &[2.5, -1.3], 5).unwrap();
        assert!(sol.iterations <= 1);
    }

    #[test]
    fn tiny_budget_reports_iteration_limit() {
        let problem = decay_problem();
        let err = levenberg_marquardt(&problem, &[0.1, 1.0], 1).unwrap_err();
        assert_eq!(err, LmError::IterationLimit(1));
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let problem = decay_problem();
        assert!(matches!(
            levenberg_marquardt(&problem, &[1.0], 10),
            Err(LmError::ParamCount { expected: 2, actual: 1 })
        ));
    }
}

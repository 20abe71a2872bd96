use nalgebra::{DMatrix, DVector};
use crate::analysis::AnalysisError;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 10.0;
const LAMBDA_MAX: f64 = 1e20;
/// Solver limits. Tolerances are relative: `ftol` on the sum of squares, `xtol` on
/// each parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevenbergMarquardt {
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
}
impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_evaluations: 10_000,
            ftol: 5e-5,
            xtol: 5e-5,
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct Minimum {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub evaluations: usize,
    pub iterations: usize,
}
/// Counts every call to the residual function against the evaluation cap.
struct Counted<F> {
    residuals: F,
    evaluations: usize,
    limit: usize,
}
impl<F> Counted<F>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    fn eval(&mut self, params: &DVector<f64>) -> Result<DVector<f64>, AnalysisError> {
        if self.evaluations >= self.limit {
            return Err(AnalysisError::FitDidNotConverge {
                evaluations: self.evaluations,
                reason: "evaluation limit reached".into(),
            });
        }
        self.evaluations += 1;
        Ok(DVector::from_vec((self.residuals)(params.as_slice())))
    }
    fn jacobian(
        &mut self,
        params: &DVector<f64>,
        at: &DVector<f64>,
    ) -> Result<DMatrix<f64>, AnalysisError> {
        let mut jac = DMatrix::zeros(at.len(), params.len());
        let mut nudged = params.clone();
        for j in 0..params.len() {
            let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
            nudged[j] = params[j] + h;
            let shifted = self.eval(&nudged)?;
            nudged[j] = params[j];
            jac.set_column(j, &((shifted - at) / h));
        }
        Ok(jac)
    }
}
impl LevenbergMarquardt {
    /// Minimises `sum(residuals(p)^2)` starting from `initial`.
    pub fn minimize<F>(&self, initial: &[f64], residuals: F) -> Result<Minimum, AnalysisError>
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let mut f = Counted {
            residuals,
            evaluations: 0,
            limit: self.max_evaluations,
        };
        let mut params = DVector::from_column_slice(initial);
        let mut r = f.eval(&params)?;
        let mut cost = r.norm_squared();
        if !cost.is_finite() {
            return Err(AnalysisError::FitDidNotConverge {
                evaluations: f.evaluations,
                reason: "model is not finite at the initial guess".into(),
            });
        }
        let mut lambda = LAMBDA_INIT;
        let mut iterations = 0;
        loop {
            iterations += 1;
            if cost == 0.0 {
                break;
            }
            let jac = f.jacobian(&params, &r)?;
            let jt = jac.transpose();
            let gradient = &jt * &r;
            let normal = &jt * &jac;
            let diag = normal.diagonal().map(|d| d.max(f64::MIN_POSITIVE));
            let accepted = loop {
                if lambda > LAMBDA_MAX {
                    break None;
                }
                let mut damped = normal.clone();
                for i in 0..damped.nrows() {
                    damped[(i, i)] += lambda * diag[i];
                }
                let Some(step) = damped.cholesky().map(|c| c.solve(&(-&gradient))) else {
                    lambda *= LAMBDA_UP;
                    continue;
                };
                let trial = &params + &step;
                let trial_r = f.eval(&trial)?;
                let trial_cost = trial_r.norm_squared();
                if trial_cost.is_finite() && trial_cost < cost {
                    let predicted = -(2.0 * step.dot(&gradient) + (&jac * &step).norm_squared());
                    break Some((step, trial, trial_r, trial_cost, predicted));
                }
                lambda *= LAMBDA_UP;
            };
            let Some((step, trial, trial_r, trial_cost, predicted)) = accepted else {
                log::debug!("LM stalled after {} evaluations, cost {cost}", f.evaluations);
                break;
            };
            let actual = cost - trial_cost;
            let cost_converged = actual <= self.ftol * cost && predicted.abs() <= self.ftol * cost;
            let step_converged = step
                .iter()
                .zip(params.iter())
                .all(|(s, p)| s.abs() <= self.xtol * (p.abs() + self.xtol));
            params = trial;
            r = trial_r;
            cost = trial_cost;
            lambda = (lambda / LAMBDA_DOWN).max(f64::EPSILON);
            if cost_converged || step_converged {
                break;
            }
        }
        log::debug!(
            "LM finished: {} iterations, {} evaluations, cost {cost}",
            iterations,
            f.evaluations
        );
        Ok(Minimum {
            params: params.iter().copied().collect(),
            cost,
            evaluations: f.evaluations,
            iterations,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    #[test]
    fn fits_exponential_decay() {
        let ts: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = ts.iter().map(|t| 3.0 * (-0.5 * t).exp()).collect();
        let solver = LevenbergMarquardt {
            ftol: 1e-12,
            xtol: 1e-12,
            ..Default::default()
        };
        let min = solver
            .minimize(&[1.0, 1.0], |p| {
                ts.iter()
                    .zip(&ys)
                    .map(|(t, y)| p[0] * (-p[1] * t).exp() - y)
                    .collect()
            })
            .unwrap();
        assert_relative_eq!(min.params[0], 3.0, max_relative = 1e-6);
        assert_relative_eq!(min.params[1], 0.5, max_relative = 1e-6);
        assert!(min.cost < 1e-12);
    }
    #[test]
    fn walks_the_rosenbrock_valley() {
        let solver = LevenbergMarquardt {
            ftol: 1e-14,
            xtol: 1e-14,
            ..Default::default()
        };
        let min = solver
            .minimize(&[-1.2, 1.0], |p| {
                vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]]
            })
            .unwrap();
        assert_relative_eq!(min.params[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(min.params[1], 1.0, epsilon = 1e-6);
    }
    #[test]
    fn evaluation_cap_is_reported() {
        let solver = LevenbergMarquardt {
            max_evaluations: 4,
            ftol: 1e-15,
            xtol: 1e-15,
        };
        let err = solver
            .minimize(&[-1.2, 1.0], |p| {
                vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]]
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::FitDidNotConverge { evaluations: 4, .. }
        ));
    }
    #[test]
    fn non_finite_start_fails() {
        let err = LevenbergMarquardt::default()
            .minimize(&[0.0], |p| vec![1.0 / p[0]])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FitDidNotConverge { .. }));
    }
}

use crate::analysis::lm::LevenbergMarquardt;
use crate::analysis::stats::max;
use crate::analysis::sweep::Sweep;
use crate::analysis::AnalysisError;
pub const DEFAULT_F0_GUESS: f64 = 32_000.0;
pub const DEFAULT_Q_GUESS: f64 = 30.0;
pub const DEFAULT_AMPLITUDE_GUESS: f64 = 10_000.0;
pub const DEFAULT_K_SCALE: f64 = 0.1;
fn denominator(f: f64, f0: f64, q: f64) -> f64 {
    let detuning = f * f - f0 * f0;
    detuning * detuning + f * f * f0 * f0 / (q * q)
}
/// In-phase (X) response.
pub fn chan_x(f: f64, f0: f64, q: f64, a: f64) -> f64 {
    (a * f * f0 / q) / denominator(f, f0, q)
}
/// Quadrature (Y) response.
pub fn chan_y(f: f64, f0: f64, q: f64, a: f64) -> f64 {
    -a * (f * f - f0 * f0) / denominator(f, f0, q)
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResonanceFitResult {
    pub f0: f64,
    pub q: f64,
    pub amplitude: f64,
    /// Display-only figure of merit, see [`compute_k`].
    pub k: Option<f64>,
}
/// Initial guesses for [`fit_resonance_with`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResonanceGuess {
    pub f0: f64,
    pub q: f64,
    pub amplitude: f64,
}
impl Default for ResonanceGuess {
    fn default() -> Self {
        Self {
            f0: DEFAULT_F0_GUESS,
            q: DEFAULT_Q_GUESS,
            amplitude: DEFAULT_AMPLITUDE_GUESS,
        }
    }
}
pub fn fit_resonance(
    sweep: &mut Sweep,
    f0_guess: f64,
    q_guess: f64,
    a_guess: f64,
) -> Result<ResonanceFitResult, AnalysisError> {
    let guess = ResonanceGuess {
        f0: f0_guess,
        q: q_guess,
        amplitude: a_guess,
    };
    fit_resonance_with(sweep, guess, &LevenbergMarquardt::default(), DEFAULT_K_SCALE)
}
/// Fits [`chan_x`] to residual X. On success both fitted residual channels are
/// stored on the sweep; on failure the sweep is untouched.
pub fn fit_resonance_with(
    sweep: &mut Sweep,
    guess: ResonanceGuess,
    solver: &LevenbergMarquardt,
    k_scale: f64,
) -> Result<ResonanceFitResult, AnalysisError> {
    let dx = sweep.residual_x().ok_or(AnalysisError::PrecursorMissing(
        "short sweep or fit of wide sweep is not performed",
    ))?;
    let freq = sweep.frequency();
    if dx.len() < 3 {
        return Err(AnalysisError::InsufficientData {
            channel: "X",
            needed: 3,
            got: dx.len(),
        });
    }
    let minimum = solver.minimize(&[guess.f0, guess.q, guess.amplitude], |p| {
        freq.iter()
            .zip(dx)
            .map(|(&f, &r)| chan_x(f, p[0], p[1], p[2]) - r)
            .collect()
    })?;
    let [f0, q, amplitude] = [minimum.params[0], minimum.params[1], minimum.params[2]];
    if !(f0.is_finite() && q.is_finite() && amplitude.is_finite()) {
        return Err(AnalysisError::FitDidNotConverge {
            evaluations: minimum.evaluations,
            reason: "solver returned non-finite parameters".into(),
        });
    }
    if f0 <= 0.0 || q <= 0.0 {
        return Err(AnalysisError::FitDidNotConverge {
            evaluations: minimum.evaluations,
            reason: format!("no physical resonance (f0={f0:.3}, Q={q:.3})"),
        });
    }
    let fitted_x: Vec<f64> = freq.iter().map(|&f| chan_x(f, f0, q, amplitude)).collect();
    let fitted_y: Vec<f64> = freq.iter().map(|&f| chan_y(f, f0, q, amplitude)).collect();
    let k = compute_k_scaled(Some(q), Some(fitted_x.as_slice()), Some(fitted_y.as_slice()), k_scale);
    log::info!(
        "resonance fit: f0={f0:.3} Hz, Q={q:.3}, A={amplitude:.3} ({} evaluations)",
        minimum.evaluations
    );
    sweep.set_fitted_residual(fitted_x, fitted_y);
    Ok(ResonanceFitResult {
        f0,
        q,
        amplitude,
        k,
    })
}
/// `q * 0.1 / r_max` where `r_max` combines the fitted channel maxima.
/// `None` when an input is missing or `r_max` is zero.
pub fn compute_k(
    q: Option<f64>,
    fitted_x: Option<&[f64]>,
    fitted_y: Option<&[f64]>,
) -> Option<f64> {
    compute_k_scaled(q, fitted_x, fitted_y, DEFAULT_K_SCALE)
}
pub fn compute_k_scaled(
    q: Option<f64>,
    fitted_x: Option<&[f64]>,
    fitted_y: Option<&[f64]>,
    scale: f64,
) -> Option<f64> {
    let x_max = max(fitted_x?)?;
    let y_max = max(fitted_y?)?;
    let r_max = x_max.hypot(y_max);
    if r_max == 0.0 {
        return None;
    }
    Some(q? * scale / r_max)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sweep::SeriesKind;
    use crate::analysis::sweep::{Channel, SweepGroup};
    use crate::analysis::test_support::{lorentzian_short_sweep, sweep_from, zero_background};
    use approx::assert_relative_eq;
    #[test]
    fn model_peaks_at_resonance() {
        let (f0, q, a) = (32_150.0, 45.0, 8000.0);
        assert_relative_eq!(chan_x(f0, f0, q, a), a * q / (f0 * f0), max_relative = 1e-12);
        assert_eq!(chan_y(f0, f0, q, a), 0.0);
        assert!(chan_y(f0 - 100.0, f0, q, a) > 0.0);
        assert!(chan_y(f0 + 100.0, f0, q, a) < 0.0);
        assert!(chan_x(f0, f0, q, a) > chan_x(f0 + 300.0, f0, q, a));
    }
    #[test]
    fn recovers_injected_lorentzian() {
        let mut sweep = lorentzian_short_sweep(32_150.0, 45.0, 8000.0, 1e-6, 11);
        let result = fit_resonance(
            &mut sweep,
            DEFAULT_F0_GUESS,
            DEFAULT_Q_GUESS,
            DEFAULT_AMPLITUDE_GUESS,
        )
        .unwrap();
        assert_relative_eq!(result.f0, 32_150.0, max_relative = 0.01);
        assert_relative_eq!(result.q, 45.0, max_relative = 0.01);
        assert_relative_eq!(result.amplitude, 8000.0, max_relative = 0.05);
        let fitted = sweep.series(Channel::Y, SeriesKind::Fitted).unwrap();
        assert_eq!(fitted.len(), sweep.len());
        assert!(result.k.is_some());
    }
    #[test]
    fn fit_without_residual_is_a_precursor_error() {
        let mut sweep = sweep_from(SweepGroup::Short, vec![1.0, 2.0], vec![0.0; 2], vec![0.0; 2]);
        let err = fit_resonance(&mut sweep, 1.0, 30.0, 1.0).unwrap_err();
        assert!(matches!(err, AnalysisError::PrecursorMissing(_)));
    }
    #[test]
    fn failed_fit_leaves_sweep_untouched() {
        let freq: Vec<f64> = (0..50).map(|i| 32_000.0 + i as f64).collect();
        let x: Vec<f64> = (0..50).map(|i| (i as f64).sin()).collect();
        let mut sweep = sweep_from(SweepGroup::Short, freq, x, vec![0.0; 50]);
        sweep.recompute_residual(&zero_background()).unwrap();
        let solver = LevenbergMarquardt {
            max_evaluations: 3,
            ..Default::default()
        };
        let err = fit_resonance_with(&mut sweep, ResonanceGuess::default(), &solver, 0.1)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FitDidNotConverge { .. }));
        assert!(sweep.fitted_residual_x().is_none());
        assert!(sweep.fitted_residual_y().is_none());
    }
    #[test]
    fn negative_quality_factor_is_rejected() {
        let (f0, q, a) = (32_100.0, -45.0, 8000.0);
        let freq: Vec<f64> = (0..200).map(|i| 32_000.0 + i as f64).collect();
        let x = freq.iter().map(|&f| chan_x(f, f0, q, a)).collect();
        let mut sweep = sweep_from(SweepGroup::Short, freq, x, vec![0.0; 200]);
        sweep.recompute_residual(&zero_background()).unwrap();
        let guess = ResonanceGuess { f0, q, amplitude: a };
        let err = fit_resonance_with(&mut sweep, guess, &LevenbergMarquardt::default(), 0.1)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FitDidNotConverge { .. }));
        assert!(sweep.fitted_residual_x().is_none());
    }
    #[test]
    fn k_needs_every_input_and_a_nonzero_radius() {
        let x: &[f64] = &[3.0, 1.0];
        let y: &[f64] = &[-2.0, 4.0];
        assert_relative_eq!(compute_k(Some(50.0), Some(x), Some(y)).unwrap(), 1.0);
        assert_eq!(compute_k(None, Some(x), Some(y)), None);
        assert_eq!(compute_k(Some(50.0), None, Some(y)), None);
        assert_eq!(compute_k(Some(50.0), Some(x), None), None);
        let zero: &[f64] = &[0.0];
        assert_eq!(compute_k(Some(50.0), Some(zero), Some(zero)), None);
    }
}

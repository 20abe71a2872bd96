use std::fmt;
use crate::analysis::polynomial::polyfit;
use crate::analysis::sweep::{Channel, Sweep};
use crate::analysis::AnalysisError;
pub const DEFAULT_X_DEGREE: usize = 3;
pub const DEFAULT_Y_DEGREE: usize = 4;
/// What happened to the coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackgroundChange {
    Fitted,
    XSlope(f64),
    XIntercept(f64),
    YIntercept(f64),
}
/// Handle returned by [`BackgroundFit::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);
type Observer = Box<dyn FnMut(&BackgroundFit, BackgroundChange)>;
/// Wide-sweep background polynomials, highest degree first, so the last entry is the
/// constant term. Every successful change is announced to the observers.
pub struct BackgroundFit {
    x_coeffs: Option<Vec<f64>>,
    y_coeffs: Option<Vec<f64>>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}
impl Default for BackgroundFit {
    fn default() -> Self {
        Self::new()
    }
}
impl fmt::Debug for BackgroundFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundFit")
            .field("x_coeffs", &self.x_coeffs)
            .field("y_coeffs", &self.y_coeffs)
            .field("observers", &self.observers.len())
            .finish()
    }
}
impl BackgroundFit {
    pub fn new() -> Self {
        Self {
            x_coeffs: None,
            y_coeffs: None,
            observers: Vec::new(),
            next_observer: 0,
        }
    }
    pub fn x_coeffs(&self) -> Option<&[f64]> {
        self.x_coeffs.as_deref()
    }
    pub fn y_coeffs(&self) -> Option<&[f64]> {
        self.y_coeffs.as_deref()
    }
    pub fn is_fitted(&self) -> bool {
        self.x_coeffs.is_some() && self.y_coeffs.is_some()
    }
    /// Registers a callback invoked after every successful coefficient change.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&BackgroundFit, BackgroundChange) + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }
    /// Fits X with a cubic and Y with a quartic over the sweep's included samples.
    pub fn fit(&mut self, sweep: &Sweep) -> Result<(), AnalysisError> {
        self.fit_with_degrees(sweep, DEFAULT_X_DEGREE, DEFAULT_Y_DEGREE)
    }
    pub fn fit_with_degrees(
        &mut self,
        sweep: &Sweep,
        x_degree: usize,
        y_degree: usize,
    ) -> Result<(), AnalysisError> {
        let included = sweep.included_count();
        for (channel, degree) in [("X", x_degree), ("Y", y_degree)] {
            if included < degree + 1 {
                return Err(AnalysisError::InsufficientData {
                    channel,
                    needed: degree + 1,
                    got: included,
                });
            }
        }
        Self::check_shape(self.x_coeffs.as_deref(), x_degree, "X")?;
        Self::check_shape(self.y_coeffs.as_deref(), y_degree, "Y")?;
        let (frequency, x) = sweep.masked(Channel::X);
        let (_, y) = sweep.masked(Channel::Y);
        let x_coeffs = polyfit(&frequency, &x, x_degree)?;
        let y_coeffs = polyfit(&frequency, &y, y_degree)?;
        self.x_coeffs = Some(x_coeffs);
        self.y_coeffs = Some(y_coeffs);
        log::info!(
            "Fit of {} sweep was done over {} of {} samples",
            sweep.group().label(),
            included,
            sweep.len()
        );
        self.notify(BackgroundChange::Fitted);
        Ok(())
    }
    /// Coefficient vectors keep their length once created.
    fn check_shape(
        existing: Option<&[f64]>,
        degree: usize,
        channel: &str,
    ) -> Result<(), AnalysisError> {
        match existing {
            Some(coeffs) if coeffs.len() != degree + 1 => Err(AnalysisError::DegenerateInput(
                format!(
                    "{channel} background already has degree {}, refusing degree {degree}",
                    coeffs.len() - 1
                ),
            )),
            _ => Ok(()),
        }
    }
    pub fn add_to_x_slope(&mut self, delta: f64) -> Result<(), AnalysisError> {
        let coeffs = self.x_coeffs.as_mut().ok_or(AnalysisError::PrecursorMissing(
            "X slope can not be changed before the background fit",
        ))?;
        let idx = coeffs.len().checked_sub(2).ok_or_else(|| {
            AnalysisError::DegenerateInput("X background has no linear term".into())
        })?;
        coeffs[idx] += delta;
        log::info!("New slope is set (delta {delta:e})");
        self.notify(BackgroundChange::XSlope(delta));
        Ok(())
    }
    pub fn add_to_x_intercept(&mut self, delta: f64) -> Result<(), AnalysisError> {
        let coeffs = self.x_coeffs.as_mut().ok_or(AnalysisError::PrecursorMissing(
            "X intercept can not be changed before the background fit",
        ))?;
        if let Some(last) = coeffs.last_mut() {
            *last += delta;
        }
        log::info!("X intercept shifted by {delta:e}");
        self.notify(BackgroundChange::XIntercept(delta));
        Ok(())
    }
    pub fn add_to_y_intercept(&mut self, delta: f64) -> Result<(), AnalysisError> {
        let coeffs = self.y_coeffs.as_mut().ok_or(AnalysisError::PrecursorMissing(
            "Y intercept can not be changed before the background fit",
        ))?;
        if let Some(last) = coeffs.last_mut() {
            *last += delta;
        }
        log::info!("Y intercept shifted by {delta:e}");
        self.notify(BackgroundChange::YIntercept(delta));
        Ok(())
    }
    fn notify(&mut self, change: BackgroundChange) {
        let mut observers = std::mem::take(&mut self.observers);
        for (_, observer) in observers.iter_mut() {
            observer(self, change);
        }
        // Callbacks only see `&self`, so none can have registered meanwhile.
        self.observers = observers;
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::polynomial::polyval;
    use crate::analysis::sweep::SweepGroup;
    use crate::analysis::test_support::{noisy_wide_sweep, sweep_from};
    use std::cell::RefCell;
    use std::rc::Rc;
    fn poly_sweep(x_poly: &[f64], y_poly: &[f64]) -> Sweep {
        let freq: Vec<f64> = (0..400).map(|i| 20_000.0 + 50.0 * i as f64).collect();
        let x = freq.iter().map(|&f| polyval(x_poly, f)).collect();
        let y = freq.iter().map(|&f| polyval(y_poly, f)).collect();
        sweep_from(SweepGroup::Wide, freq, x, y)
    }
    fn fitted() -> BackgroundFit {
        let sweep = poly_sweep(&[1e-12, -2e-8, 3e-3, 4.0], &[1e-17, 0.0, -1e-8, 2e-4, -1.0]);
        let mut background = BackgroundFit::new();
        background.fit(&sweep).unwrap();
        background
    }
    #[test]
    fn noiseless_fit_then_subtract_is_zero() {
        let x_poly = [2e-12, -1e-7, 1.5e-3, 7.0];
        let y_poly = [-3e-18, 2e-13, 4e-9, -2e-4, 11.0];
        let mut sweep = poly_sweep(&x_poly, &y_poly);
        sweep.apply_window(150, 250);
        let mut background = BackgroundFit::new();
        background.fit(&sweep).unwrap();
        assert_eq!(background.x_coeffs().unwrap().len(), 4);
        assert_eq!(background.y_coeffs().unwrap().len(), 5);
        sweep.recompute_residual(&background).unwrap();
        let scale_x = sweep.x().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let scale_y = sweep.y().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        for r in sweep.residual_x().unwrap() {
            assert!(r.abs() <= 1e-7 * scale_x, "x residual {r}");
        }
        for r in sweep.residual_y().unwrap() {
            assert!(r.abs() <= 1e-7 * scale_y, "y residual {r}");
        }
    }
    #[test]
    fn recovers_planted_polynomials_under_noise() {
        // X = 2f + 5, Y = f^2 - 3, f in [1000, 2000], samples [400, 600) excluded.
        let mut sweep = noisy_wide_sweep(1000, 0.5, 7);
        sweep.apply_window(400, 600);
        let mut background = BackgroundFit::new();
        background.fit(&sweep).unwrap();
        sweep.recompute_residual(&background).unwrap();
        let std_x = crate::analysis::stats::std_dev(sweep.residual_x().unwrap()).unwrap();
        let std_y = crate::analysis::stats::std_dev(sweep.residual_y().unwrap()).unwrap();
        assert!(std_x > 0.2 && std_x < 1.0, "std x {std_x}");
        assert!(std_y > 0.2 && std_y < 1.0, "std y {std_y}");
    }
    #[test]
    fn too_few_included_samples_is_insufficient_data() {
        let mut sweep = poly_sweep(&[0.0, 0.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 1.0, 0.0]);
        sweep.apply_window(0, 396);
        let mut background = BackgroundFit::new();
        let err = background.fit(&sweep).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { channel: "Y", needed: 5, got: 4 }
        ));
        assert!(!background.is_fitted());
    }
    #[test]
    fn failed_refit_keeps_previous_coefficients() {
        let mut background = fitted();
        let before_x = background.x_coeffs().unwrap().to_vec();
        let mut tiny = poly_sweep(&[0.0, 0.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 1.0, 0.0]);
        tiny.apply_window(2, 400);
        assert!(background.fit(&tiny).is_err());
        assert_eq!(background.x_coeffs().unwrap(), &before_x[..]);
    }
    #[test]
    fn slope_change_touches_only_linear_x_term() {
        let mut background = fitted();
        let x_before = background.x_coeffs().unwrap().to_vec();
        let y_before = background.y_coeffs().unwrap().to_vec();
        background.add_to_x_slope(0.125).unwrap();
        let x_after = background.x_coeffs().unwrap();
        for i in [0, 1, 3] {
            assert_eq!(x_after[i].to_bits(), x_before[i].to_bits());
        }
        assert_eq!(x_after[2], x_before[2] + 0.125);
        let y_after = background.y_coeffs().unwrap();
        assert!(y_after
            .iter()
            .zip(&y_before)
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }
    #[test]
    fn intercepts_shift_constant_terms() {
        let mut background = fitted();
        let x_before = background.x_coeffs().unwrap().to_vec();
        let y_before = background.y_coeffs().unwrap().to_vec();
        background.add_to_x_intercept(-1.5).unwrap();
        background.add_to_y_intercept(2.0).unwrap();
        assert_eq!(background.x_coeffs().unwrap()[3], x_before[3] - 1.5);
        assert_eq!(background.x_coeffs().unwrap()[..3], x_before[..3]);
        assert_eq!(background.y_coeffs().unwrap()[4], y_before[4] + 2.0);
        assert_eq!(background.y_coeffs().unwrap()[..4], y_before[..4]);
    }
    #[test]
    fn corrections_before_fit_are_precursor_errors() {
        let mut background = BackgroundFit::new();
        assert!(matches!(
            background.add_to_x_slope(1.0),
            Err(AnalysisError::PrecursorMissing(_))
        ));
        assert!(matches!(
            background.add_to_x_intercept(1.0),
            Err(AnalysisError::PrecursorMissing(_))
        ));
        assert!(matches!(
            background.add_to_y_intercept(1.0),
            Err(AnalysisError::PrecursorMissing(_))
        ));
    }
    #[test]
    fn observers_see_every_successful_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut background = BackgroundFit::new();
        let id = background.subscribe(move |fit, change| {
            sink.borrow_mut().push((change, fit.x_coeffs().map(|c| c.to_vec())));
        });
        assert!(background.add_to_x_slope(1.0).is_err());
        assert!(seen.borrow().is_empty());
        let sweep = poly_sweep(&[0.0, 0.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 1.0, 0.0]);
        background.fit(&sweep).unwrap();
        background.add_to_x_slope(0.5).unwrap();
        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].0, BackgroundChange::Fitted);
            assert_eq!(seen[1].0, BackgroundChange::XSlope(0.5));
            let coeffs = seen[1].1.as_ref().unwrap();
            assert_eq!(coeffs[2], background.x_coeffs().unwrap()[2]);
        }
        assert!(background.unsubscribe(id));
        background.add_to_y_intercept(1.0).unwrap();
        assert_eq!(seen.borrow().len(), 2);
        assert!(!background.unsubscribe(id));
    }
}

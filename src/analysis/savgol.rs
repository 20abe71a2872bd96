use nalgebra::{DMatrix, DVector};
use crate::analysis::AnalysisError;
/// Filter parameters; `window` must be odd and larger than `poly_order`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavitzkyGolay {
    pub window: usize,
    pub poly_order: usize,
    pub deriv: usize,
}
impl SavitzkyGolay {
    pub fn new(window: usize, poly_order: usize, deriv: usize) -> Result<Self, AnalysisError> {
        if window % 2 == 0 {
            return Err(AnalysisError::DegenerateInput(format!(
                "Savitzky-Golay window must be odd, got {window}"
            )));
        }
        if poly_order >= window {
            return Err(AnalysisError::DegenerateInput(format!(
                "polynomial order {poly_order} must be less than window {window}"
            )));
        }
        Ok(Self {
            window,
            poly_order,
            deriv,
        })
    }
    /// Convolution weights for the centre sample (unit spacing).
    pub fn coefficients(&self) -> Result<Vec<f64>, AnalysisError> {
        if self.deriv > self.poly_order {
            return Ok(vec![0.0; self.window]);
        }
        let half = (self.window / 2) as f64;
        let offsets: Vec<f64> = (0..self.window).map(|j| j as f64 - half).collect();
        let pinv = pseudo_inverse(&vandermonde(&offsets, self.poly_order))?;
        let scale = factorial(self.deriv);
        Ok(pinv.row(self.deriv).iter().map(|w| w * scale).collect())
    }
    pub fn apply(&self, data: &[f64]) -> Result<Vec<f64>, AnalysisError> {
        let n = data.len();
        if n < self.window {
            return Err(AnalysisError::DegenerateInput(format!(
                "Savitzky-Golay window {} exceeds {} samples",
                self.window, n
            )));
        }
        let half = self.window / 2;
        let weights = self.coefficients()?;
        let mut out = vec![0.0; n];
        for i in half..n - half {
            out[i] = weights
                .iter()
                .zip(&data[i - half..=i + half])
                .map(|(w, v)| w * v)
                .sum();
        }
        self.fit_edge(&data[..self.window], 0..half, &mut out[..half])?;
        let tail_start = self.window - half;
        self.fit_edge(
            &data[n - self.window..],
            tail_start..self.window,
            &mut out[n - half..],
        )?;
        Ok(out)
    }
    fn fit_edge(
        &self,
        window: &[f64],
        positions: std::ops::Range<usize>,
        out: &mut [f64],
    ) -> Result<(), AnalysisError> {
        let ts: Vec<f64> = (0..window.len()).map(|t| t as f64).collect();
        let pinv = pseudo_inverse(&vandermonde(&ts, self.poly_order))?;
        let coeffs = pinv * DVector::from_column_slice(window);
        for (slot, t) in out.iter_mut().zip(positions) {
            *slot = derivative_at(coeffs.as_slice(), self.deriv, t as f64);
        }
        Ok(())
    }
}
/// First derivative of `data` with a Savitzky–Golay filter.
pub fn savgol_derivative(
    data: &[f64],
    window: usize,
    poly_order: usize,
) -> Result<Vec<f64>, AnalysisError> {
    SavitzkyGolay::new(window, poly_order, 1)?.apply(data)
}
fn vandermonde(ts: &[f64], order: usize) -> DMatrix<f64> {
    DMatrix::from_fn(ts.len(), order + 1, |row, col| ts[row].powi(col as i32))
}
fn pseudo_inverse(a: &DMatrix<f64>) -> Result<DMatrix<f64>, AnalysisError> {
    a.clone()
        .pseudo_inverse(1e-12)
        .map_err(|e| AnalysisError::DegenerateInput(e.to_string()))
}
/// `deriv`-th derivative at `t` of the ascending polynomial `coeffs`.
fn derivative_at(coeffs: &[f64], deriv: usize, t: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .skip(deriv)
        .map(|(k, &c)| {
            let falling: f64 = ((k - deriv + 1)..=k).map(|m| m as f64).product();
            c * falling * t.powi((k - deriv) as i32)
        })
        .sum()
}
fn factorial(n: usize) -> f64 {
    (1..=n).map(|m| m as f64).product()
}
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    #[test]
    fn linear_derivative_weights_match_closed_form() {
        // order 1, window 5: w_j = j / sum(j^2) = j / 10
        let weights = SavitzkyGolay::new(5, 1, 1).unwrap().coefficients().unwrap();
        let expected = [-0.2, -0.1, 0.0, 0.1, 0.2];
        for (w, e) in weights.iter().zip(expected) {
            assert_relative_eq!(*w, e, epsilon = 1e-12);
        }
    }
    #[test]
    fn derivative_of_a_line_is_its_slope_everywhere() {
        let data: Vec<f64> = (0..40).map(|i| 3.0 * i as f64 - 7.0).collect();
        let d = savgol_derivative(&data, 21, 1).unwrap();
        assert_eq!(d.len(), data.len());
        for v in d {
            assert_relative_eq!(v, 3.0, epsilon = 1e-9);
        }
    }
    #[test]
    fn quadratic_filter_differentiates_parabola_including_edges() {
        let data: Vec<f64> = (0..30).map(|i| (i as f64).powi(2)).collect();
        let d = SavitzkyGolay::new(7, 2, 1).unwrap().apply(&data).unwrap();
        for (i, v) in d.iter().enumerate() {
            assert_relative_eq!(*v, 2.0 * i as f64, epsilon = 1e-8);
        }
    }
    #[test]
    fn step_produces_peak_derivative_at_the_jump() {
        let data: Vec<f64> = (0..100).map(|i| if i < 60 { 0.0 } else { 5.0 }).collect();
        let d = savgol_derivative(&data, 21, 1).unwrap();
        let peak = crate::analysis::stats::argmax(&d).unwrap();
        assert!((59..=60).contains(&peak), "peak at {peak}");
    }
    #[test]
    fn rejects_bad_parameters_and_short_input() {
        assert!(SavitzkyGolay::new(4, 1, 1).is_err());
        assert!(SavitzkyGolay::new(5, 5, 1).is_err());
        assert!(savgol_derivative(&[1.0; 10], 21, 1).is_err());
    }
}

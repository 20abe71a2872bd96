use nalgebra::{DMatrix, DVector};
use crate::analysis::AnalysisError;
/// Horner evaluation of a highest-degree-first coefficient slice.
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}
pub fn polyval_all(coeffs: &[f64], xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| polyval(coeffs, x)).collect()
}
/// Fits a polynomial of `degree` through `(xs, ys)` minimising the sum of squared
/// residuals. Returns `degree + 1` coefficients, highest degree first.
///
/// The abscissa is mapped to `[-1, 1]` before building the Vandermonde matrix, the
/// system is solved by SVD, and the result is expanded back into the raw basis.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, AnalysisError> {
    let terms = degree + 1;
    if xs.len() != ys.len() {
        return Err(AnalysisError::DegenerateInput(format!(
            "abscissa has {} samples, ordinate has {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < terms {
        return Err(AnalysisError::InsufficientData {
            channel: "polynomial",
            needed: terms,
            got: xs.len(),
        });
    }
    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Err(AnalysisError::DegenerateInput(
            "abscissa contains non-finite values".into(),
        ));
    }
    let center = 0.5 * (lo + hi);
    let half_span = 0.5 * (hi - lo);
    if half_span == 0.0 && degree > 0 {
        return Err(AnalysisError::DegenerateInput(
            "all abscissa values coincide".into(),
        ));
    }
    let scale = if half_span == 0.0 { 1.0 } else { half_span };
    let vandermonde = DMatrix::from_fn(xs.len(), terms, |row, col| {
        ((xs[row] - center) / scale).powi(col as i32)
    });
    let rhs = DVector::from_column_slice(ys);
    let svd = vandermonde.svd(true, true);
    let largest = svd.singular_values.max();
    let eps = largest * xs.len() as f64 * f64::EPSILON;
    let scaled = svd
        .solve(&rhs, eps)
        .map_err(|e| AnalysisError::DegenerateInput(e.to_string()))?;
    let ascending = expand_to_raw_basis(scaled.as_slice(), center, scale);
    if ascending.iter().any(|c| !c.is_finite()) {
        return Err(AnalysisError::DegenerateInput(
            "polynomial fit produced non-finite coefficients".into(),
        ));
    }
    Ok(ascending.into_iter().rev().collect())
}
/// Rewrites `sum a_k ((x - center) / scale)^k` as `sum c_j x^j` (both ascending).
fn expand_to_raw_basis(scaled: &[f64], center: f64, scale: f64) -> Vec<f64> {
    let terms = scaled.len();
    let mut raw = vec![0.0; terms];
    for (k, &a_k) in scaled.iter().enumerate() {
        let factor = a_k / scale.powi(k as i32);
        let mut binom = 1.0;
        for j in 0..=k {
            // C(k, j) * (-center)^(k - j)
            raw[j] += factor * binom * (-center).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    raw
}

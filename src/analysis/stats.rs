//! Small reductions over sample windows.
//!
//! Standard deviation is the population form (divides by `n`), which is what the
//! residual-leveling heuristics were calibrated with.
use ndarray::ArrayView1;
pub fn mean(data: &[f64]) -> Option<f64> {
    ArrayView1::from(data).mean()
}
/// Population standard deviation. `None` for an empty window.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(ArrayView1::from(data).std(0.0))
}
/// Index of the first maximum. NaN samples never win.
pub fn argmax(data: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in data.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
pub fn max(data: &[f64]) -> Option<f64> {
    argmax(data).map(|idx| data[idx])
}
pub fn min(data: &[f64]) -> Option<f64> {
    data.iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

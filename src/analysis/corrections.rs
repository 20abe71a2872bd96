use std::ops::Range;
use crate::analysis::savgol::savgol_derivative;
use crate::analysis::stats::{argmax, max, mean, min, std_dev};
use crate::analysis::sweep::Sweep;
use crate::analysis::AnalysisError;
pub const DEFAULT_SLOPE_WINDOW: usize = 100;
pub const DEFAULT_TAIL_SAMPLES: usize = 100;
pub const DEFAULT_JUMP_OFFSET: usize = 10;
pub const DEFAULT_JUMP_WINDOW: usize = 21;
pub const DEFAULT_JUMP_POLY_ORDER: usize = 1;
fn residual_x(sweep: &Sweep) -> Result<&[f64], AnalysisError> {
    sweep.residual_x().ok_or(AnalysisError::PrecursorMissing(
        "residual X is not computed; fit the wide sweep and refresh first",
    ))
}
fn residual_y(sweep: &Sweep) -> Result<&[f64], AnalysisError> {
    sweep.residual_y().ok_or(AnalysisError::PrecursorMissing(
        "residual Y is not computed; fit the wide sweep and refresh first",
    ))
}
/// `start..end` as a checked range over `len` samples.
fn window(start: isize, end: isize, len: usize, what: &str) -> Result<Range<usize>, AnalysisError> {
    if start < 0 || end < start || end as usize > len {
        return Err(AnalysisError::DegenerateInput(format!(
            "{what} window {start}..{end} is outside 0..{len}"
        )));
    }
    Ok(start as usize..end as usize)
}
fn window_mean(data: &[f64], range: Range<usize>, what: &str) -> Result<f64, AnalysisError> {
    mean(&data[range])
        .ok_or_else(|| AnalysisError::DegenerateInput(format!("{what} window is empty")))
}
/// Baseline slope of residual X across the resonance, from two windows of `window`
/// samples placed symmetrically on the peak's flanks. Callers apply half of it.
pub fn estimate_slope_fix(sweep: &Sweep, window_len: usize) -> Result<f64, AnalysisError> {
    let dx = residual_x(sweep)?;
    let freq = sweep.frequency();
    let len = dx.len();
    let peak = argmax(dx)
        .ok_or_else(|| AnalysisError::DegenerateInput("residual X has no finite maximum".into()))?;
    let shift = peak.min(len - peak);
    let (peak, shift, w) = (peak as isize, shift as isize, window_len as isize);
    let left = window(peak - shift, peak - shift + w, len, "left flank")?;
    let right = window(peak + shift - w, peak + shift, len, "right flank")?;
    let p1 = window_mean(dx, left.clone(), "left flank")?;
    let p2 = window_mean(dx, right.clone(), "right flank")?;
    let x1 = window_mean(freq, left, "left flank")?;
    let x2 = window_mean(freq, right, "right flank")?;
    if x2 == x1 {
        return Err(AnalysisError::DegenerateInput(
            "flank windows have the same mean frequency".into(),
        ));
    }
    let k = (p2 - p1) / (x2 - x1);
    if !k.is_finite() {
        return Err(AnalysisError::DegenerateInput(format!("slope estimate is {k}")));
    }
    log::debug!("slope fix: p1={p1} p2={p2} x1={x1} x2={x2} k={k}");
    Ok(k)
}
/// Offset that pushes both residual X tails to or below zero by one standard
/// deviation. The trailing window stops one sample short of the end.
pub fn estimate_x_intercept_fix(sweep: &Sweep, n: usize) -> Result<f64, AnalysisError> {
    let dx = residual_x(sweep)?;
    let len = dx.len();
    if n < 2 || len < n {
        return Err(AnalysisError::DegenerateInput(format!(
            "tail length {n} unsuitable for {len} samples"
        )));
    }
    let part1 = &dx[..n];
    let part2 = &dx[len - n..len - 1];
    let too_short = || AnalysisError::DegenerateInput("tail window is empty".into());
    let subtr = mean(part1)
        .zip(mean(part2))
        .map(|(a, b)| a.min(b))
        .ok_or_else(too_short)?;
    let add = std_dev(part1)
        .zip(std_dev(part2))
        .map(|(a, b)| a.max(b))
        .ok_or_else(too_short)?;
    Ok(subtr - add)
}
/// Midpoint between the residual Y extrema.
pub fn estimate_y_intercept_fix(sweep: &Sweep) -> Result<f64, AnalysisError> {
    let dy = residual_y(sweep)?;
    match (max(dy), min(dy)) {
        (Some(hi), Some(lo)) => Ok((hi + lo) / 2.0),
        _ => Err(AnalysisError::DegenerateInput("residual Y is empty".into())),
    }
}
/// Locates the calibration jump in raw Y before its maximum and measures its size.
/// Returns `(split_index, delta)` for [`Sweep::splice_y_tail`].
pub fn detect_y_tail_jump(
    sweep: &Sweep,
    num: usize,
    filter_window: usize,
    poly_order: usize,
) -> Result<(usize, f64), AnalysisError> {
    let y = sweep.y();
    let peak = argmax(y)
        .ok_or_else(|| AnalysisError::DegenerateInput("Y channel has no finite maximum".into()))?;
    let segment = &y[..peak];
    let derivative = savgol_derivative(segment, filter_window, poly_order)?;
    let magnitude: Vec<f64> = derivative.iter().map(|d| d.abs()).collect();
    let prob = argmax(&magnitude)
        .ok_or_else(|| AnalysisError::DegenerateInput("derivative has no maximum".into()))?;
    let (p, num_i, len) = (prob as isize, num as isize, segment.len());
    let before = window(p - 2 * num_i, p - num_i, len, "pre-jump")?;
    let after = window(p + num_i, p + 2 * num_i, len, "post-jump")?;
    let y1 = window_mean(segment, before, "pre-jump")?;
    let y2 = window_mean(segment, after, "post-jump")?;
    let delta = y2 - y1;
    log::debug!("y tail jump at {prob}: y1={y1} y2={y2} delta={delta}");
    Ok((prob, delta))
}

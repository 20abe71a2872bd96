// src/analysis/mod.rs
// 声明分析流程的各个子模块
pub mod background;
pub mod corrections;
pub mod error;
pub mod lm;
pub mod plot;
pub mod polynomial;
pub mod record;
pub mod resonance;
pub mod savgol;
pub mod stats;
pub mod sweep;
// 公开导出常用类型，方便外部调用
pub use background::{BackgroundChange, BackgroundFit, ObserverId};
pub use corrections::{
    detect_y_tail_jump, estimate_slope_fix, estimate_x_intercept_fix, estimate_y_intercept_fix,
};
pub use error::AnalysisError;
pub use lm::LevenbergMarquardt;
pub use plot::{render_sweep_png, PlotStyle};
pub use polynomial::{polyfit, polyval};
pub use record::SweepRecord;
pub use resonance::{chan_x, chan_y, compute_k, fit_resonance, ResonanceFitResult, ResonanceGuess};
pub use savgol::{savgol_derivative, SavitzkyGolay};
pub use sweep::{Channel, SeriesKind, Sweep, SweepGroup};
#[cfg(test)]
pub(crate) mod test_support {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use super::resonance::{chan_x, chan_y};
    use super::{BackgroundFit, Sweep, SweepGroup, SweepRecord};
    pub fn sweep_from(group: SweepGroup, frequency: Vec<f64>, x: Vec<f64>, y: Vec<f64>) -> Sweep {
        let n = frequency.len();
        let record = SweepRecord {
            time: (0..n as i64).collect(),
            frequency,
            x,
            y,
            amplitude: vec![0.0; n],
            id: (0..n as i64).collect(),
        };
        Sweep::from_record(group, record)
    }
    /// Background whose polynomials are identically zero, so residual == raw.
    pub fn zero_background() -> BackgroundFit {
        let freq: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let flat = sweep_from(SweepGroup::Wide, freq, vec![0.0; 16], vec![0.0; 16]);
        let mut background = BackgroundFit::new();
        background.fit(&flat).unwrap();
        background
    }
    fn noise(std: f64, seed: u64) -> impl FnMut() -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, std.max(f64::MIN_POSITIVE)).unwrap();
        move || if std == 0.0 { 0.0 } else { normal.sample(&mut rng) }
    }
    /// Wide sweep over 1000..2000 Hz: X = 2f + 5, Y = f^2 - 3, plus Gaussian noise.
    pub fn noisy_wide_sweep(n: usize, noise_std: f64, seed: u64) -> Sweep {
        let mut draw = noise(noise_std, seed);
        let step = 1000.0 / (n - 1) as f64;
        let freq: Vec<f64> = (0..n).map(|i| 1000.0 + step * i as f64).collect();
        let x = freq.iter().map(|f| 2.0 * f + 5.0 + draw()).collect();
        let y = freq.iter().map(|f| f * f - 3.0 + draw()).collect();
        sweep_from(SweepGroup::Wide, freq, x, y)
    }
    /// Short sweep over 31000..33300 Hz holding a pure resonance, with residuals
    /// computed against a zero background.
    pub fn lorentzian_short_sweep(f0: f64, q: f64, a: f64, noise_std: f64, seed: u64) -> Sweep {
        let mut draw = noise(noise_std, seed);
        let freq: Vec<f64> = (0..1151).map(|i| 31_000.0 + 2.0 * i as f64).collect();
        let x = freq.iter().map(|&f| chan_x(f, f0, q, a) + draw()).collect();
        let y = freq.iter().map(|&f| chan_y(f, f0, q, a) + draw()).collect();
        let mut sweep = sweep_from(SweepGroup::Short, freq, x, y);
        sweep.recompute_residual(&zero_background()).unwrap();
        sweep
    }
}

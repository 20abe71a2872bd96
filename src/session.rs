// src/session.rs
// 会话：持有宽扫、窄扫、背景拟合和共振拟合结果，每个用户操作对应一个方法
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use crate::analysis::background::{BackgroundChange, BackgroundFit, ObserverId};
use crate::analysis::corrections::{
    detect_y_tail_jump, estimate_slope_fix, estimate_x_intercept_fix, estimate_y_intercept_fix,
};
use crate::analysis::plot::{render_sweep_png, PlotStyle};
use crate::analysis::record::SweepRecord;
use crate::analysis::resonance::{fit_resonance_with, ResonanceFitResult};
use crate::analysis::sweep::{SeriesKind, Sweep, SweepGroup};
use crate::analysis::AnalysisError;
use crate::config::AnalysisSettings;
/// Flat snapshot of everything the summary panel shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSummary {
    pub x_coeffs: Option<Vec<f64>>,
    pub y_coeffs: Option<Vec<f64>>,
    pub f0: Option<f64>,
    pub q: Option<f64>,
    pub k: Option<f64>,
}
impl ParameterSummary {
    pub fn new(background: &BackgroundFit, resonance: Option<&ResonanceFitResult>) -> Self {
        Self {
            x_coeffs: background.x_coeffs().map(<[f64]>::to_vec),
            y_coeffs: background.y_coeffs().map(<[f64]>::to_vec),
            f0: resonance.map(|r| r.f0),
            q: resonance.map(|r| r.q),
            k: resonance.and_then(|r| r.k),
        }
    }
}
fn write_coeffs(f: &mut fmt::Formatter<'_>, name: &str, coeffs: Option<&[f64]>) -> fmt::Result {
    match coeffs {
        Some(coeffs) => {
            for (i, c) in coeffs.iter().enumerate() {
                writeln!(f, "{name}{i} = {c:.6e}")?;
            }
            Ok(())
        }
        None => writeln!(f, "{name}: -"),
    }
}
fn write_value(f: &mut fmt::Formatter<'_>, name: &str, value: Option<f64>) -> fmt::Result {
    match value {
        Some(v) => writeln!(f, "{name} = {v:.4}"),
        None => writeln!(f, "{name} = -"),
    }
}
impl fmt::Display for ParameterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_coeffs(f, "X", self.x_coeffs.as_deref())?;
        write_coeffs(f, "Y", self.y_coeffs.as_deref())?;
        write_value(f, "f0", self.f0)?;
        write_value(f, "Q", self.q)?;
        write_value(f, "k", self.k)
    }
}
pub struct Session {
    wide: Sweep,
    short: Sweep,
    background: BackgroundFit,
    resonance: Option<ResonanceFitResult>,
    settings: AnalysisSettings,
}
impl Default for Session {
    fn default() -> Self {
        Self::new(AnalysisSettings::default())
    }
}
impl Session {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            wide: Sweep::new(SweepGroup::Wide),
            short: Sweep::new(SweepGroup::Short),
            background: BackgroundFit::new(),
            resonance: None,
            settings,
        }
    }
    pub fn wide(&self) -> &Sweep {
        &self.wide
    }
    pub fn short(&self) -> &Sweep {
        &self.short
    }
    pub fn background(&self) -> &BackgroundFit {
        &self.background
    }
    pub fn resonance(&self) -> Option<&ResonanceFitResult> {
        self.resonance.as_ref()
    }
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }
    pub fn summary(&self) -> ParameterSummary {
        ParameterSummary::new(&self.background, self.resonance.as_ref())
    }
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&BackgroundFit, BackgroundChange) + 'static,
    {
        self.background.subscribe(observer)
    }
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.background.unsubscribe(id)
    }
    fn sweep_mut(&mut self, group: SweepGroup) -> &mut Sweep {
        match group {
            SweepGroup::Wide => &mut self.wide,
            SweepGroup::Short => &mut self.short,
        }
    }
    pub fn sweep(&self, group: SweepGroup) -> &Sweep {
        match group {
            SweepGroup::Wide => &self.wide,
            SweepGroup::Short => &self.short,
        }
    }
    /// Parses `reader` and replaces the sweep's data. A parse failure keeps the
    /// previous data.
    pub fn load<R: BufRead>(&mut self, group: SweepGroup, reader: R) -> Result<(), AnalysisError> {
        let record = SweepRecord::parse(reader)?;
        self.install(group, record);
        Ok(())
    }
    pub fn load_path(&mut self, group: SweepGroup, path: &Path) -> Result<(), AnalysisError> {
        let record = SweepRecord::from_path(path)?;
        self.install(group, record);
        Ok(())
    }
    fn install(&mut self, group: SweepGroup, record: SweepRecord) {
        self.sweep_mut(group).populate(record);
        if group == SweepGroup::Short {
            self.resonance = None;
        }
    }
    /// Slider positions of the wide sweep: samples `[lo, hi)` are left out of the fit.
    pub fn set_window(&mut self, lo: usize, hi: usize) {
        self.wide.apply_window(lo, hi);
    }
    pub fn fit_background(&mut self) -> Result<(), AnalysisError> {
        self.background.fit_with_degrees(
            &self.wide,
            self.settings.x_degree,
            self.settings.y_degree,
        )?;
        self.recompute_residuals();
        Ok(())
    }
    /// Recomputes the short-sweep residual against the current background.
    pub fn refresh(&mut self) -> Result<(), AnalysisError> {
        self.short.recompute_residual(&self.background)
    }
    /// Keeps every residual that already exists in step with the background.
    fn recompute_residuals(&mut self) {
        for sweep in [&mut self.wide, &mut self.short] {
            if sweep.is_empty() {
                continue;
            }
            if let Err(err) = sweep.recompute_residual(&self.background) {
                log::warn!("{} residual not updated: {err}", sweep.group().label());
            }
        }
    }
    /// Adds half of the flank slope estimate to the X background slope.
    pub fn fix_slope_x(&mut self) -> Result<f64, AnalysisError> {
        let k = estimate_slope_fix(&self.short, self.settings.slope_window)?;
        self.background.add_to_x_slope(k / 2.0)?;
        self.recompute_residuals();
        log::info!("Slope for X was updated by {}", k / 2.0);
        Ok(k)
    }
    pub fn fix_x_intercept(&mut self) -> Result<f64, AnalysisError> {
        let value = estimate_x_intercept_fix(&self.short, self.settings.tail_samples)?;
        self.background.add_to_x_intercept(value)?;
        self.recompute_residuals();
        log::info!("Intercept for X was updated by {value}");
        Ok(value)
    }
    pub fn fix_y_intercept(&mut self) -> Result<f64, AnalysisError> {
        let value = estimate_y_intercept_fix(&self.short)?;
        self.background.add_to_y_intercept(value)?;
        self.recompute_residuals();
        log::info!("Intercept for Y was updated by {value}");
        Ok(value)
    }
    /// Removes the calibration jump from the short sweep's raw Y.
    pub fn fix_y_tail(&mut self) -> Result<(usize, f64), AnalysisError> {
        let (split, delta) = detect_y_tail_jump(
            &self.short,
            self.settings.jump_offset,
            self.settings.jump_window,
            self.settings.jump_poly_order,
        )?;
        self.short.splice_y_tail(split, delta)?;
        if self.background.is_fitted() {
            self.short.recompute_residual(&self.background)?;
        }
        log::info!("Y tail fixed at sample {split} by {delta}");
        Ok((split, delta))
    }
    /// Frequency at the short residual's peak, or the configured fallback.
    pub fn default_f0_guess(&self) -> f64 {
        self.short
            .peak_index()
            .and_then(|i| self.short.frequency().get(i).copied())
            .unwrap_or(self.settings.f0_fallback)
    }
    pub fn fit_resonance(&mut self) -> Result<ResonanceFitResult, AnalysisError> {
        let mut guess = self.settings.resonance_guess();
        guess.f0 = self.default_f0_guess();
        let result = fit_resonance_with(
            &mut self.short,
            guess,
            &self.settings.solver(),
            self.settings.k_scale,
        )?;
        self.resonance = Some(result);
        Ok(result)
    }
    /// PNG figure of one sweep stage.
    pub fn export_png(
        &self,
        group: SweepGroup,
        stage: SeriesKind,
        style: PlotStyle,
    ) -> Result<Vec<u8>, AnalysisError> {
        render_sweep_png(self.sweep(group), stage, Some(&self.background), style)
    }
}

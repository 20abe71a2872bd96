use crate::analysis::background::BackgroundFit;
use crate::analysis::polynomial::polyval;
use crate::analysis::record::SweepRecord;
use crate::analysis::stats::argmax;
use crate::analysis::AnalysisError;
/// Which of the two measurements a sweep holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepGroup {
    Wide,
    Short,
}
impl SweepGroup {
    pub fn label(self) -> &'static str {
        match self {
            SweepGroup::Wide => "wide",
            SweepGroup::Short => "short",
        }
    }
}
/// Quadrature channel selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    X,
    Y,
}
/// Which stage of the pipeline a plotted series comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    Raw,
    Residual,
    Fitted,
}
/// A parsed sweep plus everything derived from it.
#[derive(Clone, Debug)]
pub struct Sweep {
    group: SweepGroup,
    record: SweepRecord,
    inclusion_mask: Vec<bool>,
    residual_x: Option<Vec<f64>>,
    residual_y: Option<Vec<f64>>,
    fitted_residual_x: Option<Vec<f64>>,
    fitted_residual_y: Option<Vec<f64>>,
    peak_index: Option<usize>,
}
impl Sweep {
    pub fn new(group: SweepGroup) -> Self {
        Self {
            group,
            record: SweepRecord::default(),
            inclusion_mask: Vec::new(),
            residual_x: None,
            residual_y: None,
            fitted_residual_x: None,
            fitted_residual_y: None,
            peak_index: None,
        }
    }
    pub fn from_record(group: SweepGroup, record: SweepRecord) -> Self {
        let mut sweep = Self::new(group);
        sweep.populate(record);
        sweep
    }
    /// Replaces the record, drops every derived array and starts a fresh mask.
    pub fn populate(&mut self, record: SweepRecord) {
        self.record = record;
        self.residual_x = None;
        self.residual_y = None;
        self.fitted_residual_x = None;
        self.fitted_residual_y = None;
        self.peak_index = None;
        self.create_mask();
        log::info!("{} sweep data were created", self.group.label());
    }
    pub fn create_mask(&mut self) {
        if self.record.is_empty() {
            log::warn!("You should import a data file first");
            return;
        }
        self.inclusion_mask = vec![true; self.record.len()];
        log::info!("mask was created");
    }
    /// Excludes samples `[lo, hi)` from the background fit. An empty or inverted
    /// selection means nothing is excluded.
    pub fn apply_window(&mut self, lo: usize, hi: usize) {
        let len = self.inclusion_mask.len();
        self.inclusion_mask.iter_mut().for_each(|m| *m = true);
        if hi > lo {
            let lo = lo.min(len);
            let hi = hi.min(len);
            self.inclusion_mask[lo..hi].iter_mut().for_each(|m| *m = false);
        }
    }
    pub fn recompute_residual(&mut self, background: &BackgroundFit) -> Result<(), AnalysisError> {
        let (Some(x_coeffs), Some(y_coeffs)) = (background.x_coeffs(), background.y_coeffs())
        else {
            return Err(AnalysisError::PrecursorMissing(
                "background fit of the wide sweep has not been performed",
            ));
        };
        let dx: Vec<f64> = self
            .record
            .frequency
            .iter()
            .zip(&self.record.x)
            .map(|(&f, &x)| x - polyval(x_coeffs, f))
            .collect();
        let dy: Vec<f64> = self
            .record
            .frequency
            .iter()
            .zip(&self.record.y)
            .map(|(&f, &y)| y - polyval(y_coeffs, f))
            .collect();
        self.peak_index = argmax(&dx);
        self.residual_x = Some(dx);
        self.residual_y = Some(dy);
        log::debug!("{} residual recomputed", self.group.label());
        Ok(())
    }
    /// Adds `delta` to every raw Y sample before `split_index`.
    pub fn splice_y_tail(&mut self, split_index: usize, delta: f64) -> Result<(), AnalysisError> {
        let len = self.record.y.len();
        if split_index > len {
            return Err(AnalysisError::DegenerateInput(format!(
                "split index {split_index} beyond sweep of {len} samples"
            )));
        }
        for y in &mut self.record.y[..split_index] {
            *y += delta;
        }
        log::info!("Y tail spliced at {split_index} by {delta}");
        Ok(())
    }
    pub(crate) fn set_fitted_residual(&mut self, x: Vec<f64>, y: Vec<f64>) {
        self.fitted_residual_x = Some(x);
        self.fitted_residual_y = Some(y);
    }
    /// Masked `(frequency, value)` pairs for one raw channel.
    pub fn masked(&self, channel: Channel) -> (Vec<f64>, Vec<f64>) {
        let values = match channel {
            Channel::X => &self.record.x,
            Channel::Y => &self.record.y,
        };
        self.record
            .frequency
            .iter()
            .zip(values)
            .zip(&self.inclusion_mask)
            .filter(|(_, keep)| **keep)
            .map(|((&f, &v), _)| (f, v))
            .unzip()
    }
    pub fn included_count(&self) -> usize {
        self.inclusion_mask.iter().filter(|&&m| m).count()
    }
    /// Plot-ready `[frequency, value]` points, `None` until that stage exists.
    pub fn series(&self, channel: Channel, kind: SeriesKind) -> Option<Vec<[f64; 2]>> {
        let values = match (kind, channel) {
            (SeriesKind::Raw, Channel::X) => Some(&self.record.x),
            (SeriesKind::Raw, Channel::Y) => Some(&self.record.y),
            (SeriesKind::Residual, Channel::X) => self.residual_x.as_ref(),
            (SeriesKind::Residual, Channel::Y) => self.residual_y.as_ref(),
            (SeriesKind::Fitted, Channel::X) => self.fitted_residual_x.as_ref(),
            (SeriesKind::Fitted, Channel::Y) => self.fitted_residual_y.as_ref(),
        }?;
        if values.is_empty() {
            return None;
        }
        Some(
            self.record
                .frequency
                .iter()
                .zip(values.iter())
                .map(|(&f, &v)| [f, v])
                .collect(),
        )
    }
    pub fn group(&self) -> SweepGroup {
        self.group
    }
    pub fn record(&self) -> &SweepRecord {
        &self.record
    }
    pub fn frequency(&self) -> &[f64] {
        &self.record.frequency
    }
    pub fn x(&self) -> &[f64] {
        &self.record.x
    }
    pub fn y(&self) -> &[f64] {
        &self.record.y
    }
    pub fn inclusion_mask(&self) -> &[bool] {
        &self.inclusion_mask
    }
    pub fn residual_x(&self) -> Option<&[f64]> {
        self.residual_x.as_deref()
    }
    pub fn residual_y(&self) -> Option<&[f64]> {
        self.residual_y.as_deref()
    }
    pub fn fitted_residual_x(&self) -> Option<&[f64]> {
        self.fitted_residual_x.as_deref()
    }
    pub fn fitted_residual_y(&self) -> Option<&[f64]> {
        self.fitted_residual_y.as_deref()
    }
    pub fn peak_index(&self) -> Option<usize> {
        self.peak_index
    }
    pub fn len(&self) -> usize {
        self.record.len()
    }
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

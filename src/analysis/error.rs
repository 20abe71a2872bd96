use thiserror::Error;
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("sweep file contains no data lines")]
    EmptyInput,
    #[error("failed to read sweep data: {0}")]
    Io(#[from] std::io::Error),
    #[error("{channel} fit needs at least {needed} included samples, got {got}")]
    InsufficientData {
        channel: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("{0}")]
    PrecursorMissing(&'static str),
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("resonance fit did not converge after {evaluations} evaluations: {reason}")]
    FitDidNotConverge { evaluations: usize, reason: String },
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl AnalysisError {
    /// True for every variant describing malformed or empty input files.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, AnalysisError::Parse { .. } | AnalysisError::EmptyInput)
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AnalysisError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AnalysisError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for AnalysisError {
    fn from(value: image::ImageError) -> Self {
        AnalysisError::Plot(value.to_string())
    }
}

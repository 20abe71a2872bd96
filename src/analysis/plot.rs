use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::analysis::background::BackgroundFit;
use crate::analysis::polynomial::polyval_all;
use crate::analysis::record::TIME_CONVERSION;
use crate::analysis::sweep::{Channel, SeriesKind, Sweep};
use crate::analysis::AnalysisError;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    /// Point colour, overlay colour.
    pub palette: Vec<RGBColor>,
    /// Raw time units per second, for the acquisition date in the caption.
    pub time_conversion: f64,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 700,
            background: RGBColor(10, 10, 10),
            palette: vec![CYAN, RED, YELLOW],
            time_conversion: TIME_CONVERSION,
        }
    }
}
struct Panel {
    caption: String,
    /// `(frequency, value, included)`
    points: Vec<(f64, f64, bool)>,
    overlay: Option<Vec<(f64, f64)>>,
}
/// Renders the X and Y panels of one sweep stage as PNG bytes.
///
/// `SeriesKind::Raw` draws the measured points, excluded samples dimmed, with the
/// background polynomial overlaid when `background` is fitted. `Residual` and `Fitted`
/// draw the residual with the fitted resonance overlaid once it exists.
pub fn render_sweep_png(
    sweep: &Sweep,
    stage: SeriesKind,
    background: Option<&BackgroundFit>,
    style: PlotStyle,
) -> Result<Vec<u8>, AnalysisError> {
    if sweep.is_empty() {
        return Err(AnalysisError::Plot(format!(
            "{} sweep has no samples",
            sweep.group().label()
        )));
    }
    let panels = [
        build_panel(sweep, Channel::X, stage, background, style.time_conversion)?,
        build_panel(sweep, Channel::Y, stage, background, style.time_conversion)?,
    ];
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let areas = root.split_evenly((2, 1));
        for (area, panel) in areas.iter().zip(&panels) {
            draw_panel(area, panel, &style)?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn build_panel(
    sweep: &Sweep,
    channel: Channel,
    stage: SeriesKind,
    background: Option<&BackgroundFit>,
    time_conversion: f64,
) -> Result<Panel, AnalysisError> {
    let channel_name = match channel {
        Channel::X => "X",
        Channel::Y => "Y",
    };
    let when = sweep
        .record()
        .acquisition_time_with(time_conversion)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let (points, overlay, stage_name) = match stage {
        SeriesKind::Raw => {
            let raw = sweep
                .series(channel, SeriesKind::Raw)
                .ok_or_else(|| AnalysisError::Plot("raw series is empty".into()))?;
            let points: Vec<(f64, f64, bool)> = raw
                .iter()
                .zip(sweep.inclusion_mask())
                .map(|(p, &keep)| (p[0], p[1], keep))
                .collect();
            let coeffs = background.and_then(|b| match channel {
                Channel::X => b.x_coeffs(),
                Channel::Y => b.y_coeffs(),
            });
            let freq = sweep.frequency();
            let overlay: Option<Vec<(f64, f64)>> = coeffs.map(|c| {
                freq.iter().copied().zip(polyval_all(c, freq)).collect()
            });
            (points, overlay, "raw")
        }
        SeriesKind::Residual | SeriesKind::Fitted => {
            let residual = sweep.series(channel, SeriesKind::Residual).ok_or(
                AnalysisError::PrecursorMissing("residual is not computed; refresh the sweep first"),
            )?;
            let points: Vec<(f64, f64, bool)> =
                residual.iter().map(|p| (p[0], p[1], true)).collect();
            let overlay = sweep
                .series(channel, SeriesKind::Fitted)
                .map(|fit| fit.iter().map(|p| (p[0], p[1])).collect());
            (points, overlay, "residual")
        }
    };
    Ok(Panel {
        caption: format!(
            "{} sweep {channel_name} {stage_name} {when}",
            sweep.group().label()
        ),
        points,
        overlay,
    })
}
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        (-1.0, 1.0)
    } else if hi - lo <= f64::EPSILON * lo.abs().max(1.0) {
        (lo - 1.0, hi + 1.0)
    } else {
        let pad = 0.05 * (hi - lo);
        (lo - pad, hi + pad)
    }
}
fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    style: &PlotStyle,
) -> Result<(), AnalysisError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let overlay = panel.overlay.as_deref().unwrap_or(&[]);
    let x_range = bounds(panel.points.iter().map(|p| p.0));
    let y_range = bounds(
        panel
            .points
            .iter()
            .map(|p| p.1)
            .chain(overlay.iter().map(|p| p.1)),
    );
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(&panel.caption, ("sans-serif", 18).into_font().color(&WHITE))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;
    chart
        .configure_mesh()
        .light_line_style(&WHITE.mix(0.1))
        .x_desc("Frequency, Hz")
        .draw()?;
    let point_color = style.palette.first().copied().unwrap_or(CYAN);
    let line_color = style.palette.get(1).copied().unwrap_or(RED);
    chart.draw_series(
        panel
            .points
            .iter()
            .filter(|p| !p.2)
            .map(|&(f, v, _)| Circle::new((f, v), 2, point_color.mix(0.25).filled())),
    )?;
    chart.draw_series(
        panel
            .points
            .iter()
            .filter(|p| p.2)
            .map(|&(f, v, _)| Circle::new((f, v), 2, point_color.filled())),
    )?;
    if !overlay.is_empty() {
        chart.draw_series(LineSeries::new(overlay.iter().copied(), &line_color))?;
    }
    Ok(())
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AnalysisError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AnalysisError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

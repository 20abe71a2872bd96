// src/gui.rs
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use anyhow::Context;
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};
use forkft::analysis::{Channel, SeriesKind, Sweep, SweepGroup};
use forkft::analysis::{polyval, PlotStyle};
use forkft::config::AnalysisSettings;
use forkft::session::{ParameterSummary, Session};
use crate::types::*;

const LOG_LINES: usize = 12;
const POINT_COLOR: Color32 = Color32::from_rgb(0, 255, 255);
const FIT_COLOR: Color32 = Color32::from_rgb(255, 80, 80);

pub struct ForkFtApp {
    session: Session,
    selected_tab: Tab,

    // 文件路径输入框
    wide_path: String,
    short_path: String,

    // 宽扫排除窗口 [lo, hi)
    window_lo: usize,
    window_hi: usize,

    // 参数摘要，由背景拟合的观察者标记刷新
    summary: ParameterSummary,
    summary_dirty: Rc<Cell<bool>>,

    log_messages: Vec<String>,
}

impl ForkFtApp {
    pub fn new(settings: AnalysisSettings, startup_notes: Vec<String>) -> Self {
        let mut session = Session::new(settings);
        let summary_dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&summary_dirty);
        session.subscribe(move |_, change| {
            log::debug!("background changed: {change:?}");
            flag.set(true);
        });
        let mut app = Self {
            session,
            selected_tab: Tab::WideSweep,
            wide_path: String::new(),
            short_path: String::new(),
            window_lo: 0,
            window_hi: 0,
            summary: ParameterSummary::default(),
            summary_dirty,
            log_messages: vec!["ForkFT ready.".to_owned()],
        };
        for note in startup_notes {
            app.log(&note);
        }
        app
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    // 执行一个操作，成功/失败都写进日志面板
    fn run(&mut self, action: Action) {
        let outcome = self.execute(action);
        match outcome {
            Ok(msg) => {
                log::info!("{msg}");
                self.log(&msg);
            }
            Err(err) => {
                log::error!("{action:?} failed: {err:#}");
                self.log(&format!("Error: {err:#}"));
            }
        }
        // 共振拟合结果不经过观察者，这里统一刷新
        self.summary = self.session.summary();
    }

    fn execute(&mut self, action: Action) -> anyhow::Result<String> {
        match action {
            Action::OpenWide => {
                let path = PathBuf::from(self.wide_path.trim());
                self.session
                    .load_path(SweepGroup::Wide, &path)
                    .with_context(|| format!("opening {}", path.display()))?;
                self.window_lo = 0;
                self.window_hi = 0;
                self.session.set_window(0, 0);
                Ok(format!("Wide sweep: {} samples", self.session.wide().len()))
            }
            Action::FitWide => {
                self.session.set_window(self.window_lo, self.window_hi);
                self.session.fit_background()?;
                Ok("Fit of wide sweep was done".to_owned())
            }
            Action::OpenShort => {
                let path = PathBuf::from(self.short_path.trim());
                self.session
                    .load_path(SweepGroup::Short, &path)
                    .with_context(|| format!("opening {}", path.display()))?;
                if self.session.background().is_fitted() {
                    self.session.refresh()?;
                }
                Ok(format!("Short sweep: {} samples", self.session.short().len()))
            }
            Action::Refresh => {
                self.session.refresh()?;
                Ok("Short residual refreshed".to_owned())
            }
            Action::SlopeX => {
                let k = self.session.fix_slope_x()?;
                Ok(format!("Slope for X was updated (k = {k:.4e})"))
            }
            Action::OffsetX => {
                let v = self.session.fix_x_intercept()?;
                Ok(format!("Intercept X shifted by {v:.4e}"))
            }
            Action::OffsetY => {
                let v = self.session.fix_y_intercept()?;
                Ok(format!("Intercept Y shifted by {v:.4e}"))
            }
            Action::YTail => {
                let (split, delta) = self.session.fix_y_tail()?;
                Ok(format!("Y tail fixed at {split}, delta {delta:.4e}"))
            }
            Action::FitResonance => {
                let r = self.session.fit_resonance()?;
                Ok(format!("f0 = {:.3} Hz, Q = {:.3}, A = {:.3}", r.f0, r.q, r.amplitude))
            }
            Action::ExportPng => {
                let out = self.export_png()?;
                Ok(format!("Saved {}", out.display()))
            }
        }
    }

    // 图像写在短扫文件旁边
    fn export_png(&self) -> anyhow::Result<PathBuf> {
        let source = Path::new(self.short_path.trim());
        anyhow::ensure!(!source.as_os_str().is_empty(), "open a short sweep first");
        let style = PlotStyle {
            time_conversion: self.session.settings().time_conversion,
            ..PlotStyle::default()
        };
        let png = self
            .session
            .export_png(SweepGroup::Short, SeriesKind::Residual, style)?;
        let out = source.with_extension("residual.png");
        std::fs::write(&out, png).with_context(|| format!("writing {}", out.display()))?;
        Ok(out)
    }

    fn acquisition_label(&self) -> String {
        self.session
            .wide()
            .record()
            .acquisition_time_with(self.session.settings().time_conversion)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "no wide sweep".to_owned())
    }

    fn path_row(ui: &mut egui::Ui, path: &mut String, open: Action, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            ui.label("File:");
            ui.add(egui::TextEdit::singleline(path).desired_width(420.0));
            if ui.button("Open").clicked() {
                actions.push(open);
            }
        });
    }

    fn show_wide_sweep(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        Self::path_row(ui, &mut self.wide_path, Action::OpenWide, actions);
        let max = self.session.wide().len();
        ui.horizontal(|ui| {
            let lo = ui.add(egui::Slider::new(&mut self.window_lo, 0..=max).text("Exclude from"));
            let hi = ui.add(egui::Slider::new(&mut self.window_hi, 0..=max).text("to"));
            if lo.changed() || hi.changed() {
                self.session.set_window(self.window_lo, self.window_hi);
            }
            if ui.button("Fit wide sweep").clicked() {
                actions.push(Action::FitWide);
            }
        });
        let title = self.acquisition_label();
        let sweep = self.session.wide();
        let background = self.session.background();
        for channel in [Channel::X, Channel::Y] {
            let coeffs = match channel {
                Channel::X => background.x_coeffs(),
                Channel::Y => background.y_coeffs(),
            };
            let overlay = coeffs.map(|c| {
                sweep
                    .frequency()
                    .iter()
                    .map(|&f| [f, polyval(c, f)])
                    .collect::<Vec<_>>()
            });
            let (included, excluded) = split_by_mask(sweep, channel);
            channel_plot(ui, sweep, channel, &title, included, excluded, overlay);
        }
    }

    fn show_residual(&self, ui: &mut egui::Ui, group: SweepGroup) {
        let sweep = self.session.sweep(group);
        let title = self.acquisition_label();
        for channel in [Channel::X, Channel::Y] {
            let Some(residual) = sweep.series(channel, SeriesKind::Residual) else {
                ui.label(format!("{} residual is not computed yet.", name(channel)));
                continue;
            };
            let fitted = sweep.series(channel, SeriesKind::Fitted);
            channel_plot(ui, sweep, channel, &title, residual, Vec::new(), fitted);
        }
    }

    fn show_short_sweep(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        Self::path_row(ui, &mut self.short_path, Action::OpenShort, actions);
        if ui.button("Refresh").clicked() {
            actions.push(Action::Refresh);
        }
        let title = self.acquisition_label();
        let sweep = self.session.short();
        for channel in [Channel::X, Channel::Y] {
            let raw = sweep.series(channel, SeriesKind::Raw).unwrap_or_default();
            channel_plot(ui, sweep, channel, &title, raw, Vec::new(), None);
        }
    }

    fn show_short_residual(&self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            for (label, action) in [
                ("Slope X", Action::SlopeX),
                ("Offset X", Action::OffsetX),
                ("Offset Y", Action::OffsetY),
                ("Y tail", Action::YTail),
                ("Fit resonance", Action::FitResonance),
                ("Export PNG", Action::ExportPng),
            ] {
                if ui.button(label).clicked() {
                    actions.push(action);
                }
            }
        });
        self.show_residual(ui, SweepGroup::Short);
    }
}

fn name(channel: Channel) -> &'static str {
    match channel {
        Channel::X => "X",
        Channel::Y => "Y",
    }
}

fn split_by_mask(sweep: &Sweep, channel: Channel) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let raw = sweep.series(channel, SeriesKind::Raw).unwrap_or_default();
    let mut included = Vec::with_capacity(raw.len());
    let mut excluded = Vec::new();
    for (point, &keep) in raw.into_iter().zip(sweep.inclusion_mask()) {
        if keep {
            included.push(point);
        } else {
            excluded.push(point);
        }
    }
    (included, excluded)
}

fn channel_plot(
    ui: &mut egui::Ui,
    sweep: &Sweep,
    channel: Channel,
    title: &str,
    points: Vec<[f64; 2]>,
    dimmed: Vec<[f64; 2]>,
    overlay: Option<Vec<[f64; 2]>>,
) {
    let label = format!("{} sweep {} ({title})", sweep.group().label(), name(channel));
    ui.label(egui::RichText::new(&label).strong());
    let height = (ui.available_height() / 2.0 - 20.0).max(150.0);
    Plot::new(label)
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Frequency, Hz")
        .show(ui, |plot_ui| {
            if !dimmed.is_empty() {
                plot_ui.points(
                    Points::new(PlotPoints::new(dimmed))
                        .radius(1.5)
                        .color(Color32::from_rgb(60, 90, 90))
                        .name("excluded"),
                );
            }
            plot_ui.points(
                Points::new(PlotPoints::new(points))
                    .radius(1.5)
                    .color(POINT_COLOR)
                    .name(name(channel)),
            );
            if let Some(fit) = overlay {
                plot_ui.line(Line::new(PlotPoints::new(fit)).color(FIT_COLOR).name("fit"));
            }
        });
}

impl eframe::App for ForkFtApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.summary_dirty.replace(false) {
            self.summary = self.session.summary();
        }

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        let mut actions = Vec::new();

        egui::SidePanel::left("L").min_width(280.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("ForkFT");
            ui.label("Resonance sweep analysis");
            ui.separator();

            for tab in Tab::ALL {
                ui.selectable_value(&mut self.selected_tab, tab, tab.title());
            }
            ui.separator();

            ui.label("PARAMETERS");
            ui.monospace(self.summary.to_string());
            ui.separator();

            egui::ScrollArea::vertical().max_height(200.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.selected_tab {
            Tab::WideSweep => self.show_wide_sweep(ui, &mut actions),
            Tab::WideResidual => self.show_residual(ui, SweepGroup::Wide),
            Tab::ShortSweep => self.show_short_sweep(ui, &mut actions),
            Tab::ShortResidual => self.show_short_residual(ui, &mut actions),
        });

        for action in actions {
            self.run(action);
        }
    }
}

// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod gui;
mod types;
use anyhow::Context;
use eframe::egui;
use forkft::config::AnalysisSettings;
// 读取分析参数；配置文件有问题时用默认值并把原因显示在日志面板
fn load_settings() -> (AnalysisSettings, Vec<String>) {
    let path = AnalysisSettings::default_path();
    match AnalysisSettings::load(&path).context("settings ignored") {
        Ok(settings) => (settings, Vec::new()),
        Err(err) => {
            log::error!("{err:#}");
            (AnalysisSettings::default(), vec![format!("{err:#}")])
        }
    }
}
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    log::info!("Application has started");
    let (settings, notes) = load_settings();
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1400.0, 900.0])
        .with_min_inner_size([1000.0, 700.0])
        .with_title("ForkFT");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "ForkFT",
        options,
        Box::new(move |_cc| Box::new(gui::ForkFtApp::new(settings, notes))),
    )
    .map_err(|e| anyhow::anyhow!("window failed: {e}"))?;
    log::info!("Application has finished");
    Ok(())
}

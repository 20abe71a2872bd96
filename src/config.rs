// src/config.rs
// 分析参数：默认值与 JSON 配置文件
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::analysis::background::{DEFAULT_X_DEGREE, DEFAULT_Y_DEGREE};
use crate::analysis::corrections::{
    DEFAULT_JUMP_OFFSET, DEFAULT_JUMP_POLY_ORDER, DEFAULT_JUMP_WINDOW, DEFAULT_SLOPE_WINDOW,
    DEFAULT_TAIL_SAMPLES,
};
use crate::analysis::lm::LevenbergMarquardt;
use crate::analysis::record::TIME_CONVERSION;
use crate::analysis::resonance::{
    ResonanceGuess, DEFAULT_AMPLITUDE_GUESS, DEFAULT_F0_GUESS, DEFAULT_K_SCALE, DEFAULT_Q_GUESS,
};
pub const SETTINGS_ENV: &str = "FORKFT_SETTINGS";
pub const SETTINGS_FILE: &str = "forkft.json";
/// Every tunable of the analysis. Fields missing from the file keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub x_degree: usize,
    pub y_degree: usize,
    pub slope_window: usize,
    pub tail_samples: usize,
    pub jump_offset: usize,
    pub jump_window: usize,
    pub jump_poly_order: usize,
    pub f0_fallback: f64,
    pub q_guess: f64,
    pub amplitude_guess: f64,
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub k_scale: f64,
    /// Raw time units per second.
    pub time_conversion: f64,
}
impl Default for AnalysisSettings {
    fn default() -> Self {
        let solver = LevenbergMarquardt::default();
        Self {
            x_degree: DEFAULT_X_DEGREE,
            y_degree: DEFAULT_Y_DEGREE,
            slope_window: DEFAULT_SLOPE_WINDOW,
            tail_samples: DEFAULT_TAIL_SAMPLES,
            jump_offset: DEFAULT_JUMP_OFFSET,
            jump_window: DEFAULT_JUMP_WINDOW,
            jump_poly_order: DEFAULT_JUMP_POLY_ORDER,
            f0_fallback: DEFAULT_F0_GUESS,
            q_guess: DEFAULT_Q_GUESS,
            amplitude_guess: DEFAULT_AMPLITUDE_GUESS,
            max_evaluations: solver.max_evaluations,
            ftol: solver.ftol,
            xtol: solver.xtol,
            k_scale: DEFAULT_K_SCALE,
            time_conversion: TIME_CONVERSION,
        }
    }
}
impl AnalysisSettings {
    pub fn solver(&self) -> LevenbergMarquardt {
        LevenbergMarquardt {
            max_evaluations: self.max_evaluations,
            ftol: self.ftol,
            xtol: self.xtol,
        }
    }
    /// Guess with the fallback f0; callers replace f0 when a peak is known.
    pub fn resonance_guess(&self) -> ResonanceGuess {
        ResonanceGuess {
            f0: self.f0_fallback,
            q: self.q_guess,
            amplitude: self.amplitude_guess,
        }
    }
    /// `$FORKFT_SETTINGS` if set, else `forkft.json` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        log::info!("settings loaded from {}", path.display());
        Ok(settings)
    }
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.jump_window % 2 == 1, "jump_window must be odd");
        anyhow::ensure!(
            self.jump_poly_order < self.jump_window,
            "jump_poly_order must be less than jump_window"
        );
        anyhow::ensure!(self.time_conversion > 0.0, "time_conversion must be positive");
        anyhow::ensure!(self.max_evaluations > 0, "max_evaluations must be positive");
        Ok(())
    }
}

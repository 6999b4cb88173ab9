//! Configuration loading for the reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! sensible defaults so the reader can still launch.

use crate::chunker::DEFAULT_TARGET_LEN;
use crate::fit::{FitMode, Viewport};
use crate::narration::BASELINE_WPM;
use crate::narration::voice::default_voice_dirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    /// Piper `.onnx` model; when unset the first scanned voice is used.
    #[serde(default)]
    pub voice_model: Option<PathBuf>,
    #[serde(default = "default_voice_dirs")]
    pub voice_dirs: Vec<PathBuf>,
    #[serde(default = "default_wpm")]
    pub wpm: u32,
    #[serde(default = "default_synth_command")]
    pub synth_command: Vec<String>,
    #[serde(default = "default_player_command")]
    pub player_command: Vec<String>,
    #[serde(default)]
    pub fit_mode: FitMode,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
    #[serde(default = "default_raster_cache_mb")]
    pub raster_cache_mb: usize,
    #[serde(default = "default_chunk_target_len")]
    pub chunk_target_len: usize,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            voice_model: None,
            voice_dirs: default_voice_dirs(),
            wpm: default_wpm(),
            synth_command: default_synth_command(),
            player_command: default_player_command(),
            fit_mode: FitMode::Width,
            zoom: default_zoom(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            raster_cache_mb: default_raster_cache_mb(),
            chunk_target_len: default_chunk_target_len(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn raster_budget_bytes(&self) -> usize {
        self.raster_cache_mb.saturating_mul(1024 * 1024)
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str::<AppConfig>(contents)
}

fn default_wpm() -> u32 {
    BASELINE_WPM
}

fn default_synth_command() -> Vec<String> {
    ["piper", "-m", "{model}", "--length_scale", "{rate}", "-f", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_player_command() -> Vec<String> {
    ["aplay", "-q", "-t", "wav", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_zoom() -> f32 {
    1.0
}

fn default_viewport_width() -> f32 {
    1000.0
}

fn default_viewport_height() -> f32 {
    800.0
}

fn default_raster_cache_mb() -> usize {
    256
}

fn default_chunk_target_len() -> usize {
    DEFAULT_TARGET_LEN
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.wpm, 170);
        assert_eq!(cfg.fit_mode, FitMode::Width);
        assert_eq!(cfg.chunk_target_len, 420);
        assert_eq!(cfg.synth_command[0], "piper");
        assert_eq!(cfg.player_command, vec!["aplay", "-q", "-t", "wav", "-"]);
        assert_eq!(cfg.voice_dirs.len(), 3);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let cfg = parse_config(
            r#"
            wpm = 220
            fit_mode = "page"
            voice_model = "~/voices/en.onnx"
            raster_cache_mb = 0
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.wpm, 220);
        assert_eq!(cfg.fit_mode, FitMode::Page);
        assert_eq!(cfg.voice_model, Some(PathBuf::from("~/voices/en.onnx")));
        assert_eq!(cfg.raster_budget_bytes(), 0);
        assert_eq!(cfg.log_level.as_filter_str(), "debug");
        assert_eq!(cfg.zoom, 1.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_config("fit_mode = \"sideways\"").is_err());
        assert!(parse_config("wpm = -3").is_err());
    }

    #[test]
    fn missing_or_broken_file_falls_back_to_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here/config.toml"));
        assert_eq!(cfg.wpm, 170);

        let path = std::env::temp_dir().join(format!(
            "pvr-config-{}.toml",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        fs::write(&path, "wpm = [oops").unwrap();
        let cfg = load_config(&path);
        assert_eq!(cfg.wpm, 170);
        let _ = fs::remove_file(path);
    }
}

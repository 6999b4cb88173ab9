//! Piper voice models: validation and discovery.
//!
//! A voice is an `.onnx` model with a JSON config next to it named
//! `<model>.onnx.json`. Both must exist and the config must parse before a
//! narration session is allowed to start.

use super::NarrationError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directories searched for voices when none are configured.
pub const DEFAULT_VOICE_DIRS: &[&str] = &[
    "~/.local/share/piper/voices",
    "/usr/share/piper/voices",
    "/usr/local/share/piper/voices",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceAudio {
    pub sample_rate: Option<u32>,
    pub quality: Option<String>,
}

/// The parts of the Piper voice config we care about. Unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub audio: VoiceAudio,
    #[serde(default)]
    pub language: Option<serde_json::Value>,
}

/// A validated voice.
#[derive(Debug, Clone)]
pub struct VoiceModel {
    model: PathBuf,
    config_path: PathBuf,
    config: VoiceConfig,
}

impl VoiceModel {
    pub fn validate(path: &Path) -> Result<Self, NarrationError> {
        let model = expand_home(path);
        if !model.is_file() {
            return Err(NarrationError::InvalidVoiceConfig {
                path: model,
                reason: "voice model not found".into(),
            });
        }

        let config_path = config_path_for(&model);
        if !config_path.is_file() {
            return Err(NarrationError::InvalidVoiceConfig {
                path: config_path,
                reason: "voice config JSON missing next to model".into(),
            });
        }

        let file = File::open(&config_path).map_err(|err| NarrationError::InvalidVoiceConfig {
            path: config_path.clone(),
            reason: err.to_string(),
        })?;
        let config: VoiceConfig = serde_json::from_reader(BufReader::new(file)).map_err(|err| {
            NarrationError::InvalidVoiceConfig {
                path: config_path.clone(),
                reason: format!("invalid voice config JSON: {err}"),
            }
        })?;

        info!(
            model = %model.display(),
            sample_rate = ?config.audio.sample_rate,
            quality = ?config.audio.quality,
            "Validated voice model"
        );
        Ok(Self {
            model,
            config_path,
            config,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Short display name, e.g. `en_US-amy-medium`.
    pub fn name(&self) -> String {
        self.model
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model.display().to_string())
    }
}

/// `<model>.onnx` -> `<model>.onnx.json`
pub fn config_path_for(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

pub fn default_voice_dirs() -> Vec<PathBuf> {
    DEFAULT_VOICE_DIRS.iter().map(PathBuf::from).collect()
}

/// All `.onnx` models in `dirs` that have a config next to them, sorted
/// and deduplicated. Missing directories are skipped.
pub fn scan_voice_models(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut voices = Vec::new();
    for dir in dirs {
        let dir = expand_home(dir);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            debug!(dir = %dir.display(), "Voice directory not readable; skipping");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_onnx = path
                .extension()
                .map(|ext| ext == "onnx")
                .unwrap_or(false);
            if is_onnx && config_path_for(&path).is_file() {
                voices.push(path);
            }
        }
    }
    voices.sort();
    voices.dedup();
    debug!(count = voices.len(), "Scanned voice models");
    voices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("pvr-voice-{label}-{nanos}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn valid_voice_passes() {
        let dir = temp_dir("valid");
        let model = dir.join("en_US-test-low.onnx");
        fs::write(&model, b"onnx").unwrap();
        fs::write(
            config_path_for(&model),
            br#"{"audio": {"sample_rate": 16000, "quality": "low"}, "num_speakers": 1}"#,
        )
        .unwrap();

        let voice = VoiceModel::validate(&model).expect("valid voice");
        assert_eq!(voice.name(), "en_US-test-low");
        assert_eq!(voice.config_path(), config_path_for(&model));
        assert_eq!(voice.config().audio.sample_rate, Some(16000));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_model_or_config_is_rejected() {
        let dir = temp_dir("missing");
        let model = dir.join("voice.onnx");
        assert!(matches!(
            VoiceModel::validate(&model),
            Err(NarrationError::InvalidVoiceConfig { .. })
        ));

        fs::write(&model, b"onnx").unwrap();
        let err = VoiceModel::validate(&model).unwrap_err();
        assert!(err.to_string().contains("config JSON missing"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unparsable_config_is_rejected() {
        let dir = temp_dir("broken");
        let model = dir.join("voice.onnx");
        fs::write(&model, b"onnx").unwrap();
        fs::write(config_path_for(&model), b"<html>not json</html>").unwrap();
        let err = VoiceModel::validate(&model).unwrap_err();
        assert!(err.to_string().contains("invalid voice config JSON"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn scan_finds_only_models_with_configs() {
        let dir = temp_dir("scan");
        for name in ["b.onnx", "a.onnx", "orphan.onnx"] {
            fs::write(dir.join(name), b"onnx").unwrap();
        }
        fs::write(dir.join("a.onnx.json"), b"{}").unwrap();
        fs::write(dir.join("b.onnx.json"), b"{}").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();

        let found = scan_voice_models(&[dir.clone(), dir.join("nope"), dir.clone()]);
        assert_eq!(found, vec![dir.join("a.onnx"), dir.join("b.onnx")]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn config_path_appends_json() {
        assert_eq!(
            config_path_for(Path::new("/v/en.onnx")),
            PathBuf::from("/v/en.onnx.json")
        );
    }
}

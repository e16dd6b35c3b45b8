use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::capture::domain::capture_state_machine::CaptureConfig;
use crate::inference::domain::inference_dispatcher::RemoteLayout;
use crate::sequence::domain::sequence_normalizer::NormalizerConfig;
use crate::shared::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Process-wide configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureSection,
    pub normalizer: NormalizerSection,
    pub inference: InferenceSection,
    pub sentence: SentenceSection,
    pub speech: SpeechSection,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub frames_per_word: usize,
    pub total_words: usize,
    pub countdown_secs: f64,
    pub inter_word_wait_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizerSection {
    pub fixed_length: usize,
    pub max_gap: usize,
    pub landmark_subset: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub model_name: String,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub vocabulary_path: PathBuf,
    pub remote_enabled: bool,
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub program: String,
    pub device_dir: String,
    pub script: String,
    pub interpreter: String,
    pub step_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SentenceSection {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub enabled: bool,
    pub rate_wpm: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureSection::default(),
            normalizer: NormalizerSection::default(),
            inference: InferenceSection::default(),
            sentence: SentenceSection::default(),
            speech: SpeechSection::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            frames_per_word: DEFAULT_FRAMES_PER_WORD,
            total_words: DEFAULT_TOTAL_WORDS,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            inter_word_wait_secs: DEFAULT_INTER_WORD_WAIT_SECS,
        }
    }
}

impl Default for NormalizerSection {
    fn default() -> Self {
        Self {
            fixed_length: DEFAULT_FIXED_LENGTH,
            max_gap: DEFAULT_MAX_GAP,
            landmark_subset: default_landmark_subset(),
        }
    }
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            model_name: MODEL_NAME.to_string(),
            model_path: None,
            model_url: None,
            vocabulary_path: PathBuf::from(VOCABULARY_PATH),
            remote_enabled: true,
            remote: RemoteSection::default(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            program: REMOTE_PROGRAM.to_string(),
            device_dir: REMOTE_DEVICE_DIR.to_string(),
            script: REMOTE_SCRIPT.to_string(),
            interpreter: REMOTE_INTERPRETER.to_string(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }
}

impl Default for SentenceSection {
    fn default() -> Self {
        Self {
            url: SENTENCE_SERVICE_URL.to_string(),
            timeout_secs: DEFAULT_SENTENCE_TIMEOUT_SECS,
        }
    }
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_wpm: DEFAULT_SPEECH_RATE_WPM,
        }
    }
}

impl Config {
    /// `<config_dir>/Sign2Speech/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Sign2Speech").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, the user config
    /// file is used when present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.frames_per_word == 0 {
            return Err(ConfigError::Invalid("frames_per_word must be >= 1".into()));
        }
        if self.capture.total_words == 0 {
            return Err(ConfigError::Invalid("total_words must be >= 1".into()));
        }
        let durations = [self.capture.countdown_secs, self.capture.inter_word_wait_secs];
        if !durations.iter().all(|d| d.is_finite() && *d >= 0.0) {
            return Err(ConfigError::Invalid(
                "countdown and wait durations must be finite and non-negative".into(),
            ));
        }
        if self.normalizer.fixed_length == 0 {
            return Err(ConfigError::Invalid("fixed_length must be >= 1".into()));
        }
        if self.normalizer.landmark_subset.is_empty() {
            return Err(ConfigError::Invalid("landmark_subset must not be empty".into()));
        }
        if let Some(&bad) = self
            .normalizer
            .landmark_subset
            .iter()
            .find(|&&i| i >= LANDMARK_SLOTS)
        {
            return Err(ConfigError::Invalid(format!(
                "landmark index {bad} is out of range (0..{LANDMARK_SLOTS})"
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be >= 1".into()));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            frames_per_word: self.capture.frames_per_word,
            total_words: self.capture.total_words,
            countdown: Duration::from_secs_f64(self.capture.countdown_secs),
            inter_word_wait: Duration::from_secs_f64(self.capture.inter_word_wait_secs),
        }
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            fixed_length: self.normalizer.fixed_length,
            max_gap: self.normalizer.max_gap,
            landmark_subset: self.normalizer.landmark_subset.clone(),
        }
    }

    pub fn remote_layout(&self) -> RemoteLayout {
        let remote = &self.inference.remote;
        RemoteLayout {
            device_dir: remote.device_dir.clone(),
            script: remote.script.clone(),
            interpreter: remote.interpreter.clone(),
            input_file: REMOTE_INPUT_FILE.to_string(),
            output_file: REMOTE_OUTPUT_FILE.to_string(),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.remote.step_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Directory holding bundled model files (the vocabulary's directory).
    pub fn bundled_model_dir(&self) -> Option<&Path> {
        self.inference
            .vocabulary_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

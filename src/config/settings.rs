//! Client settings and configuration management

use crate::backend::traits::GenerationParams;
use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub checklist: ChecklistConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    #[serde(default = "default_guess_prompt_path")]
    pub guess_prompt_path: String,
    #[serde(default = "default_background_path")]
    pub background_path: String,
    #[serde(default = "default_generate_path")]
    pub generate_path: String,
}

fn default_name() -> String {
    "magic-quill".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_timeout() -> u64 {
    120000
}

fn default_health_check_path() -> String {
    "/".to_string()
}

fn default_guess_prompt_path() -> String {
    "/magic_quill/guess_prompt".to_string()
}

fn default_background_path() -> String {
    "/magic_quill/process_background_img".to_string()
}

fn default_generate_path() -> String {
    "/magic_quill/generate".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: default_base_url(),
            timeout_ms: default_timeout(),
            health_check_path: default_health_check_path(),
            guess_prompt_path: default_guess_prompt_path(),
            background_path: default_background_path(),
            generate_path: default_generate_path(),
        }
    }
}

/// Smoke checklist configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChecklistConfig {
    /// Image used as input; a built-in 1x1 PNG when unset
    #[serde(default)]
    pub sample_image: Option<String>,
    /// Resolution the backend is configured to resize backgrounds to
    #[serde(default = "default_target_resolution")]
    pub target_resolution: u32,
    /// The generate endpoint is only proposed; off unless the backend has it
    #[serde(default)]
    pub include_generate: bool,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Fixed seed used for the determinism check
    #[serde(default = "default_fixed_seed")]
    pub fixed_seed: i64,
}

fn default_target_resolution() -> u32 {
    512
}

fn default_prompt() -> String {
    "a photo".to_string()
}

fn default_fixed_seed() -> i64 {
    42
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            sample_image: None,
            target_resolution: default_target_resolution(),
            include_generate: false,
            prompt: default_prompt(),
            fixed_seed: default_fixed_seed(),
        }
    }
}

/// Load test configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    #[serde(default = "default_requests")]
    pub requests: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_requests() -> usize {
    20
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            max_concurrent: default_max_concurrent(),
            timeout_ms: default_timeout(),
        }
    }
}

/// Where returned images are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "./quill_output".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), false)
    }

    /// Like `load_from_path`, but the file must exist
    pub fn load_required<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(invalid(format!(
                "Configuration file '{}' not found",
                path.display()
            )));
        }
        Self::build(path, true)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .set_default("backend.base_url", default_base_url())?
            .set_default("backend.timeout_ms", default_timeout())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            // Load from configuration file
            .add_source(File::with_name(&path.to_string_lossy()).required(required))
            // Override with environment variables (prefixed with MAGIC_QUILL__)
            .add_source(
                Environment::with_prefix("MAGIC_QUILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let backend = &self.backend;
        if !backend.base_url.starts_with("http://") && !backend.base_url.starts_with("https://") {
            return Err(invalid(format!(
                "Backend base_url '{}' must start with http:// or https://",
                backend.base_url
            )));
        }
        if backend.timeout_ms == 0 {
            return Err(invalid("Backend timeout_ms cannot be 0".to_string()));
        }
        for (key, path) in [
            ("health_check_path", &backend.health_check_path),
            ("guess_prompt_path", &backend.guess_prompt_path),
            ("background_path", &backend.background_path),
            ("generate_path", &backend.generate_path),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(format!("Backend {} '{}' must start with '/'", key, path)));
            }
        }

        if self.checklist.target_resolution == 0 {
            return Err(invalid("Checklist target_resolution cannot be 0".to_string()));
        }

        if self.load.max_concurrent == 0 {
            return Err(invalid("Load max_concurrent must be at least 1".to_string()));
        }
        if self.load.timeout_ms == 0 {
            return Err(invalid("Load timeout_ms cannot be 0".to_string()));
        }
        if self.load.requests == 0 {
            return Err(invalid("Load requests must be at least 1".to_string()));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(invalid(format!(
                "Logging format '{}' is invalid. Must be 'json' or 'pretty'",
                self.logging.format
            )));
        }

        self.generation
            .validate()
            .map_err(|e| invalid(format!("Generation defaults: {}", e)))
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            generation: GenerationParams::default(),
            checklist: ChecklistConfig::default(),
            load: LoadConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

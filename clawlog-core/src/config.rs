//! User configuration: `<root>/config.yaml`, then environment overrides.
//!
//! ```yaml
//! provider: openai            # gemini | openai
//! api_key: sk-...
//! model: gpt-4o-mini          # optional
//! project_paths:
//!   - /home/dev/api
//!   - /home/dev/web
//! log_file: career_logs.md    # relative paths resolve against the working dir
//! max_diff_chars: 15000
//! language: English
//! base_url: http://localhost:8080   # optional, proxies and test servers
//! ```
//!
//! Environment variables win over the file. Each has a legacy alias
//! (`LLM_TYPE`, `API_KEY`, `PROJECT_PATHS`) for `.env`-style setups.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;

pub const DEFAULT_LOG_FILE: &str = "career_logs.md";
pub const DEFAULT_MAX_DIFF_CHARS: usize = 15_000;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Text-generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Overrides [`Provider::default_model`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub project_paths: Vec<PathBuf>,
    pub log_file: PathBuf,
    /// Per-repository cap on diff text sent to the backend.
    pub max_diff_chars: usize,
    /// Language the summary is written in.
    pub language: String,
    /// Alternative API host for the selected provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Where the file was (or would be) read from. Not serialized.
    #[serde(skip)]
    source: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_key: None,
            model: None,
            project_paths: Vec::new(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            max_diff_chars: DEFAULT_MAX_DIFF_CHARS,
            language: "English".to_string(),
            base_url: None,
            source: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load `<root>/config.yaml` (absent file = defaults) and apply the
    /// process environment.
    pub fn load_at(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&paths::config_path(root))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if contents.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        } else {
            Self::default()
        };
        config.source = path.to_path_buf();
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`). Empty
    /// values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |primary: &str, alias: Option<&str>| {
            lookup(primary)
                .or_else(|| alias.and_then(|a| lookup(a)))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(provider) = get("CLAW_LOG_PROVIDER", Some("LLM_TYPE")) {
            self.provider = provider.parse()?;
        }
        if let Some(key) = get("CLAW_LOG_API_KEY", Some("API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("CLAW_LOG_MODEL", None) {
            self.model = Some(model);
        }
        if let Some(paths) = get("CLAW_LOG_PROJECT_PATHS", Some("PROJECT_PATHS")) {
            self.project_paths = split_paths(&paths);
        }
        if let Some(log_file) = get("CLAW_LOG_LOG_FILE", None) {
            self.log_file = PathBuf::from(log_file);
        }
        if let Some(base_url) = get("CLAW_LOG_BASE_URL", None) {
            self.base_url = Some(base_url);
        }
        if let Some(max) = get("CLAW_LOG_MAX_DIFF_CHARS", None) {
            self.max_diff_chars = max.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLAW_LOG_MAX_DIFF_CHARS",
                value: max.clone(),
            })?;
        }
        Ok(())
    }

    /// The API key, or a [`ConfigError::MissingApiKey`] naming the file to edit.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                path: self.source.clone(),
            })
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Log file path, resolving a relative `log_file` against `cwd`.
    pub fn log_file_in(&self, cwd: &Path) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            cwd.join(&self.log_file)
        }
    }

    /// The file this configuration was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Comma-separated path list, blanks dropped.
fn split_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

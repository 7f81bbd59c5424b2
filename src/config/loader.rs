//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.diffsieve.toml` in the repository root
//! 4. `<config dir>/diffsieve/config.toml` (global defaults)
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{
    CONFIG_DIR, CONFIG_FILENAME, ENV_API_KEY, ENV_BASE_URL, ENV_MAX_RETRIES, ENV_MODEL,
    ENV_PROVIDER, ENV_SEMGREP,
};
use crate::context::DEFAULT_FETCH_CONCURRENCY;
use crate::env::Env;
use crate::models::{ProviderName, Severity};
use crate::sizing::SizeLimits;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub review: ReviewConfig,
    pub limits: SizeLimits,
    pub analysis: AnalysisConfig,
}

/// Language-model provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// This configuration pointed at `name` and `model`.
    ///
    /// Switching provider drops the resolved key and looks it up again for
    /// the new provider.
    pub fn with_provider(mut self, name: ProviderName, model: &str, env: &Env) -> Self {
        if self.name != name {
            self.name = name;
            self.api_key = env
                .non_empty(ENV_API_KEY)
                .or_else(|| env.non_empty(name.api_key_env_var()));
        }
        self.model = model.to_string();
        self
    }
}

/// Which stages run and how the synthesis loop retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub static_analysis: bool,
    pub intent_analysis: bool,
    pub context_extraction: bool,
    pub retry_until_issues_found: bool,
    pub max_retries: usize,
    /// Exit non-zero when an issue at or above this severity is reported.
    pub fail_on: Option<Severity>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            static_analysis: true,
            intent_analysis: true,
            context_extraction: true,
            retry_until_issues_found: true,
            max_retries: 5,
            fail_on: None,
        }
    }
}

/// Static analyzer and symbol extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub semgrep_binary: String,
    /// Extra semgrep registry rule sets, appended to the built-in ones.
    pub rulesets: Vec<String>,
    /// Directory of custom `*.yml`/`*.yaml` rule files.
    pub custom_rules_dir: Option<PathBuf>,
    pub symbols: bool,
    pub fetch_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            semgrep_binary: "semgrep".to_string(),
            rulesets: Vec::new(),
            custom_rules_dir: None,
            symbols: true,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Copy each listed field from `$other` into `$target` when it differs from `$default`.
macro_rules! merge_changed {
    ($target:expr, $other:expr, $default:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if $other.$field != $default.$field {
                $target.$field = $other.$field;
            }
        )+
    };
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads the global config, then the repository config, then applies
    /// environment variable overrides. CLI flags are applied by the caller.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "loading global config");
                config.merge(Self::load_file(&global_path)?);
            }
        }

        if let Some(root) = repo_root {
            let local_path = root.join(CONFIG_FILENAME);
            if local_path.exists() {
                debug!(path = %local_path.display(), "loading repository config");
                config.merge(Self::load_file(&local_path)?);
            }
        }

        config.apply_env_vars(env);
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join("config.toml"))
    }

    /// Merge a later layer into this one. Values equal to the built-in
    /// default are treated as unset and do not override.
    fn merge(&mut self, other: Config) {
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        merge_changed!(
            self.review,
            other.review,
            ReviewConfig::default(),
            [
                static_analysis,
                intent_analysis,
                context_extraction,
                retry_until_issues_found,
                max_retries,
                fail_on,
            ]
        );

        merge_changed!(
            self.limits,
            other.limits,
            SizeLimits::default(),
            [
                max_files_for_full_analysis,
                max_files_for_symbol_extraction,
                max_files_for_file_content,
                max_files_absolute,
                max_diff_size,
                max_file_content_size,
                max_total_content_size,
                max_context_prompt_size,
                max_symbol_table_size,
                max_lines_changed,
                max_lines_per_file,
                max_related_files,
                max_related_file_size,
                max_diff_imported_files,
                max_diff_imported_file_size,
                semgrep_timeout_secs,
                symbol_extraction_timeout_secs,
                llm_timeout_secs,
            ]
        );

        merge_changed!(
            self.analysis,
            other.analysis,
            AnalysisConfig::default(),
            [semgrep_binary, rulesets, custom_rules_dir, symbols, fetch_concurrency]
        );
    }

    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.non_empty(ENV_PROVIDER) {
            match val.parse::<ProviderName>() {
                Ok(name) => self.provider.name = name,
                Err(_) => warn!(value = %val, "ignoring invalid {ENV_PROVIDER}"),
            }
        }
        if let Some(val) = env.non_empty(ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.non_empty(ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        let api_key = env
            .non_empty(ENV_API_KEY)
            .or_else(|| env.non_empty(self.provider.name.api_key_env_var()));
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.non_empty(ENV_MAX_RETRIES) {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.review.max_retries = n,
                _ => warn!(value = %val, "ignoring invalid {ENV_MAX_RETRIES}"),
            }
        }
        if let Some(val) = env.non_empty(ENV_SEMGREP) {
            self.analysis.semgrep_binary = val;
        }
    }
}

//! Config paths and environment variable names.

/// Repository-local config file.
pub const CONFIG_FILENAME: &str = ".diffsieve.toml";

/// Directory under the platform config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "diffsieve";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "DIFFSIEVE_PROVIDER";
pub const ENV_MODEL: &str = "DIFFSIEVE_MODEL";
pub const ENV_API_KEY: &str = "DIFFSIEVE_API_KEY";
pub const ENV_BASE_URL: &str = "DIFFSIEVE_BASE_URL";
pub const ENV_MAX_RETRIES: &str = "DIFFSIEVE_MAX_RETRIES";
pub const ENV_SEMGREP: &str = "DIFFSIEVE_SEMGREP";

//! Default configuration values

use super::types::Config;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "squish.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "squish.yaml";

/// Default per-asset transform timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 100_000;

/// Pattern matching every asset name
pub const DEFAULT_MATCH_PATTERN: &str = ".*";

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".squish/cache";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".squish.toml",
        ".squish.yaml",
    ]
}

/// Render the default configuration as TOML
pub fn default_config_toml() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_default()
}

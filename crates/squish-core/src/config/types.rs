//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::{DEFAULT_MATCH_PATTERN, DEFAULT_TIMEOUT_MS};

/// Main configuration for squish
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which assets to transform
    pub test: TestOption,

    /// Assets must be strictly larger than this many bytes
    pub min_file_size: u64,

    /// Assets must be at most this many bytes (unbounded when absent)
    pub max_file_size: Option<u64>,

    /// Directory for the content-addressable cache (disabled when absent)
    pub cache_folder: Option<PathBuf>,

    /// Keep the original when the transformed output is larger
    pub only_use_if_smaller: bool,

    /// Per-asset transform timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum number of transforms in flight (host parallelism when absent)
    pub concurrency_limit: Option<usize>,

    /// Skip the pipeline entirely
    pub disable: bool,

    /// Shell command used to transform an asset (stdin to stdout)
    pub command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test: TestOption::default(),
            min_file_size: 0,
            max_file_size: None,
            cache_folder: None,
            only_use_if_smaller: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency_limit: None,
            disable: false,
            command: None,
        }
    }
}

impl Config {
    /// Effective concurrency limit
    pub fn concurrency(&self) -> usize {
        self.concurrency_limit.unwrap_or_else(num_cpus)
    }

    /// Transform timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// A single match rule as written in a config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchRule {
    /// Glob string, e.g. `"**/*.png"`
    Glob(String),
    /// Regular expression, written as `{ regex = "\\.jpe?g$" }`
    Regex { regex: String },
}

/// One rule or a list of rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestOption {
    One(MatchRule),
    Many(Vec<MatchRule>),
}

impl TestOption {
    /// Normalize to a list of rules
    pub fn rules(&self) -> Vec<MatchRule> {
        match self {
            Self::One(rule) => vec![rule.clone()],
            Self::Many(rules) => rules.clone(),
        }
    }
}

impl Default for TestOption {
    fn default() -> Self {
        Self::One(MatchRule::Regex {
            regex: DEFAULT_MATCH_PATTERN.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_file_size, 0);
        assert!(config.max_file_size.is_none());
        assert!(config.cache_folder.is_none());
        assert_eq!(config.timeout(), Duration::from_millis(100_000));
        assert!(config.concurrency() >= 1);
        assert_eq!(config.test.rules().len(), 1);
    }

    #[test]
    fn test_single_glob_rule() {
        let config: Config = toml::from_str("test = \"**/*.png\"").unwrap();
        assert_eq!(
            config.test.rules(),
            vec![MatchRule::Glob("**/*.png".to_string())]
        );
    }

    #[test]
    fn test_mixed_rule_list() {
        let config: Config = toml::from_str(
            "test = [\"*.png\", { regex = \"\\\\.jpe?g$\" }]\nmin_file_size = 10\n",
        )
        .unwrap();
        let rules = config.test.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[1],
            MatchRule::Regex {
                regex: "\\.jpe?g$".to_string()
            }
        );
        assert_eq!(config.min_file_size, 10);
    }

    #[test]
    fn test_rejects_unknown_rule_shape() {
        let result: std::result::Result<Config, _> = toml::from_str("test = 42");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_concurrency() {
        let config = Config {
            concurrency_limit: Some(3),
            ..Default::default()
        };
        assert_eq!(config.concurrency(), 3);
    }
}

//! Cache management command

use std::path::Path;
use std::time::Duration;

use clap::{Args, Subcommand};
use console::style;

use squish_core::config::{load_config_or_default, DEFAULT_CACHE_DIR};
use squish_pipeline::FsCacheStore;

use super::config_root;
use crate::cli::{Cli, OutputFormat};

/// Transform cache management
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove old cache entries
    Prune(CachePruneCommand),
    /// Show cache statistics
    Status(CacheStatusCommand),
    /// Clear all cached entries
    Clean(CacheCleanCommand),
}

/// Prune old cache entries
#[derive(Debug, Args)]
pub struct CachePruneCommand {
    /// Maximum age in days
    #[arg(long, default_value = "7")]
    pub max_age_days: u64,
}

/// Show cache statistics
#[derive(Debug, Args)]
pub struct CacheStatusCommand;

/// Clear all cached entries
#[derive(Debug, Args)]
pub struct CacheCleanCommand {
    /// Skip confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl CacheCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let cache = configured_cache(&cwd)?;

        match &self.action {
            CacheAction::Prune(cmd) => cmd.execute(cli, &cache),
            CacheAction::Status(cmd) => cmd.execute(cli, &cache),
            CacheAction::Clean(cmd) => cmd.execute(cli, &cache),
        }
    }
}

/// The cache folder from configuration, or the default one, resolved
/// against the config file's directory
fn configured_cache(cwd: &Path) -> anyhow::Result<FsCacheStore> {
    let (config, config_path) = load_config_or_default(cwd)?;
    let root = config_root(config_path.as_deref(), cwd);
    let dir = config
        .cache_folder
        .unwrap_or_else(|| DEFAULT_CACHE_DIR.into());
    Ok(FsCacheStore::new(root.join(dir)))
}

impl CachePruneCommand {
    fn execute(&self, cli: &Cli, cache: &FsCacheStore) -> anyhow::Result<()> {
        let max_age = Duration::from_secs(self.max_age_days * 24 * 60 * 60);

        if !cli.quiet && cli.format == OutputFormat::Text {
            println!(
                "{} Pruning cache entries older than {} days...",
                style("→").blue(),
                self.max_age_days
            );
        }

        let stats = cache.prune(max_age)?;

        if cli.format == OutputFormat::Json {
            let result = serde_json::json!({
                "total": stats.total,
                "removed": stats.removed,
                "kept": stats.kept,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if !cli.quiet {
            println!(
                "  {} Removed {} of {} entries ({} kept)",
                style("✓").green(),
                stats.removed,
                stats.total,
                stats.kept
            );
        }

        Ok(())
    }
}

impl CacheStatusCommand {
    fn execute(&self, cli: &Cli, cache: &FsCacheStore) -> anyhow::Result<()> {
        let stats = cache.status()?;

        if cli.format == OutputFormat::Json {
            let result = serde_json::json!({
                "entries": stats.entries,
                "total_size": stats.total_size,
                "total_size_formatted": stats.formatted_size(),
                "cache_dir": cache.cache_dir().display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if !cli.quiet {
            println!("{}", style("Transform Cache Status").bold());
            println!();
            println!("  Location: {}", style(cache.cache_dir().display()).cyan());
            println!("  Entries:  {}", stats.entries);
            println!("  Size:     {}", style(stats.formatted_size()).yellow());
        }

        Ok(())
    }
}

impl CacheCleanCommand {
    fn execute(&self, cli: &Cli, cache: &FsCacheStore) -> anyhow::Result<()> {
        let cache_dir = cache.cache_dir();

        if !cache_dir.exists() {
            if !cli.quiet {
                println!("{} Cache directory does not exist.", style("✓").green());
            }
            return Ok(());
        }

        if !self.yes {
            let confirmed = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "Remove all cached entries at {}?",
                    cache_dir.display()
                ))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        cache.clear()?;

        if !cli.quiet {
            println!(
                "{} Cache cleared at {}",
                style("✓").green(),
                style(cache_dir.display()).cyan()
            );
        }

        Ok(())
    }
}

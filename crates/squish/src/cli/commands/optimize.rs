//! Optimize command - run files through the transform pipeline in place

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::{debug, info};
use walkdir::WalkDir;

use squish_core::config::{
    config_file_names, load_config_or_default, Config, DEFAULT_CACHE_DIR,
};
use squish_core::{Asset, Buffer};
use squish_pipeline::cache::format_size;
use squish_pipeline::{
    CommandTransform, Pipeline, PipelineEvent, PipelineReporter, RunSummary, TracingReporter,
};

use super::config_root;
use crate::cli::{output, Cli, OutputFormat};

/// Run matching files through the transform and write results back
#[derive(Debug, Args)]
pub struct OptimizeCommand {
    /// Files or directories to optimize
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Shell command that reads a file on stdin and writes the result to stdout
    #[arg(long)]
    pub command: Option<String>,

    /// Maximum concurrent transforms
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-file transform timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Cache directory
    #[arg(long, conflicts_with = "no_cache")]
    pub cache_dir: Option<PathBuf>,

    /// Disable the transform cache
    #[arg(long)]
    pub no_cache: bool,

    /// Keep the original when the result is larger
    #[arg(long)]
    pub only_smaller: bool,

    /// Transform but do not write files back
    #[arg(long)]
    pub dry_run: bool,
}

/// A file loaded from disk
struct SourceFile {
    path: PathBuf,
    original: Buffer,
}

impl OptimizeCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.run(cli, &cwd))
    }

    async fn run(&self, cli: &Cli, cwd: &Path) -> anyhow::Result<()> {
        let (mut config, config_path) = load_config_or_default(cwd)?;
        if let Some(path) = &config_path {
            debug!(path = %path.display(), "using config file");
        }
        let root = config_root(config_path.as_deref(), cwd);
        self.apply_overrides(&mut config, cwd, &root);

        let command = config.command.clone().context(
            "No transform command configured. Pass --command or set `command` in squish.toml",
        )?;

        // Never treat squish's own files as assets
        let mut skip: Vec<PathBuf> = config_file_names()
            .into_iter()
            .flat_map(|name| [root.join(name), cwd.join(name)])
            .collect();
        skip.extend(config_path);
        skip.extend(config.cache_folder.clone());

        let (sources, mut assets) = collect_assets(cwd, &self.paths, &skip)?;
        info!(files = assets.len(), command = %command, "collected assets");

        let reporter: Arc<dyn PipelineReporter> = if cli.quiet || cli.format == OutputFormat::Json
        {
            Arc::new(TracingReporter)
        } else {
            Arc::new(ConsoleReporter::new(cli.verbose))
        };

        let pipeline = Pipeline::from_config(
            &config,
            Arc::new(CommandTransform::new(command)),
            reporter,
        )?;

        if !cli.quiet && cli.format == OutputFormat::Text {
            output::info(&format!(
                "Optimizing {} file{}",
                assets.len(),
                if assets.len() == 1 { "" } else { "s" }
            ));
        }

        let summary = pipeline.run(&mut assets).await?;

        let mut written = Vec::new();
        for (source, asset) in sources.iter().zip(&assets) {
            if source.original == asset.content {
                continue;
            }
            if !self.dry_run {
                tokio::fs::write(&source.path, &asset.content)
                    .await
                    .with_context(|| format!("Failed to write {}", source.path.display()))?;
            }
            written.push(asset);
        }

        if cli.format == OutputFormat::Json {
            let result = serde_json::json!({
                "total": summary.total,
                "matched": summary.matched,
                "changed": summary.changed,
                "bytes_before": summary.bytes_before,
                "bytes_after": summary.bytes_after,
                "bytes_saved": summary.bytes_saved(),
                "duration_ms": summary.duration.as_millis(),
                "dry_run": self.dry_run,
                "files": written.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if !cli.quiet {
            print_summary(&summary, self.dry_run);
        }

        Ok(())
    }

    /// Layer command-line flags over the loaded configuration.
    ///
    /// `--cache-dir` is relative to `cwd`; a configured or default cache
    /// folder is relative to `root`, the config file's directory.
    fn apply_overrides(&self, config: &mut Config, cwd: &Path, root: &Path) {
        if let Some(command) = &self.command {
            config.command = Some(command.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = Some(concurrency);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if self.only_smaller {
            config.only_use_if_smaller = true;
        }

        config.cache_folder = if self.no_cache {
            None
        } else {
            match &self.cache_dir {
                Some(dir) => Some(cwd.join(dir)),
                None => {
                    let dir = config
                        .cache_folder
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CACHE_DIR.into());
                    Some(root.join(dir))
                }
            }
        };
    }
}

/// Load every file under `paths` as an asset named by its '/'-separated
/// path relative to `root`. `.git` and every path in `skip` are left out.
fn collect_assets(
    root: &Path,
    paths: &[PathBuf],
    skip: &[PathBuf],
) -> anyhow::Result<(Vec<SourceFile>, Vec<Asset>)> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut assets = Vec::new();

    for path in paths {
        let start = root.join(path);
        if !start.exists() {
            anyhow::bail!("Path does not exist: {}", start.display());
        }

        let walker = WalkDir::new(&start).sort_by_file_name().into_iter();
        for entry in walker.filter_entry(|e| {
            e.file_name() != ".git" && !skip.iter().any(|path| e.path() == path)
        }) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = asset_name(root, &start, entry.path());
            if !seen.insert(name.clone()) {
                continue;
            }

            let content: Buffer = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?
                .into();

            sources.push(SourceFile {
                path: entry.path().to_path_buf(),
                original: content.clone(),
            });
            assets.push(Asset::new(name, content));
        }
    }

    Ok((sources, assets))
}

fn asset_name(root: &Path, start: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .or_else(|_| path.strip_prefix(start))
        .unwrap_or(path);

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!();
    output::success(&format!(
        "{}/{} matched files changed, {} → {} (saved {}) in {:.1}s",
        summary.changed,
        summary.matched,
        format_size(summary.bytes_before),
        format_size(summary.bytes_after),
        style(format_size(summary.bytes_saved())).green(),
        summary.duration.as_secs_f64()
    ));

    if dry_run {
        println!("{}", style("[DRY RUN - no files were written]").yellow().bold());
    }
}

/// Console reporter with per-file lines
struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl PipelineReporter for ConsoleReporter {
    fn report(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                total,
                matched,
                concurrency,
            } => {
                if self.verbose {
                    println!(
                        "  {} {} of {} files match ({} at a time)",
                        style("─").dim(),
                        matched,
                        total,
                        concurrency
                    );
                }
            }
            PipelineEvent::CacheHit { name, .. } => {
                if self.verbose {
                    println!(
                        "  {} {} {}",
                        style("✓").green(),
                        style(name).green(),
                        style("(cached)").cyan()
                    );
                }
            }
            PipelineEvent::CacheMiss { .. } => {}
            PipelineEvent::CacheReadFailed { name, error, .. }
            | PipelineEvent::CacheWriteFailed { name, error, .. } => {
                output::warning(&format!("cache unavailable for {}: {}", name, error));
            }
            PipelineEvent::Transformed {
                name,
                original_size,
                new_size,
                duration,
            } => {
                println!(
                    "  {} {} {} → {} {}",
                    style("✓").green(),
                    style(name).green(),
                    format_size(*original_size as u64),
                    format_size(*new_size as u64),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            PipelineEvent::ResultDiscarded {
                name,
                original_size,
                new_size,
            } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(name).yellow(),
                    style(format!(
                        "(result {} larger than {}, kept original)",
                        format_size(*new_size as u64),
                        format_size(*original_size as u64)
                    ))
                    .dim()
                );
            }
            PipelineEvent::TransformFailed { name, error } => {
                println!(
                    "  {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(error).red().dim()
                );
            }
            PipelineEvent::TransformTimedOut { name, timeout } => {
                println!(
                    "  {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(format!("timed out after {:.1}s", timeout.as_secs_f64()))
                        .red()
                        .dim()
                );
            }
            PipelineEvent::RunCompleted { .. } => {}
        }
    }
}

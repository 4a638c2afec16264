//! Pipeline orchestration: select, cache-or-compute, schedule, replace

use std::sync::Arc;
use std::time::{Duration, Instant};

use squish_core::config::{validate_config, Config};
use squish_core::Asset;
use tracing::{debug, info};

use crate::cache::AssetCache;
use crate::error::{PipelineError, Result};
use crate::guard::GuardedTransform;
use crate::matcher::{MatchSpec, Predicate};
use crate::reporter::{PipelineEvent, PipelineReporter};
use crate::scheduler::BoundedScheduler;
use crate::transform::Transform;

/// Outcome of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Assets handed to the run
    pub total: usize,
    /// Assets accepted by the predicate
    pub matched: usize,
    /// Matched assets whose content changed
    pub changed: usize,
    /// Combined size of matched assets before the run
    pub bytes_before: u64,
    /// Combined size of matched assets after the run
    pub bytes_after: u64,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Bytes saved across matched assets (zero if they grew)
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Transforms the matching assets of a batch, at most `limit` at a time
pub struct Pipeline {
    predicate: Predicate,
    cache: AssetCache,
    scheduler: BoundedScheduler,
    guard: GuardedTransform,
    reporter: Arc<dyn PipelineReporter>,
    disabled: bool,
}

impl Pipeline {
    /// Assemble a pipeline from its parts
    pub fn new(
        predicate: Predicate,
        cache: AssetCache,
        scheduler: BoundedScheduler,
        guard: GuardedTransform,
        reporter: Arc<dyn PipelineReporter>,
    ) -> Self {
        Self {
            predicate,
            cache,
            scheduler,
            guard,
            reporter,
            disabled: false,
        }
    }

    /// Build a pipeline from configuration.
    ///
    /// Fails on invalid configuration, match rules or concurrency limit, so
    /// setup errors surface before any asset is touched.
    pub fn from_config(
        config: &Config,
        transform: Arc<dyn Transform>,
        reporter: Arc<dyn PipelineReporter>,
    ) -> Result<Self> {
        validate_config(config)?;

        let spec = MatchSpec::from_config(&config.test)?;
        let predicate = Predicate::compile(spec, config.min_file_size, config.max_file_size)?;
        let cache = AssetCache::from_dir(config.cache_folder.as_deref(), reporter.clone());
        let scheduler = BoundedScheduler::new(config.concurrency())?;
        let guard = GuardedTransform::new(transform, config.timeout(), reporter.clone())
            .only_use_if_smaller(config.only_use_if_smaller);

        debug!(
            concurrency = scheduler.limit(),
            cache = cache.is_enabled(),
            timeout_ms = config.timeout_ms,
            "pipeline configured"
        );

        Ok(Self::new(predicate, cache, scheduler, guard, reporter).disabled(config.disable))
    }

    /// Turn the pipeline into a no-op
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Transform every matching asset and replace its content.
    ///
    /// Unmatched assets are untouched. A failing or slow transform leaves
    /// that asset's original content in place without affecting the rest.
    pub async fn run(&self, assets: &mut [Asset]) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary {
            total: assets.len(),
            ..Default::default()
        };

        if self.disabled {
            info!("pipeline disabled, leaving assets untouched");
            return Ok(summary);
        }

        let matched: Vec<usize> = assets
            .iter()
            .enumerate()
            .filter(|(_, asset)| self.predicate.matches(&asset.name, asset.len()))
            .map(|(index, _)| index)
            .collect();
        summary.matched = matched.len();

        self.reporter.report(&PipelineEvent::RunStarted {
            total: summary.total,
            matched: summary.matched,
            concurrency: self.scheduler.limit(),
        });

        let tasks: Vec<_> = matched
            .iter()
            .map(|&index| {
                let name = assets[index].name.clone();
                let content = assets[index].content.clone();
                let cache = self.cache.clone();
                let guard = self.guard.clone();
                async move {
                    let result = cache
                        .fetch_or_compute(&name, &content, || guard.apply(&name, content.clone()))
                        .await;
                    Ok::<_, PipelineError>(result)
                }
            })
            .collect();

        let results = self.scheduler.run_all(tasks).await?;

        for (&index, result) in matched.iter().zip(results) {
            let asset = &mut assets[index];
            summary.bytes_before += asset.len();
            summary.bytes_after += result.len() as u64;
            if asset.content != result {
                summary.changed += 1;
            }
            asset.content = result;
        }

        summary.duration = start.elapsed();
        self.reporter.report(&PipelineEvent::RunCompleted {
            matched: summary.matched,
            changed: summary.changed,
            bytes_before: summary.bytes_before,
            bytes_after: summary.bytes_after,
            duration: summary.duration,
        });

        Ok(summary)
    }
}

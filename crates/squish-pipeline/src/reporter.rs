//! Pipeline event reporting

use std::sync::Mutex;
use std::time::Duration;

use crate::cache::CacheKey;

/// Events emitted while a pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A run is starting
    RunStarted {
        total: usize,
        matched: usize,
        concurrency: usize,
    },
    /// A cached result was reused
    CacheHit { name: String, key: CacheKey },
    /// No usable cache entry, the transform will run
    CacheMiss { name: String, key: CacheKey },
    /// An entry existed but could not be read
    CacheReadFailed {
        name: String,
        key: CacheKey,
        error: String,
    },
    /// A computed result could not be persisted
    CacheWriteFailed {
        name: String,
        key: CacheKey,
        error: String,
    },
    /// The transform produced a result that was kept
    Transformed {
        name: String,
        original_size: usize,
        new_size: usize,
        duration: Duration,
    },
    /// The transform produced a larger result and the original was kept
    ResultDiscarded {
        name: String,
        original_size: usize,
        new_size: usize,
    },
    /// The transform failed and the original was kept
    TransformFailed { name: String, error: String },
    /// The transform did not finish in time and the original was kept
    TransformTimedOut { name: String, timeout: Duration },
    /// All matched assets resolved
    RunCompleted {
        matched: usize,
        changed: usize,
        bytes_before: u64,
        bytes_after: u64,
        duration: Duration,
    },
}

/// Sink for pipeline events
pub trait PipelineReporter: Send + Sync {
    /// Handle a pipeline event
    fn report(&self, event: &PipelineEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                total,
                matched,
                concurrency,
            } => {
                tracing::info!(total, matched, concurrency, "starting asset pipeline");
            }
            PipelineEvent::CacheHit { name, key } => {
                tracing::debug!(asset = %name, key = %key, "cache hit");
            }
            PipelineEvent::CacheMiss { name, key } => {
                tracing::debug!(asset = %name, key = %key, "cache miss");
            }
            PipelineEvent::CacheReadFailed { name, key, error } => {
                tracing::warn!(asset = %name, key = %key, error = %error, "cache read failed, recomputing");
            }
            PipelineEvent::CacheWriteFailed { name, key, error } => {
                tracing::warn!(asset = %name, key = %key, error = %error, "cache write failed");
            }
            PipelineEvent::Transformed {
                name,
                original_size,
                new_size,
                duration,
            } => {
                tracing::info!(
                    "{}: {} -> {} bytes in {:.1}s",
                    name,
                    original_size,
                    new_size,
                    duration.as_secs_f64()
                );
            }
            PipelineEvent::ResultDiscarded {
                name,
                original_size,
                new_size,
            } => {
                tracing::info!(
                    "{}: keeping original ({} bytes), result grew to {} bytes",
                    name,
                    original_size,
                    new_size
                );
            }
            PipelineEvent::TransformFailed { name, error } => {
                tracing::error!("{} failed to transform: {}", name, error);
            }
            PipelineEvent::TransformTimedOut { name, timeout } => {
                tracing::warn!("{} timed out after {}ms", name, timeout.as_millis());
            }
            PipelineEvent::RunCompleted {
                matched,
                changed,
                bytes_before,
                bytes_after,
                duration,
            } => {
                tracing::info!(
                    "Pipeline complete: {}/{} assets changed, {} -> {} bytes ({:.1}s)",
                    changed,
                    matched,
                    bytes_before,
                    bytes_after,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl PipelineReporter for CollectingReporter {
    fn report(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        let key = CacheKey::for_content(b"abc");

        reporter.report(&PipelineEvent::CacheMiss {
            name: "a.png".to_string(),
            key: key.clone(),
        });
        reporter.report(&PipelineEvent::CacheHit {
            name: "a.png".to_string(),
            key,
        });

        assert_eq!(reporter.events().len(), 2);
        assert_eq!(
            reporter.count(|e| matches!(e, PipelineEvent::CacheHit { .. })),
            1
        );
    }

    #[test]
    fn test_tracing_reporter() {
        let reporter = TracingReporter;

        // Just verify it doesn't panic
        reporter.report(&PipelineEvent::TransformTimedOut {
            name: "big.png".to_string(),
            timeout: Duration::from_millis(50),
        });
        reporter.report(&PipelineEvent::RunCompleted {
            matched: 1,
            changed: 0,
            bytes_before: 10,
            bytes_after: 10,
            duration: Duration::from_secs(1),
        });
    }
}

//! Guarded transform invocation: timeout, error and size fallbacks

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use squish_core::Buffer;
use tokio::time::Instant;

use crate::reporter::{PipelineEvent, PipelineReporter};
use crate::transform::Transform;

/// Wraps a [`Transform`] so that invoking it always yields a buffer.
///
/// The transform runs as its own task and races a timer. Whichever finishes
/// first decides the result; on timeout the task is aborted and its late
/// output, if any, is never observed. Errors, panics and timeouts all
/// resolve to the original content.
#[derive(Clone)]
pub struct GuardedTransform {
    transform: Arc<dyn Transform>,
    timeout: Duration,
    only_use_if_smaller: bool,
    reporter: Arc<dyn PipelineReporter>,
}

impl GuardedTransform {
    /// Guard `transform` with a timeout
    pub fn new(
        transform: Arc<dyn Transform>,
        timeout: Duration,
        reporter: Arc<dyn PipelineReporter>,
    ) -> Self {
        Self {
            transform,
            timeout,
            only_use_if_smaller: false,
            reporter,
        }
    }

    /// Keep the original when the result is larger (equal size keeps the result)
    pub fn only_use_if_smaller(mut self, enabled: bool) -> Self {
        self.only_use_if_smaller = enabled;
        self
    }

    /// Transform `content`, falling back to it on any failure
    pub async fn apply(&self, name: &str, content: Buffer) -> Buffer {
        let start = Instant::now();
        let transform = self.transform.clone();
        let task_name = name.to_string();
        let input = content.clone();
        let mut handle =
            tokio::spawn(async move { transform.transform(&task_name, input).await });

        let joined = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                self.reporter.report(&PipelineEvent::TransformTimedOut {
                    name: name.to_string(),
                    timeout: self.timeout,
                });
                return content;
            }
        };

        let output = match joined {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.reporter.report(&PipelineEvent::TransformFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                return content;
            }
            Err(e) => {
                self.reporter.report(&PipelineEvent::TransformFailed {
                    name: name.to_string(),
                    error: format!("transform panicked: {}", e),
                });
                return content;
            }
        };

        if self.only_use_if_smaller && output.len() > content.len() {
            self.reporter.report(&PipelineEvent::ResultDiscarded {
                name: name.to_string(),
                original_size: content.len(),
                new_size: output.len(),
            });
            return content;
        }

        self.reporter.report(&PipelineEvent::Transformed {
            name: name.to_string(),
            original_size: content.len(),
            new_size: output.len(),
            duration: start.elapsed(),
        });
        Buffer::from(output)
    }
}

impl fmt::Debug for GuardedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedTransform")
            .field("transform", &self.transform.id())
            .field("timeout", &self.timeout)
            .field("only_use_if_smaller", &self.only_use_if_smaller)
            .finish()
    }
}

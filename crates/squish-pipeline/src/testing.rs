//! Transforms used across the crate's tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use squish_core::Buffer;

use crate::transform::{Transform, TransformError};

/// Applies a synchronous function to the input
pub(crate) struct MapTransform<F>(F);

impl<F> MapTransform<F>
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    pub(crate) fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Transform for MapTransform<F>
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn id(&self) -> &str {
        "map"
    }

    async fn transform(&self, _name: &str, input: Buffer) -> Result<Vec<u8>, TransformError> {
        Ok((self.0)(&input))
    }
}

/// Always fails
pub(crate) struct FailingTransform;

#[async_trait]
impl Transform for FailingTransform {
    fn id(&self) -> &str {
        "failing"
    }

    async fn transform(&self, _name: &str, _input: Buffer) -> Result<Vec<u8>, TransformError> {
        Err(TransformError::failed("corrupt image"))
    }
}

/// Never resolves
pub(crate) struct HangingTransform;

#[async_trait]
impl Transform for HangingTransform {
    fn id(&self) -> &str {
        "hanging"
    }

    async fn transform(&self, _name: &str, _input: Buffer) -> Result<Vec<u8>, TransformError> {
        std::future::pending().await
    }
}

/// Sleeps, then returns an empty buffer and flags completion
pub(crate) struct SlowTransform {
    delay: Duration,
    pub(crate) finished: Arc<AtomicBool>,
}

impl SlowTransform {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Transform for SlowTransform {
    fn id(&self) -> &str {
        "slow"
    }

    async fn transform(&self, _name: &str, _input: Buffer) -> Result<Vec<u8>, TransformError> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Halves its input while tracking calls and concurrency
#[derive(Default)]
pub(crate) struct CountingTransform {
    pub(crate) calls: Arc<std::sync::atomic::AtomicUsize>,
    pub(crate) in_flight: Arc<std::sync::atomic::AtomicUsize>,
    pub(crate) peak: Arc<std::sync::atomic::AtomicUsize>,
    pub(crate) fail_on: Option<&'static str>,
}

#[async_trait]
impl Transform for CountingTransform {
    fn id(&self) -> &str {
        "counting"
    }

    async fn transform(&self, name: &str, input: Buffer) -> Result<Vec<u8>, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_on.is_some_and(|needle| name.contains(needle)) {
            return Err(TransformError::failed(format!("cannot decode {}", name)));
        }
        Ok(input[..input.len() / 2].to_vec())
    }
}

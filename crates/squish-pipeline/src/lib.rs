//! Squish Pipeline - cache-and-schedule engine for asset transforms
//!
//! This crate selects assets with a compiled [`Predicate`], runs each
//! selected asset through a [`GuardedTransform`] under a
//! [`BoundedScheduler`], and memoizes results in a content-addressable
//! [`AssetCache`].

pub mod cache;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod pipeline;
pub mod reporter;
pub mod scheduler;
pub mod transform;

#[cfg(test)]
mod testing;

pub use cache::{AssetCache, CacheError, CacheKey, CacheStore, FsCacheStore, MemoryCacheStore};
pub use error::PipelineError;
pub use guard::GuardedTransform;
pub use matcher::{InvalidSpecError, MatchSpec, Predicate};
pub use pipeline::{Pipeline, RunSummary};
pub use reporter::{CollectingReporter, PipelineEvent, PipelineReporter, TracingReporter};
pub use scheduler::{BoundedScheduler, SchedulerError};
pub use transform::{CommandTransform, Transform, TransformError};

//! Squish Core - shared types and configuration
//!
//! This crate provides the asset model, error types, and configuration
//! loading used by the squish pipeline and CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, MatchRule, TestOption};
pub use error::{ConfigError, Result};
pub use types::{Asset, Buffer};

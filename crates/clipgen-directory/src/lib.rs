//! Camera directory client for the clip generator.
//!
//! This crate provides:
//! - Camera alias resolution
//! - Recording lookups for a time window
//! - Clip metadata publication (idempotent upsert by clip id)
//! - Retry with exponential backoff and request metrics

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;

pub use client::{CameraDirectory, DirectoryClient, DirectoryConfig};
pub use error::{DirectoryError, DirectoryResult};
pub use retry::RetryConfig;

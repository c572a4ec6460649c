//! S3 asset store for the clip generator.
//!
//! This crate provides:
//! - Streaming recording downloads from the origin bucket
//! - Clip and thumbnail uploads to the destination bucket
//! - The [`AssetStore`] seam used by clip assembly

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::{content_type_for, destination_key, origin_key, AssetStore};

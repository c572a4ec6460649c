//! Redis Streams request queue for the clip generator.
//!
//! This crate provides:
//! - Request intake via a Redis Stream and consumer group
//! - Delayed retries through a due-time sorted set
//! - Redelivery of stalled entries and a dead-letter stream
//! - Clip status notifications via Redis Pub/Sub

pub mod error;
pub mod message;
pub mod notify;
pub mod publish;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use message::{DelayedRequest, QueuedRequest};
pub use notify::NotificationChannel;
pub use publish::{Notifier, RetryPublisher};
pub use queue::{QueueConfig, RequestQueue};

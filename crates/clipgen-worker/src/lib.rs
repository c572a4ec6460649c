//! Clip generation worker.
//!
//! Consumes clip requests, assembles the requested window from recorded
//! segments, publishes the result, and re-enqueues requests whose footage
//! has not arrived yet.

pub mod assembler;
pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod orchestrator;

pub use assembler::{AssembledClip, ClipAssembler, Thumbnails};
pub use config::WorkerConfig;
pub use error::{AssemblyError, WorkerError, WorkerResult};
pub use executor::RequestExecutor;
pub use lifecycle::{RetryDecision, RetryPolicy};
pub use logging::ClipLogger;
pub use orchestrator::{ClipOrchestrator, Collaborators};

//! Worker error types.

use thiserror::Error;

use clipgen_media::MediaError;
use clipgen_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// A failure while building the clip artifact.
///
/// Always fatal for the current attempt; redelivery is left to the queue.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No trim plans to assemble")]
    NoPlans,

    #[error("Segment {segment_id} could not be downloaded: {source}")]
    Download {
        segment_id: String,
        #[source]
        source: StorageError,
    },

    #[error("Segment {segment_id} could not be trimmed: {source}")]
    Trim {
        segment_id: String,
        #[source]
        source: MediaError,
    },

    #[error("Concatenation failed: {source}")]
    Concat {
        #[source]
        source: MediaError,
    },
}

impl AssemblyError {
    /// Segment the failure is attributed to, if any.
    pub fn segment_id(&self) -> Option<&str> {
        match self {
            AssemblyError::Download { segment_id, .. } | AssemblyError::Trim { segment_id, .. } => {
                Some(segment_id)
            }
            AssemblyError::NoPlans | AssemblyError::Concat { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Rejected request: {0}")]
    Request(#[from] clipgen_models::ModelError),

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Directory error: {0}")]
    Directory(#[from] clipgen_directory::DirectoryError),

    #[error("Queue error: {0}")]
    Queue(#[from] clipgen_queue::QueueError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the request itself is unusable. Such requests are dropped
    /// instead of redelivered.
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, WorkerError::Request(_))
    }
}

//! Queue entry types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};

/// Stream field holding the raw request body.
pub const BODY_FIELD: &str = "body";

/// Stream field holding the enqueue time in epoch milliseconds.
pub const SENT_TS_FIELD: &str = "sent_ts";

/// A request read from the stream, still unparsed.
///
/// The body is kept raw so that a malformed payload surfaces as a
/// rejected request rather than a queue error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    /// Stream entry id
    pub message_id: String,
    /// Raw JSON request body
    pub body: String,
    /// Enqueue time, epoch milliseconds as sent on the wire
    pub sent_timestamp: String,
}

impl QueuedRequest {
    /// Build from the field map of a stream entry.
    pub fn from_fields(
        message_id: impl Into<String>,
        fields: &HashMap<String, redis::Value>,
    ) -> QueueResult<Self> {
        let message_id = message_id.into();
        let field = |name: &str| -> QueueResult<String> {
            let value = fields
                .get(name)
                .ok_or_else(|| QueueError::malformed_entry(&message_id, format!("missing {}", name)))?;
            redis::from_redis_value::<String>(value)
                .map_err(|e| QueueError::malformed_entry(&message_id, format!("{}: {}", name, e)))
        };

        Ok(Self {
            body: field(BODY_FIELD)?,
            sent_timestamp: field(SENT_TS_FIELD)?,
            message_id,
        })
    }
}

/// A re-enqueued request waiting in the delayed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedRequest {
    /// Unique member id, so identical bodies never collapse in the set
    pub id: String,
    /// Raw JSON request body
    pub body: String,
    /// Send time of the re-enqueue, epoch milliseconds
    pub sent_ts: String,
}

//! Clip generation requests.
//!
//! A request arrives as a JSON body plus the timestamp at which the
//! current attempt was enqueued. The body is loosely typed on the wire
//! (numbers may be strings, quotes may be single), so it is parsed and
//! validated once here into a [`ClipRequest`]; everything downstream
//! works with the typed struct.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::timestamp::window_duration_secs;

/// Wire body of a clip request, as re-published for retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub camera_id: String,
    pub clip_id: String,
    pub start_timestamp_in_ms: i64,
    pub end_timestamp_in_ms: i64,
    #[serde(default)]
    pub retry_timestamps: Vec<i64>,
}

/// Queue-trigger envelope carrying one or more raw request records.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records")]
    pub records: Vec<TriggerRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRecord {
    pub body: String,
    pub attributes: TriggerAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerAttributes {
    #[serde(rename = "SentTimestamp")]
    pub sent_timestamp: String,
}

/// A validated, immutable clip request.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ClipRequest {
    /// Camera the footage comes from
    #[validate(length(min = 1))]
    pub camera_id: String,
    /// Output and idempotency key
    #[validate(length(min = 1))]
    pub clip_id: String,
    /// Window start, epoch milliseconds
    pub start_timestamp_ms: i64,
    /// Window end, epoch milliseconds
    pub end_timestamp_ms: i64,
    /// Enqueue times of earlier attempts, oldest first
    pub retry_timestamps: Vec<i64>,
    /// When the current attempt was enqueued, epoch milliseconds
    pub sent_timestamp_ms: i64,
}

impl ClipRequest {
    /// Parse and validate a raw body and its enqueue timestamp.
    pub fn parse(body: &str, sent_timestamp: &str) -> ModelResult<Self> {
        let normalized = body.replace('\'', "\"");
        let value: Value = serde_json::from_str(&normalized)
            .map_err(|e| ModelError::malformed_request(format!("body is not valid JSON: {}", e)))?;
        let fields = value
            .as_object()
            .ok_or_else(|| ModelError::malformed_request("body is not a JSON object"))?;

        let retry_timestamps = match fields.get("retryTimestamps") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| integer_value(item, "retryTimestamps"))
                .collect::<ModelResult<Vec<_>>>()?,
            Some(_) => {
                return Err(ModelError::malformed_request(
                    "retryTimestamps must be an array",
                ))
            }
        };

        let sent_timestamp_ms = sent_timestamp.trim().parse::<i64>().map_err(|_| {
            ModelError::malformed_request(format!(
                "sent timestamp '{}' is not an integer",
                sent_timestamp
            ))
        })?;

        let request = Self {
            camera_id: required_string(fields, "cameraId")?,
            clip_id: required_string(fields, "clipId")?,
            start_timestamp_ms: required_integer(fields, "startTimestampInMs")?,
            end_timestamp_ms: required_integer(fields, "endTimestampInMs")?,
            retry_timestamps,
            sent_timestamp_ms,
        };
        request.check()?;
        Ok(request)
    }

    /// Parse the first record of a queue-trigger envelope.
    pub fn from_event(event: &str) -> ModelResult<Self> {
        let event: TriggerEvent = serde_json::from_str(event)
            .map_err(|e| ModelError::malformed_request(format!("ill-formatted event: {}", e)))?;
        let record = event
            .records
            .first()
            .ok_or_else(|| ModelError::malformed_request("event has no records"))?;
        Self::parse(&record.body, &record.attributes.sent_timestamp)
    }

    fn check(&self) -> ModelResult<()> {
        self.validate()
            .map_err(|e| ModelError::malformed_request(e.to_string()))?;

        if self.start_timestamp_ms > self.end_timestamp_ms {
            return Err(ModelError::malformed_request(format!(
                "window start {} is after window end {}",
                self.start_timestamp_ms, self.end_timestamp_ms
            )));
        }
        Ok(())
    }

    /// Requested window length in seconds.
    pub fn window_secs(&self) -> f64 {
        window_duration_secs(self.end_timestamp_ms, self.start_timestamp_ms)
    }

    /// Number of attempts that already ended in a re-enqueue.
    pub fn retry_count(&self) -> usize {
        self.retry_timestamps.len()
    }

    /// Time the footage availability is measured from: the first retry
    /// timestamp once retries exist, else the current enqueue time.
    pub fn reference_timestamp_ms(&self) -> i64 {
        self.retry_timestamps
            .first()
            .copied()
            .unwrap_or(self.sent_timestamp_ms)
    }

    /// Body of this request exactly as received.
    pub fn to_body(&self) -> RequestBody {
        RequestBody {
            camera_id: self.camera_id.clone(),
            clip_id: self.clip_id.clone(),
            start_timestamp_in_ms: self.start_timestamp_ms,
            end_timestamp_in_ms: self.end_timestamp_ms,
            retry_timestamps: self.retry_timestamps.clone(),
        }
    }

    /// Body of the next attempt: same request, current enqueue time
    /// appended to the retry history.
    pub fn next_attempt(&self) -> RequestBody {
        let mut body = self.to_body();
        body.retry_timestamps.push(self.sent_timestamp_ms);
        body
    }
}

fn required_string(fields: &Map<String, Value>, name: &str) -> ModelResult<String> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ModelError::malformed_request(format!("{} must be a string", name))),
        None => Err(ModelError::malformed_request(format!("missing field {}", name))),
    }
}

fn required_integer(fields: &Map<String, Value>, name: &str) -> ModelResult<i64> {
    let value = fields
        .get(name)
        .ok_or_else(|| ModelError::malformed_request(format!("missing field {}", name)))?;
    integer_value(value, name)
}

fn integer_value(value: &Value, name: &str) -> ModelResult<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ModelError::malformed_request(format!("{} is not an integer: {}", name, value))
    })
}

/// Integral floats inside the i64 range. The upper bound is `2^63`, which
/// is exclusive.
fn integral_f64(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < -(i64::MIN as f64);
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

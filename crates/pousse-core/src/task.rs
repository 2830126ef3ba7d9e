//! Task data model and identifiers

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Durable bucket a task file can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Queued or retrying, eligible for delivery.
    Waiting,
    /// Delivered and acknowledged with the expected status.
    Success,
    /// Retries exhausted, kept for operator inspection.
    Dead,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Waiting, Bucket::Success, Bucket::Dead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Waiting => "waiting",
            Bucket::Success => "success",
            Bucket::Dead => "dead",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted unit of work: one callback URL, one payload, and the retry
/// state accumulated while trying to deliver it.
///
/// Timestamps are unix nanoseconds to stay wire-compatible with existing
/// task files and callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    pub url: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// HTTP status the callback must answer with to complete the task.
    pub expected: i32,
    /// Cron expression; empty means one-shot.
    pub schedule: String,

    /// Cron-computed fire time, the reference point for the next occurrence.
    pub next_scheduled_run: i64,
    /// When the task becomes eligible for delivery. Primary ordering key.
    pub next_run: i64,
    pub tries: u32,

    pub last_run: i64,
    #[serde(with = "base64_bytes")]
    pub last_error_body: Vec<u8>,
    /// Status of the most recent failed attempt; -1 when the transport
    /// itself failed, 0 when no attempt has failed yet.
    pub last_error_status_code: i32,
}

impl Task {
    pub fn is_cron(&self) -> bool {
        !self.schedule.is_empty()
    }
}

/// JSON body POSTed to the callback for a single delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Attempt number of this delivery, starting at 1.
    pub tries: u32,
    /// Per-attempt correlation id, 6 random bytes hex-encoded.
    pub req_id: String,
}

/// Random hex id, `n` bytes wide. Ad-hoc tasks use 16 bytes, per-attempt
/// request ids use 6.
pub fn random_id(n: usize) -> String {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Deterministic id for a recurring task: the SHA-1 of
/// `url || payload || schedule`. Identical resubmissions hash to the same
/// id, which is what makes cron deduplication work.
pub fn scheduled_id(url: &str, payload: &[u8], schedule: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hasher.update(payload);
    hasher.update(schedule.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current time as unix nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

pub fn nanos_to_datetime(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

pub fn datetime_to_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Serde adapter encoding byte fields as base64 strings, the same layout
/// the original wire format uses for binary payloads.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        // `null` comes from records written before any error was recorded.
        let value: Option<String> = Option::deserialize(deserializer)?;
        match value {
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_hex_of_requested_width() {
        let id = random_id(16);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let req_id = random_id(6);
        assert_eq!(req_id.len(), 12);
    }

    #[test]
    fn scheduled_id_is_stable_and_input_sensitive() {
        let a = scheduled_id("http://x/t", b"hi", "*/5 * * * *");
        let b = scheduled_id("http://x/t", b"hi", "*/5 * * * *");
        let c = scheduled_id("http://x/t", b"hi!", "*/5 * * * *");

        assert_eq!(a.len(), 40);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn task_json_round_trips_payload_as_base64() {
        let task = Task {
            id: "abc".into(),
            url: "http://x/t".into(),
            payload: b"hello".to_vec(),
            expected: 200,
            schedule: String::new(),
            next_scheduled_run: 0,
            next_run: 42,
            tries: 0,
            last_run: 0,
            last_error_body: Vec::new(),
            last_error_status_code: 0,
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["payload"], "aGVsbG8=");

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, b"hello");
        assert_eq!(back.next_run, 42);
    }

    #[test]
    fn task_decodes_null_error_body() {
        let raw = r#"{"id":"x","url":"http://x","payload":"aGk=","expected":200,
            "schedule":"","next_scheduled_run":0,"next_run":0,"tries":0,
            "last_run":0,"last_error_body":null,"last_error_status_code":0}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert!(task.last_error_body.is_empty());
    }
}

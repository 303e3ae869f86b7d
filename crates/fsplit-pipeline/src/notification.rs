//! Inbound notification decoding.
//!
//! Accepts either a direct "Object Created" event or an SNS envelope
//! whose `Message` field carries the serialized event, modeled as an
//! explicit union of the known shapes. Anything else is rejected with
//! a value, never a panic; rejection maps to acknowledge-and-drop at
//! the endpoint.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Event kind accepted for processing.
const OBJECT_CREATED: &str = "Object Created";

/// Errors produced while decoding a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("Not an object-created event: {0}")]
    UnexpectedKind(String),

    #[error("Event contained no records")]
    EmptyBatch,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Identifies exactly one source video object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub bucket: String,
    pub key: String,
}

/// The notification shapes this service understands.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    /// SNS relay wrapper; `message` holds the serialized event.
    Sns {
        #[serde(rename = "Type")]
        kind: String,
        #[serde(rename = "Message")]
        message: String,
    },
    /// S3 native event with a record batch.
    Records {
        #[serde(rename = "Records")]
        records: Vec<S3Record>,
    },
    /// Direct EventBridge-style event.
    Direct(ObjectCreatedEvent),
}

#[derive(Debug, Deserialize)]
struct ObjectCreatedEvent {
    #[serde(rename = "detail-type")]
    detail_type: String,
    detail: EventDetail,
}

#[derive(Debug, Deserialize)]
struct EventDetail {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    key: String,
}

/// Decode a raw notification payload into a source descriptor.
///
/// Produces exactly zero or one descriptors; unrecognized shapes are
/// rejected rather than silently dropped. Batched events are reduced
/// to their first record (known limitation; a warning records the
/// dropped remainder).
pub fn decode_notification(raw: &[u8]) -> Result<SourceDescriptor, NotificationError> {
    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|e| NotificationError::Malformed(e.to_string()))?;

    match envelope {
        Envelope::Sns { kind, message } => {
            if kind != "Notification" {
                return Err(NotificationError::UnexpectedKind(kind));
            }
            let event: ObjectCreatedEvent = serde_json::from_str(&message)
                .map_err(|e| NotificationError::Malformed(e.to_string()))?;
            descriptor_from_event(event)
        }
        Envelope::Records { records } => {
            if records.len() > 1 {
                warn!(
                    "Event batched {} records; only the first is processed",
                    records.len()
                );
            }
            let record = records.into_iter().next().ok_or(NotificationError::EmptyBatch)?;
            validated(record.s3.bucket.name, record.s3.object.key)
        }
        Envelope::Direct(event) => descriptor_from_event(event),
    }
}

fn descriptor_from_event(event: ObjectCreatedEvent) -> Result<SourceDescriptor, NotificationError> {
    if event.detail_type != OBJECT_CREATED {
        return Err(NotificationError::UnexpectedKind(event.detail_type));
    }
    validated(event.detail.bucket.name, event.detail.object.key)
}

fn validated(bucket: String, key: String) -> Result<SourceDescriptor, NotificationError> {
    if bucket.is_empty() {
        return Err(NotificationError::MissingField("bucket.name"));
    }
    if key.is_empty() {
        return Err(NotificationError::MissingField("object.key"));
    }
    Ok(SourceDescriptor { bucket, key })
}

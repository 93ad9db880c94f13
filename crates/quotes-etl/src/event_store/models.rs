// Event Store Data Models

use serde::Serialize;
use serde_json::{Map, Value};

/// Key under which stream metadata is injected into each extracted event
pub const STREAM_METADATA_KEY: &str = "streamMetadata";

/// An event as read from the stream, payload still undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Event identifier
    pub id: String,

    /// Event type (e.g., "quote_created")
    pub event_type: String,

    /// Name of the stream the event was read from
    pub stream: String,

    /// Creation timestamp as reported by the store
    pub created: String,

    /// Raw payload bytes
    pub data: Vec<u8>,
}

impl RecordedEvent {
    /// Decode the payload as a JSON object
    pub fn json(&self) -> serde_json::Result<Map<String, Value>> {
        serde_json::from_slice(&self.data)
    }

    pub fn metadata(&self) -> StreamMetadata {
        StreamMetadata {
            event_id: self.id.clone(),
            event_type: self.event_type.clone(),
            event_stream: self.stream.clone(),
            event_created: self.created.clone(),
        }
    }
}

/// Metadata attached to every extracted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub event_id: String,
    pub event_type: String,
    pub event_stream: String,
    pub event_created: String,
}

impl StreamMetadata {
    /// Attach this metadata to a decoded payload, replacing any existing key
    pub fn inject(&self, payload: &mut Map<String, Value>) -> serde_json::Result<()> {
        payload.insert(STREAM_METADATA_KEY.to_string(), serde_json::to_value(self)?);
        Ok(())
    }
}

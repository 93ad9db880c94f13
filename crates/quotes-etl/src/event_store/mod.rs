// Event Store Extraction Module
//
// Consumes an event-sourcing stream as a batch and writes one JSON line per
// event, with the stream metadata injected under `streamMetadata`.
//
// - Source: `EventSource` trait, one implementation over the HTTP Atom feed
// - Extract: ordered, one-at-a-time write loop with encode-failure counting

pub mod client;
pub mod config;
pub mod extractor;
pub mod models;

pub use client::HttpEventStore;
pub use config::EventStoreConfig;
pub use extractor::{extract_events_from_stream, ExtractStats};
pub use models::{RecordedEvent, StreamMetadata, STREAM_METADATA_KEY};

use futures::stream::BoxStream;

/// Result type for event store operations
pub type Result<T> = std::result::Result<T, EventStoreError>;

/// Error types for stream extraction
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Event store returned {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Invalid event store configuration: {0}")]
    Config(String),
}

/// A readable event stream
///
/// Implementations yield events oldest first. The connection belongs to the
/// implementing value and is released when it is dropped.
pub trait EventSource: Send + Sync {
    fn read_stream<'a>(&'a self, stream: &'a str) -> BoxStream<'a, Result<RecordedEvent>>;
}

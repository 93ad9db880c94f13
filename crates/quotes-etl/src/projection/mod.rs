// Event Projection Module
//
// Flattens extracted quote events into two fixed-width tabular layouts:
// - quotes: one row per projected event (core fields, contact, event type/time)
// - quote items: one row per product carried by the event
//
// Envelopes are typed once on parse (`EventEnvelope`), including where the
// contact fields come from (`ContactSource`); record builders only read from
// that typed view.

pub mod envelope;
pub mod projector;
pub mod records;

pub use envelope::{ContactSource, EventEnvelope};
pub use projector::{LineOutcome, MissingAgencyProduct, ProjectedRows, ProjectionStats, Projector};
pub use records::{ContactFields, ProductRecord, QuoteRecord, PRODUCT_HEADERS, QUOTE_HEADERS};

/// Event type whose contact fields live at the top level of the payload
pub const CONTACT_UPDATED: &str = "contact_updated";

/// Event types excluded from projection unless configured otherwise
pub const DEFAULT_IGNORED_EVENTS: [&str; 4] = [
    "quote_sanctions_search_record_added",
    "statement_updated",
    "coupon_applied",
    "fee_applied",
];

/// Result type for projection operations
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Error types for projection
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Quote {quote_id}: product is missing required field '{field}'")]
    MissingField {
        quote_id: String,
        field: &'static str,
    },
}

// Typed view over one extracted event line

use super::CONTACT_UPDATED;
use crate::event_store::STREAM_METADATA_KEY;
use serde_json::{Map, Value};

/// Where an envelope's contact fields are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSource {
    /// `contact_updated` events: top level of the payload
    Updated,
    /// Any other event carrying a `contact` object
    Nested,
    /// No contact data
    Absent,
}

/// One event payload plus the stream metadata injected at extraction
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    payload: Map<String, Value>,
    event_type: Option<String>,
    event_created: Option<String>,
    contact: ContactSource,
}

impl EventEnvelope {
    /// Parse one JSON line; anything but a JSON object is rejected
    pub fn parse(line: &[u8]) -> serde_json::Result<Self> {
        let payload: Map<String, Value> = serde_json::from_slice(line)?;
        Ok(Self::from_payload(payload))
    }

    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let metadata = payload.get(STREAM_METADATA_KEY).and_then(Value::as_object);
        let event_type = metadata.and_then(|m| field(m, "eventType"));
        let event_created = metadata.and_then(|m| field(m, "eventCreated"));

        let contact = if event_type.as_deref() == Some(CONTACT_UPDATED) {
            ContactSource::Updated
        } else if payload.get("contact").is_some_and(Value::is_object) {
            ContactSource::Nested
        } else {
            ContactSource::Absent
        };

        Self {
            payload,
            event_type,
            event_created,
            contact,
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn event_created(&self) -> Option<&str> {
        self.event_created.as_deref()
    }

    pub fn contact_source(&self) -> ContactSource {
        self.contact
    }

    /// Rendered top-level field
    pub fn get(&self, key: &str) -> Option<String> {
        field(&self.payload, key)
    }

    /// The object the contact fields should be read from
    pub fn contact(&self) -> Option<&Map<String, Value>> {
        match self.contact {
            ContactSource::Updated => Some(&self.payload),
            ContactSource::Nested => self.payload.get("contact").and_then(Value::as_object),
            ContactSource::Absent => None,
        }
    }

    /// Quote id, when present and non-empty
    pub fn quote_id(&self) -> Option<String> {
        self.get("quoteId").filter(|id| !id.is_empty())
    }

    /// Products list; empty when absent or not an array
    pub fn products(&self) -> &[Value] {
        self.payload
            .get("products")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Render a JSON value as a single CSV cell
///
/// Null becomes `None`; strings are kept verbatim; everything else uses its
/// compact JSON form.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Rendered field of a JSON object; missing keys are `None`
pub fn field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(render)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> EventEnvelope {
        EventEnvelope::parse(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_render_values() {
        assert_eq!(render(&json!(null)), None);
        assert_eq!(render(&json!("Acme")), Some("Acme".to_string()));
        assert_eq!(render(&json!(12.5)), Some("12.5".to_string()));
        assert_eq!(render(&json!(true)), Some("true".to_string()));
        assert_eq!(render(&json!(["62020", "62090"])), Some(r#"["62020","62090"]"#.to_string()));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(EventEnvelope::parse(b"[1, 2]").is_err());
        assert!(EventEnvelope::parse(b"\"text\"").is_err());
        assert!(EventEnvelope::parse(b"{broken").is_err());
    }

    #[test]
    fn test_contact_updated_wins_over_nested_contact() {
        let env = envelope(json!({
            "businessName": "Top Level Ltd",
            "contact": {"businessName": "Nested Ltd"},
            "streamMetadata": {"eventType": "contact_updated"}
        }));
        assert_eq!(env.contact_source(), ContactSource::Updated);
        assert_eq!(field(env.contact().unwrap(), "businessName").as_deref(), Some("Top Level Ltd"));
    }

    #[test]
    fn test_nested_contact() {
        let env = envelope(json!({
            "contact": {"businessName": "Nested Ltd"},
            "streamMetadata": {"eventType": "quote_updated"}
        }));
        assert_eq!(env.contact_source(), ContactSource::Nested);
        assert_eq!(field(env.contact().unwrap(), "businessName").as_deref(), Some("Nested Ltd"));
    }

    #[test]
    fn test_absent_contact() {
        let null_contact = envelope(json!({
            "contact": null,
            "streamMetadata": {"eventType": "quote_updated"}
        }));
        assert_eq!(null_contact.contact_source(), ContactSource::Absent);
        assert!(null_contact.contact().is_none());

        let no_metadata = envelope(json!({"quoteId": "Q1"}));
        assert_eq!(no_metadata.contact_source(), ContactSource::Absent);
        assert_eq!(no_metadata.event_type(), None);
    }

    #[test]
    fn test_quote_id_and_products() {
        let env = envelope(json!({"quoteId": "", "products": "not a list"}));
        assert_eq!(env.quote_id(), None);
        assert!(env.products().is_empty());

        let env = envelope(json!({"quoteId": "Q9", "products": [{"id": "P1"}, {"id": "P2"}]}));
        assert_eq!(env.quote_id().as_deref(), Some("Q9"));
        assert_eq!(env.products().len(), 2);
    }
}

// Event Store HTTP Client (Atom feed)

use super::{EventSource, EventStoreConfig, EventStoreError, RecordedEvent, Result};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ATOM_JSON: &str = "application/vnd.eventstore.atom+json";

/// Reads streams through the event store's HTTP Atom API
///
/// Pages are requested forward from event number 0 with `embed=body`, so
/// every entry carries its payload inline.
pub struct HttpEventStore {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    page_size: u32,
}

impl HttpEventStore {
    pub fn new(config: &EventStoreConfig) -> Result<Self> {
        config.validate().map_err(EventStoreError::Config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("quotes-etl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
        })
    }

    fn page_url(&self, stream: &str, from: u64) -> Result<Url> {
        let from = from.to_string();
        let count = self.page_size.to_string();

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EventStoreError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend([
                "streams",
                stream,
                from.as_str(),
                "forward",
                count.as_str(),
            ]);
        url.query_pairs_mut().append_pair("embed", "body");
        Ok(url)
    }

    /// Fetch one page, oldest event first
    async fn fetch_page(&self, stream: &str, from: u64) -> Result<Vec<AtomEntry>> {
        let url = self.page_url(stream, from)?;
        debug!(%url, "Fetching stream page");

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, ATOM_JSON)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {},
            StatusCode::NOT_FOUND => return Err(EventStoreError::StreamNotFound(stream.to_string())),
            status => {
                return Err(EventStoreError::Http {
                    status,
                    url: url.to_string(),
                })
            },
        }

        let page: AtomPage = response.json().await?;
        let mut entries = page.entries;
        entries.sort_by_key(AtomEntry::position);
        Ok(entries)
    }

    /// Advance the cursor by one event, fetching the next page when needed
    async fn next_event(
        &self,
        stream: &str,
        mut cursor: PageCursor,
    ) -> Result<Option<(RecordedEvent, PageCursor)>> {
        loop {
            if let Some(entry) = cursor.buffered.pop_front() {
                return Ok(Some((entry.into_recorded(), cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let entries = self.fetch_page(stream, cursor.next).await?;
            cursor.exhausted = entries.len() < self.page_size as usize;
            if let Some(last) = entries.last() {
                cursor.next = last.position() + 1;
            }
            cursor.buffered.extend(entries);
        }
    }
}

impl EventSource for HttpEventStore {
    fn read_stream<'a>(&'a self, stream: &'a str) -> BoxStream<'a, Result<RecordedEvent>> {
        let cursor = PageCursor {
            next: 0,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        stream::try_unfold(cursor, move |cursor| self.next_event(stream, cursor)).boxed()
    }
}

struct PageCursor {
    next: u64,
    buffered: VecDeque<AtomEntry>,
    exhausted: bool,
}

#[derive(Debug, Deserialize)]
struct AtomPage {
    #[serde(default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtomEntry {
    event_id: String,
    event_type: String,
    event_number: u64,
    /// Set on resolved link events: the entry's number in the stream being read
    #[serde(default)]
    position_event_number: Option<u64>,
    stream_id: String,
    #[serde(default)]
    updated: String,
    /// JSON events arrive as a string holding the JSON text
    #[serde(default)]
    data: Option<Value>,
}

impl AtomEntry {
    /// Position of this entry in the stream being read
    fn position(&self) -> u64 {
        self.position_event_number.unwrap_or(self.event_number)
    }

    fn into_recorded(self) -> RecordedEvent {
        let data = match self.data {
            Some(Value::String(text)) => text.into_bytes(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => other.to_string().into_bytes(),
        };

        RecordedEvent {
            id: self.event_id,
            event_type: self.event_type,
            stream: self.stream_id,
            created: self.updated,
            data,
        }
    }
}

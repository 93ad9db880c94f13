// Event Store Connection Configuration

use super::{EventStoreError, Result};
use serde::Deserialize;
use url::Url;

/// Connection settings read from the `event_store` config section
#[derive(Clone, Deserialize)]
pub struct EventStoreConfig {
    /// Event store host name
    #[serde(alias = "tcp_host")]
    pub host: String,

    /// HTTP port of the event store
    #[serde(alias = "tcp_port")]
    pub port: u16,

    pub username: String,

    pub password: String,

    /// `http` or `https`
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Events requested per Atom page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    60
}

impl EventStoreConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            scheme: default_scheme(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Root URL of the event store HTTP API
    pub fn base_url(&self) -> Result<Url> {
        let raw = format!("{}://{}:{}/", self.scheme, self.host, self.port);
        Url::parse(&raw).map_err(|e| EventStoreError::Config(format!("{}: {}", raw, e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.is_empty() {
            return Err("Event store host cannot be empty".to_string());
        }

        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(format!("Unsupported scheme '{}'", self.scheme));
        }

        if self.page_size == 0 {
            return Err("Page size must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl std::fmt::Debug for EventStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("scheme", &self.scheme)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_accepts_tcp_aliases() {
        let yaml = "tcp_host: es.internal\ntcp_port: 2113\nusername: admin\npassword: changeit\n";
        let config: EventStoreConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.host, "es.internal");
        assert_eq!(config.port, 2113);
        assert_eq!(config.scheme, "http");
        assert_eq!(config.page_size, 500);
    }

    #[test]
    fn test_base_url() {
        let config = EventStoreConfig::new("localhost", 2113, "admin", "changeit");
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:2113/");
    }

    #[test]
    fn test_validate() {
        let config = EventStoreConfig::new("localhost", 2113, "admin", "changeit");
        assert!(config.validate().is_ok());
        assert!(config.clone().with_page_size(0).validate().is_err());

        let mut bad_scheme = config;
        bad_scheme.scheme = "tcp".to_string();
        assert!(bad_scheme.validate().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = EventStoreConfig::new("localhost", 2113, "admin", "changeit");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("changeit"));
    }
}

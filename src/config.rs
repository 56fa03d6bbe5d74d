//! Client configuration
//!
//! Loaded from defaults, an optional YAML file, and `RESTGRAPH_*`
//! environment variables, in that order.

use crate::error::{RestError, RestResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default REST endpoint of a local server
pub const DEFAULT_BASE_URI: &str = "http://localhost:7474/db/data";

/// Configuration for a [`RestApi`](crate::RestApi)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URI of the REST endpoint
    pub base_uri: String,
    /// Basic-auth user
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// How long fetched property data stays fresh, in milliseconds
    pub property_refetch_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BASE_URI.to_string(),
            username: None,
            password: None,
            connect_timeout_ms: 30_000,
            read_timeout_ms: 30_000,
            property_refetch_interval_ms: 1_000,
        }
    }
}

impl ClientConfig {
    /// Configuration for the given base URI with default settings
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Self::default()
        }
        .normalized()
    }

    /// Set basic-auth credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the property refetch interval
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.property_refetch_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Load a YAML configuration file; missing keys take their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> RestResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse a YAML configuration document
    pub fn from_yaml_str(text: &str) -> RestResult<Self> {
        let config: ClientConfig = serde_yaml::from_str(text)?;
        config.validated()
    }

    /// Overlay `RESTGRAPH_*` environment variables
    pub fn with_env_overrides(self) -> RestResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> RestResult<Self> {
        if let Some(url) = lookup("RESTGRAPH_URL") {
            self.base_uri = url;
        }
        if let Some(user) = lookup("RESTGRAPH_USER") {
            self.username = Some(user);
        }
        if let Some(password) = lookup("RESTGRAPH_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(ms) = lookup("RESTGRAPH_REFETCH_MS") {
            self.property_refetch_interval_ms = ms.parse().map_err(|_| {
                RestError::Config(format!("RESTGRAPH_REFETCH_MS is not a number: {}", ms))
            })?;
        }
        self.validated()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn refetch_interval(&self) -> Duration {
        Duration::from_millis(self.property_refetch_interval_ms)
    }

    fn normalized(mut self) -> Self {
        while self.base_uri.ends_with('/') {
            self.base_uri.pop();
        }
        self
    }

    fn validated(self) -> RestResult<Self> {
        let config = self.normalized();
        if !(config.base_uri.starts_with("http://") || config.base_uri.starts_with("https://")) {
            return Err(RestError::Config(format!(
                "base_uri must be an http(s) URI, got '{}'",
                config.base_uri
            )));
        }
        if config.username.is_some() != config.password.is_some() {
            return Err(RestError::Config(
                "username and password must be given together".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_uri, DEFAULT_BASE_URI);
        assert_eq!(config.refetch_interval(), Duration::from_millis(1000));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ClientConfig::new("http://db.example:7474/db/data//");
        assert_eq!(config.base_uri, "http://db.example:7474/db/data");
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_uri: http://graph.internal:7474/db/data/").unwrap();
        writeln!(file, "username: neo").unwrap();
        writeln!(file, "password: secret").unwrap();
        writeln!(file, "property_refetch_interval_ms: 250").unwrap();

        let config = ClientConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.base_uri, "http://graph.internal:7474/db/data");
        assert_eq!(config.username.as_deref(), Some("neo"));
        assert_eq!(config.refetch_interval(), Duration::from_millis(250));
        // untouched keys keep their defaults
        assert_eq!(config.read_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_base_uri() {
        let result = ClientConfig::from_yaml_str("base_uri: ftp://nope");
        assert!(matches!(result, Err(RestError::Config(_))));
    }

    #[test]
    fn test_half_credentials_rejected() {
        let result = ClientConfig::from_yaml_str("username: neo");
        assert!(matches!(result, Err(RestError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RESTGRAPH_URL", "https://remote:7473/db/data"),
            ("RESTGRAPH_REFETCH_MS", "5"),
        ]);
        let config = ClientConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.base_uri, "https://remote:7473/db/data");
        assert_eq!(config.property_refetch_interval_ms, 5);

        let bad: HashMap<&str, &str> = HashMap::from([("RESTGRAPH_REFETCH_MS", "soon")]);
        let result = ClientConfig::default().with_overrides(|key| bad.get(key).map(|v| v.to_string()));
        assert!(matches!(result, Err(RestError::Config(_))));
    }
}

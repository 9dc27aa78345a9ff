//! Connection and session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observe::{Observer, ObserverHandle};
use crate::protocol::MAX_FRAME_BYTES;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default native protocol port of the Cube SQL API.
pub const DEFAULT_PORT: u16 = 4445;

/// Socket-level and protocol settings for one session.
///
/// Timeouts are a transport policy applied to the socket; the protocol itself
/// has none. `None` means block indefinitely.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest accepted frame length (clamped to [`MAX_FRAME_BYTES`]).
    pub max_frame_bytes: u32,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Set `TCP_NODELAY` on the socket.
    pub nodelay: bool,
    pub observer: ObserverHandle,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
            observer: ObserverHandle::noop(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum frame length. Values above [`MAX_FRAME_BYTES`] are clamped.
    pub fn max_frame_bytes(mut self, limit: u32) -> Self {
        self.max_frame_bytes = limit.min(MAX_FRAME_BYTES);
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Install an observer for frames, state changes and raw payloads.
    pub fn observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observer = ObserverHandle::new(observer);
        self
    }
}

/// Which implementation executes queries for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The binary native protocol implemented by this crate.
    #[default]
    Native,
    /// A general-purpose SQL client supplied by the caller through
    /// [`Connection::with_backend`](crate::client::Connection::with_backend).
    External,
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub backend: BackendKind,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            token: String::new(),
            database: String::new(),
            backend: BackendKind::Native,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.max_frame_bytes, MAX_FRAME_BYTES);
        assert_eq!(config.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert!(config.read_timeout.is_none());
        assert!(config.nodelay);
    }

    #[test]
    fn test_session_config_chaining() {
        let config = SessionConfig::new()
            .max_frame_bytes(1024)
            .read_timeout(Some(Duration::from_secs(3)))
            .write_timeout(Some(Duration::from_secs(4)))
            .connect_timeout(None)
            .nodelay(false);

        assert_eq!(config.max_frame_bytes, 1024);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.write_timeout, Some(Duration::from_secs(4)));
        assert!(config.connect_timeout.is_none());
        assert!(!config.nodelay);
    }

    #[test]
    fn test_max_frame_bytes_clamped() {
        let config = SessionConfig::new().max_frame_bytes(u32::MAX);
        assert_eq!(config.max_frame_bytes, MAX_FRAME_BYTES);
    }

    #[test]
    fn test_connect_options_deserialize_with_defaults() {
        let options: ConnectOptions =
            serde_json::from_str(r#"{"host": "cube.local", "token": "t"}"#).unwrap();
        assert_eq!(options.host, "cube.local");
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.token, "t");
        assert_eq!(options.database, "");
        assert_eq!(options.backend, BackendKind::Native);
    }

    #[test]
    fn test_backend_kind_snake_case() {
        let options = ConnectOptions::new("h", 1).backend(BackendKind::External);
        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains(r#""backend":"external""#));
    }
}

//! Server configuration.
//!
//! The lifecycle core only consumes these values; they arrive already
//! parsed (from command-line flags in the bundled binary, or built directly
//! by an embedding application).
//!
//! All fields have defaults to allow minimal configs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level properties of a [`Server`](crate::container::Server).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Management domain. `None` falls back to the default domain.
    pub domain: Option<String>,

    /// Address the shutdown listener binds to.
    pub address: String,

    /// Shutdown listener port. `None` disables the socket; `await` then
    /// returns only on a programmatic stop.
    pub port: Option<u16>,

    /// The exact line that triggers shutdown.
    pub shutdown: String,

    /// Instance directory.
    pub base_dir: PathBuf,

    /// Installation directory.
    pub home_dir: PathBuf,

    /// How long one shutdown connection may take to deliver its line.
    pub shutdown_read_timeout_ms: u64,

    /// Bytes accepted beyond the token length before a line is rejected.
    pub max_shutdown_line: usize,
}

impl ServerConfig {
    pub fn shutdown_read_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_read_timeout_ms)
    }

    /// Upper bound on bytes read from one shutdown connection.
    pub fn shutdown_line_limit(&self) -> usize {
        // token + "\r\n" + slack
        self.shutdown.len() + 2 + self.max_shutdown_line
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let home = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            domain: None,
            address: "localhost".to_string(),
            port: Some(8005),
            shutdown: "SHUTDOWN".to_string(),
            base_dir: home.clone(),
            home_dir: home,
            shutdown_read_timeout_ms: 10_000,
            max_shutdown_line: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, Some(8005));
        assert_eq!(config.shutdown, "SHUTDOWN");
        assert_eq!(config.shutdown_read_timeout(), Duration::from_secs(10));
        assert_eq!(config.shutdown_line_limit(), 8 + 2 + 1024);
    }
}

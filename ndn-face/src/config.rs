//! Client configuration file.
//!
//! The client config is a plain `key=value` file looked up at
//! `$HOME/.ndn/client.conf`, then `/etc/ndn/client.conf`. Only the
//! `transport` key is interpreted here; unknown keys are ignored so the
//! file can be shared with other NDN tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Parsed client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport URI, e.g. `unix:///run/nfd/nfd.sock`.
    pub transport: Option<String>,
}

impl ClientConfig {
    /// Loads the configuration from the usual locations.
    ///
    /// A missing file yields the default configuration; a present but
    /// malformed file is an error.
    pub fn load() -> Result<Self, Error> {
        for path in Self::search_paths() {
            match std::fs::read_to_string(&path) {
                Ok(text) => return Self::parse(&text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".ndn").join("client.conf"));
        }
        paths.push(PathBuf::from("/etc/ndn/client.conf"));
        paths
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::Config(format!(
                    "malformed line {} in client configuration: '{raw}'",
                    lineno + 1
                )));
            };
            if key.trim() == "transport" {
                config.transport = Some(value.trim().to_string());
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_key() {
        let config = ClientConfig::parse(
            "; local forwarder\n\
             transport=unix:///run/nfd/nfd.sock\n\
             pib=pib-sqlite3\n",
        )
        .unwrap();
        assert_eq!(config.transport.as_deref(), Some("unix:///run/nfd/nfd.sock"));
    }

    #[test]
    fn empty_and_comments() {
        let config = ClientConfig::parse("# nothing here\n\n; still nothing\n").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(ClientConfig::parse("transport unix://x\n").is_err());
    }
}

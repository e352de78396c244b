//! Process-wide configuration.
//!
//! [`Delimiters`] is fixed once at startup and handed to every encoder and
//! connection explicitly. [`ServerConfig`] carries the listener settings.

use std::time::Duration;

use crate::error::{CompileServiceError, Result};

/// Default separator placed after every diagnostic field.
pub const DEFAULT_SEPARATOR: &str = "0EC18C4E-E0E1-4C42-B325-366003E0D504";

/// End-of-message sentinel appended once per response. Not configurable.
pub const END_SENTINEL: &str = "5EC18C4E-E0E1-4C42-B325-366003E0D505";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 10007;

/// Default maximum length of a single input line (1 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Separator token and end sentinel used inside framed payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    separator: String,
    sentinel: &'static str,
}

impl Delimiters {
    /// Create delimiters with a custom separator.
    ///
    /// # Errors
    ///
    /// The separator must be non-empty, free of line breaks and distinct from
    /// the sentinel.
    pub fn new(separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(CompileServiceError::Config(
                "separator must not be empty".to_string(),
            ));
        }
        if separator.contains(['\r', '\n']) {
            return Err(CompileServiceError::Config(
                "separator must not contain line breaks".to_string(),
            ));
        }
        if separator == END_SENTINEL {
            return Err(CompileServiceError::Config(
                "separator must differ from the end sentinel".to_string(),
            ));
        }
        Ok(Self {
            separator,
            sentinel: END_SENTINEL,
        })
    }

    #[inline]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[inline]
    pub fn sentinel(&self) -> &'static str {
        self.sentinel
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            sentinel: END_SENTINEL,
        }
    }
}

/// Listener and per-connection settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind on all interfaces. `0` picks an ephemeral port.
    pub port: u16,
    /// Payload delimiters.
    pub delimiters: Delimiters,
    /// Close a connection after this long without input. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Route every compile through one process-wide gate.
    pub serialize_compiles: bool,
    /// Longest accepted input line in bytes.
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            delimiters: Delimiters::default(),
            idle_timeout: None,
            serialize_compiles: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delimiters() {
        let d = Delimiters::default();
        assert_eq!(d.separator(), DEFAULT_SEPARATOR);
        assert_eq!(d.sentinel(), END_SENTINEL);
        assert_ne!(d.separator(), d.sentinel());
    }

    #[test]
    fn test_custom_separator() {
        let d = Delimiters::new("|SEP|").unwrap();
        assert_eq!(d.separator(), "|SEP|");
        assert_eq!(d.sentinel(), END_SENTINEL);
    }

    #[test]
    fn test_rejects_invalid_separators() {
        assert!(Delimiters::new("").is_err());
        assert!(Delimiters::new("a\nb").is_err());
        assert!(Delimiters::new("a\rb").is_err());

        let err = Delimiters::new(END_SENTINEL).unwrap_err();
        assert!(err.to_string().contains("sentinel"));
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.idle_timeout.is_none());
        assert!(!config.serialize_compiles);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }
}

//! Directory configuration types
//!
//! Base trait for client configuration and the options passed to a dial.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::error::DirectoryResult;

/// Trait for directory client configuration.
pub trait DirectoryConfig: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> DirectoryResult<()>;

    /// Create a redacted version of this config (for logging/display).
    ///
    /// Sensitive fields should be replaced with placeholders.
    fn redacted(&self) -> Self;
}

/// Options for dialing a directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialOptions {
    /// Whether to wrap the connection in TLS (LDAPS).
    #[serde(default)]
    pub use_tls: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,

    /// Connection timeout; zero means the transport default.
    #[serde(default)]
    pub connect_timeout: Duration,
}

fn default_true() -> bool {
    true
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            use_tls: false,
            verify_certificate: true,
            connect_timeout: Duration::ZERO,
        }
    }
}

impl DialOptions {
    /// Derive dial options from an endpoint URL; `ldaps://` selects TLS.
    pub fn for_url(url: &str) -> Self {
        Self {
            use_tls: url.to_ascii_lowercase().starts_with("ldaps://"),
            ..Self::default()
        }
    }

    /// Disable certificate verification.
    #[must_use]
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.verify_certificate = !insecure;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Log a security warning if TLS is on but certificates are not verified.
    pub fn validate_security(&self) {
        if self.use_tls && !self.verify_certificate {
            tracing::warn!(
                target: "security",
                "TLS certificate verification is DISABLED for the directory connection. \
                 This makes the connection vulnerable to Man-in-the-Middle attacks."
            );
        }
    }
}

//! Pluggable debug logger
//!
//! Sessions report their decisions (skipped members, reconnect attempts)
//! through a [`Logger`]. The default discards everything; structured
//! diagnostics are emitted through `tracing` independently of this hook.

use std::fmt;

/// Debug logger capability.
pub trait Logger: Send + Sync {
    /// Log a message.
    fn debug(&self, message: &str);

    /// Log a formatted message.
    ///
    /// ```
    /// use adsession_connector::logger::{Logger, NopLogger};
    ///
    /// NopLogger.debugf(format_args!("attempt {}", 1));
    /// ```
    fn debugf(&self, args: fmt::Arguments<'_>) {
        self.debug(&args.to_string());
    }
}

/// Logger that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn debug(&self, _message: &str) {}

    fn debugf(&self, _args: fmt::Arguments<'_>) {}
}

/// Logger that forwards messages to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "adsession", "{}", message);
    }
}

//! # Directory Connector Framework
//!
//! Core abstractions shared by adsession directory clients.
//!
//! ## Architecture
//!
//! - [`DirectoryTransport`] / [`DirectoryConnection`] - the capability a
//!   session uses to reach a directory server (dial, bind, search, modify,
//!   add, delete, close)
//! - [`MemoryDirectory`] - fixture-backed transport for tests
//! - [`Entry`] / [`AttributeValue`] - raw search results
//! - [`DirectoryError`] - error taxonomy with transient/permanent classification
//! - [`Logger`] - pluggable debug logger, silent by default
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types
//! - [`entry`] - Entries, attribute values, search requests
//! - [`filter`] - Filter value escaping and templates
//! - [`transport`] - Transport traits
//! - [`memory`] - In-memory transport
//! - [`config`] - Configuration trait and dial options
//! - [`logger`] - Logger capability
//!
//! [`DirectoryTransport`]: transport::DirectoryTransport
//! [`DirectoryConnection`]: transport::DirectoryConnection
//! [`MemoryDirectory`]: memory::MemoryDirectory
//! [`Entry`]: entry::Entry
//! [`AttributeValue`]: entry::AttributeValue
//! [`DirectoryError`]: error::DirectoryError
//! [`Logger`]: logger::Logger

pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod logger;
pub mod memory;
pub mod transport;

/// Prelude module for convenient imports.
///
/// ```
/// use adsession_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{DialOptions, DirectoryConfig};
    pub use crate::entry::{AttributeValue, Entry, EntryAttribute, Scope, SearchRequest};
    pub use crate::error::{DirectoryError, DirectoryResult};
    pub use crate::filter::{escape_filter_value, render_template};
    pub use crate::logger::{Logger, NopLogger, TracingLogger};
    pub use crate::memory::{MemoryDirectory, Modification};
    pub use crate::transport::{DirectoryConnection, DirectoryTransport};
}

// Re-export async_trait for transport implementors
pub use async_trait::async_trait;

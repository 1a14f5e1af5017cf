//! Directory transport traits
//!
//! The capability a session uses to talk to a directory server. The wire
//! protocol lives entirely behind these traits; sessions only see entries
//! and errors.

use async_trait::async_trait;

use crate::config::DialOptions;
use crate::entry::{Entry, SearchRequest};
use crate::error::DirectoryResult;

/// Opens connections to a directory server.
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Dial the endpoint and return an unauthenticated connection.
    ///
    /// Fails with `ConnectionFailed` if the server cannot be reached.
    async fn dial(
        &self,
        endpoint: &str,
        options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>>;
}

/// An open connection to a directory server.
///
/// Connections are shared between concurrent operations of one session, so
/// every method takes `&self` and implementations must tolerate concurrent
/// calls (by multiplexing requests or by serializing them internally).
#[async_trait]
pub trait DirectoryConnection: Send + Sync {
    /// Authenticate the connection with a simple bind.
    ///
    /// Rejected credentials fail with `AuthenticationFailed`.
    async fn bind(&self, dn: &str, password: &str) -> DirectoryResult<()>;

    /// Execute a search and return every matching entry in server order.
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>>;

    /// Replace all values of one attribute in a single modify operation.
    async fn modify_replace(
        &self,
        dn: &str,
        attribute: &str,
        values: &[String],
    ) -> DirectoryResult<()>;

    /// Add a new entry.
    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()>;

    /// Delete an entry.
    async fn delete(&self, dn: &str) -> DirectoryResult<()>;

    /// Close the connection.
    async fn close(&self) -> DirectoryResult<()>;
}

//! Entry resolution
//!
//! Searches that must yield at most one entry, and plain multi-entry
//! searches, executed over the session's connection.

use tracing::{debug, instrument};

use adsession_connector::entry::{Entry, SearchRequest};
use adsession_connector::error::{DirectoryError, DirectoryResult};

use crate::session::Session;

/// Reduce a search result to at most one entry.
///
/// More than one entry is `AmbiguousResult` whatever their order; none is
/// `Ok(None)`.
pub fn single_entry(
    request: &SearchRequest,
    mut entries: Vec<Entry>,
) -> DirectoryResult<Option<Entry>> {
    match entries.len() {
        0 => Ok(None),
        1 => Ok(entries.pop()),
        count => Err(DirectoryError::AmbiguousResult {
            base_dn: request.base_dn.clone(),
            filter: request.filter.clone(),
            count,
        }),
    }
}

impl Session {
    /// Search for a single entry.
    ///
    /// Returns `None` when nothing matches and `AmbiguousResult` when more
    /// than one entry does.
    #[instrument(skip(self, request), fields(base_dn = %request.base_dn, filter = %request.filter))]
    pub async fn search_entry(&self, request: &SearchRequest) -> DirectoryResult<Option<Entry>> {
        let entries = self.search_entries(request).await?;
        single_entry(request, entries)
    }

    /// Search for every matching entry, in server order.
    pub async fn search_entries(&self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        let connection = self.shared_connection().await?;
        let entries = connection
            .search(request)
            .await
            .map_err(|e| e.context(format!("search '{}' failed", request.filter)))?;
        debug!(found = entries.len(), filter = %request.filter, "Search completed");
        Ok(entries)
    }
}

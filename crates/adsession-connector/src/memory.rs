//! In-memory directory transport
//!
//! A fixture-backed [`DirectoryTransport`] for tests and local development.
//! Searches do not evaluate LDAP filters: each filter string is mapped to an
//! ordered list of DNs when the fixture is built, so a test states exactly
//! which entries a given filter returns.
//!
//! ```
//! use adsession_connector::entry::Entry;
//! use adsession_connector::memory::MemoryDirectory;
//!
//! let directory = MemoryDirectory::new()
//!     .with_account("CN=svc,DC=example,DC=com", "secret")
//!     .with_entry(
//!         Entry::new("CN=jdoe,DC=example,DC=com").with_attribute("sAMAccountName", ["jdoe"]),
//!     )
//!     .with_filter("(sAMAccountName=jdoe)", ["CN=jdoe,DC=example,DC=com"]);
//! # let _ = directory;
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::DialOptions;
use crate::entry::{AttributeValue, Entry, EntryAttribute, SearchRequest};
use crate::error::{DirectoryError, DirectoryResult};
use crate::transport::{DirectoryConnection, DirectoryTransport};

/// A recorded `modify_replace` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub dn: String,
    pub attribute: String,
    pub values: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    filters: HashMap<String, Vec<String>>,
    filter_delays: HashMap<String, Duration>,
    close_delay: Option<Duration>,
    failing_filters: HashSet<String>,
    failing_modifies: HashSet<String>,
    accounts: HashMap<String, String>,
    unreachable: bool,
    failing_dials: u32,
    generation: u64,
    modifications: Vec<Modification>,
    dials: usize,
    binds: usize,
    searches: usize,
    closes: usize,
}

/// Shared in-memory directory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    /// Create an empty, reachable directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Fixture builders

    /// Seed an entry.
    #[must_use]
    pub fn with_entry(self, entry: Entry) -> Self {
        self.lock().entries.push(entry);
        self
    }

    /// Map a filter string to the DNs it returns, in order.
    pub fn with_filter<I, S>(self, filter: impl Into<String>, dns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .filters
            .entry(filter.into())
            .or_default()
            .extend(dns.into_iter().map(Into::into));
        self
    }

    /// Delay every search for `filter` by `delay`.
    pub fn with_filter_delay(self, filter: impl Into<String>, delay: Duration) -> Self {
        self.lock().filter_delays.insert(filter.into(), delay);
        self
    }

    /// Delay every `close` by `delay`.
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.lock().close_delay = Some(delay);
        self
    }

    /// Make searches for `filter` fail.
    pub fn with_failing_filter(self, filter: impl Into<String>) -> Self {
        self.lock().failing_filters.insert(filter.into());
        self
    }

    /// Make `modify_replace` on `dn` fail.
    pub fn with_failing_modify(self, dn: impl Into<String>) -> Self {
        self.lock().failing_modifies.insert(dn.into());
        self
    }

    /// Register bind credentials.
    pub fn with_account(self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.lock().accounts.insert(dn.into(), password.into());
        self
    }

    // Fault injection

    /// Toggle whether dials succeed.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().unreachable = !reachable;
    }

    /// Fail the next `count` dials.
    pub fn fail_next_dials(&self, count: u32) {
        self.lock().failing_dials = count;
    }

    /// Drop every open connection; their next operation fails.
    pub fn sever_connections(&self) {
        self.lock().generation += 1;
    }

    // Observation

    /// All `modify_replace` calls that were applied, in order.
    pub fn modifications(&self) -> Vec<Modification> {
        self.lock().modifications.clone()
    }

    /// Number of dial attempts, failed ones included.
    pub fn dial_count(&self) -> usize {
        self.lock().dials
    }

    /// Number of bind attempts, failed ones included.
    pub fn bind_count(&self) -> usize {
        self.lock().binds
    }

    /// Number of search calls.
    pub fn search_count(&self) -> usize {
        self.lock().searches
    }

    /// Number of connections closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Current state of an entry.
    pub fn entry(&self, dn: &str) -> Option<Entry> {
        self.lock().entries.iter().find(|e| e.dn == dn).cloned()
    }
}

#[async_trait]
impl DirectoryTransport for MemoryDirectory {
    async fn dial(
        &self,
        endpoint: &str,
        _options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let mut state = self.lock();
        state.dials += 1;

        if state.unreachable {
            return Err(DirectoryError::connection_failed(format!(
                "dial {endpoint}: connection refused"
            )));
        }
        if state.failing_dials > 0 {
            state.failing_dials -= 1;
            return Err(DirectoryError::connection_failed(format!(
                "dial {endpoint}: connection reset"
            )));
        }

        debug!(endpoint = %endpoint, "Opened in-memory directory connection");

        Ok(Box::new(MemoryConnection {
            directory: self.clone(),
            generation: state.generation,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection to a [`MemoryDirectory`].
#[derive(Debug)]
pub struct MemoryConnection {
    directory: MemoryDirectory,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_open(&self, state: &State) -> DirectoryResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DirectoryError::connection_failed("connection is closed"));
        }
        if self.generation != state.generation {
            return Err(DirectoryError::connection_failed("connection reset by peer"));
        }
        Ok(())
    }
}

fn project(entry: &Entry, attributes: &[String]) -> Entry {
    if attributes.is_empty() || attributes.iter().any(|a| a == "*") {
        return entry.clone();
    }
    Entry {
        dn: entry.dn.clone(),
        attributes: entry
            .attributes
            .iter()
            .filter(|a| attributes.iter().any(|r| r.eq_ignore_ascii_case(&a.name)))
            .cloned()
            .collect(),
    }
}

#[async_trait]
impl DirectoryConnection for MemoryConnection {
    async fn bind(&self, dn: &str, password: &str) -> DirectoryResult<()> {
        let mut state = self.directory.lock();
        self.ensure_open(&state)?;
        state.binds += 1;

        match state.accounts.get(dn) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(DirectoryError::auth_failed(dn)),
        }
    }

    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        let delay = self
            .directory
            .lock()
            .filter_delays
            .get(&request.filter)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.directory.lock();
        self.ensure_open(&state)?;
        state.searches += 1;

        if state.failing_filters.contains(&request.filter) {
            return Err(DirectoryError::operation_failed(format!(
                "search '{}' failed: server busy",
                request.filter
            )));
        }

        let dns = state
            .filters
            .get(&request.filter)
            .cloned()
            .unwrap_or_default();

        Ok(dns
            .iter()
            .filter_map(|dn| state.entries.iter().find(|e| &e.dn == dn))
            .map(|e| project(e, &request.attributes))
            .collect())
    }

    async fn modify_replace(
        &self,
        dn: &str,
        attribute: &str,
        values: &[String],
    ) -> DirectoryResult<()> {
        let mut state = self.directory.lock();
        self.ensure_open(&state)?;

        if state.failing_modifies.contains(dn) {
            return Err(DirectoryError::operation_failed(format!(
                "modify '{dn}' failed: insufficient access rights"
            )));
        }

        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.dn == dn)
            .ok_or_else(|| DirectoryError::not_found("entry", dn))?;

        entry
            .attributes
            .retain(|a| !a.name.eq_ignore_ascii_case(attribute));
        if !values.is_empty() {
            entry.attributes.push(EntryAttribute {
                name: attribute.to_string(),
                values: values.iter().cloned().map(AttributeValue::Text).collect(),
            });
        }

        state.modifications.push(Modification {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()> {
        let mut state = self.directory.lock();
        self.ensure_open(&state)?;

        if state.entries.iter().any(|e| e.dn == dn) {
            return Err(DirectoryError::AlreadyExists { dn: dn.to_string() });
        }

        let entry = attributes
            .iter()
            .fold(Entry::new(dn), |entry, (name, values)| {
                entry.with_attribute(name.clone(), values.iter().cloned())
            });
        state.entries.push(entry);
        Ok(())
    }

    async fn delete(&self, dn: &str) -> DirectoryResult<()> {
        let mut state = self.directory.lock();
        self.ensure_open(&state)?;

        let before = state.entries.len();
        state.entries.retain(|e| e.dn != dn);
        if state.entries.len() == before {
            return Err(DirectoryError::not_found("entry", dn));
        }
        for dns in state.filters.values_mut() {
            dns.retain(|d| d != dn);
        }
        Ok(())
    }

    async fn close(&self) -> DirectoryResult<()> {
        let delay = self.directory.lock().close_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.directory.lock().closes += 1;
        }
        Ok(())
    }
}

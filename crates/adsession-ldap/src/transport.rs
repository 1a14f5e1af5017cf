//! LDAP network transport
//!
//! [`DirectoryTransport`] over `ldap3`. One [`Ldap`] handle is multiplexed
//! between concurrent operations: each call works on a clone of the handle
//! while a single driver task owns the socket.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, SearchEntry, SearchOptions};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use adsession_connector::config::DialOptions;
use adsession_connector::entry::{AttributeValue, Entry, EntryAttribute, Scope, SearchRequest};
use adsession_connector::error::{DirectoryError, DirectoryResult};
use adsession_connector::transport::{DirectoryConnection, DirectoryTransport};

const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ALREADY_EXISTS: u32 = 68;

/// Transport dialing real directory servers with `ldap3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapTransport;

impl LdapTransport {
    /// Create the transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryTransport for LdapTransport {
    #[instrument(skip(self, options))]
    async fn dial(
        &self,
        endpoint: &str,
        options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        options.validate_security();

        let mut settings = LdapConnSettings::new().set_no_tls_verify(!options.verify_certificate);
        if !options.connect_timeout.is_zero() {
            settings = settings.set_conn_timeout(options.connect_timeout);
        }

        debug!(url = %endpoint, tls = options.use_tls, "Connecting to directory server");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, endpoint)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("failed to connect to directory server at {endpoint}"),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        info!(url = %endpoint, "Directory connection established");

        Ok(Box::new(LdapConnection {
            ldap,
            timeout: options.connect_timeout,
            closed: AtomicBool::new(false),
        }))
    }
}

/// An open `ldap3` connection.
pub struct LdapConnection {
    ldap: Ldap,
    /// Per-operation timeout; zero means none.
    timeout: Duration,
    closed: AtomicBool,
}

impl LdapConnection {
    /// A handle for one operation, with the operation timeout applied.
    fn handle(&self) -> DirectoryResult<Ldap> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DirectoryError::connection_failed("connection is closed"));
        }
        let mut ldap = self.ldap.clone();
        if !self.timeout.is_zero() {
            ldap.with_timeout(self.timeout);
        }
        Ok(ldap)
    }

    /// Transport-level failures (I/O, timeouts, a dead driver) mean the
    /// connection is unusable.
    fn transport_error(message: String, error: LdapError) -> DirectoryError {
        DirectoryError::connection_failed_with_source(message, error)
    }

    fn to_ldap_scope(scope: Scope) -> ldap3::Scope {
        match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::OneLevel => ldap3::Scope::OneLevel,
            Scope::Subtree => ldap3::Scope::Subtree,
        }
    }

    /// Convert a search entry, ordering attributes as requested.
    fn to_entry(entry: SearchEntry, requested: &[String]) -> Entry {
        let mut attributes: Vec<EntryAttribute> = entry
            .attrs
            .into_iter()
            .map(|(name, values)| EntryAttribute {
                name,
                values: values.into_iter().map(AttributeValue::Text).collect(),
            })
            .chain(
                entry
                    .bin_attrs
                    .into_iter()
                    .map(|(name, values)| EntryAttribute {
                        name,
                        values: values.into_iter().map(AttributeValue::Binary).collect(),
                    }),
            )
            .collect();

        let position = |name: &str| {
            requested
                .iter()
                .position(|r| r.eq_ignore_ascii_case(name))
                .unwrap_or(usize::MAX)
        };
        attributes.sort_by(|a, b| {
            position(&a.name)
                .cmp(&position(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });

        Entry {
            dn: entry.dn,
            attributes,
        }
    }
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection")
            .field("timeout", &self.timeout)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    #[instrument(skip(self, password))]
    async fn bind(&self, dn: &str, password: &str) -> DirectoryResult<()> {
        let mut ldap = self.handle()?;

        debug!(bind_dn = %dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| Self::transport_error(format!("LDAP bind failed for {dn}"), e))?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::auth_failed(dn)),
            rc => {
                debug!(rc, "LDAP bind rejected");
                Err(DirectoryError::auth_failed_with_source(
                    dn,
                    LdapError::LdapResult { result },
                ))
            }
        }
    }

    #[instrument(skip(self, request), fields(base_dn = %request.base_dn, filter = %request.filter))]
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        let mut ldap = self.handle()?;

        if !request.time_limit.is_zero() {
            let secs = i32::try_from(request.time_limit.as_secs().max(1)).unwrap_or(i32::MAX);
            ldap.with_search_options(SearchOptions::new().timelimit(secs));
        }

        let attributes: Vec<&str> = if request.attributes.is_empty() {
            vec!["*"]
        } else {
            request.attributes.iter().map(String::as_str).collect()
        };

        let result = ldap
            .search(
                &request.base_dn,
                Self::to_ldap_scope(request.scope),
                &request.filter,
                attributes,
            )
            .await
            .map_err(|e| Self::transport_error("LDAP search failed".to_string(), e))?;

        if result.1.rc == RC_NO_SUCH_OBJECT {
            debug!("Search base does not exist");
            return Ok(Vec::new());
        }

        let (entries, _) = result.success().map_err(|e| {
            DirectoryError::operation_failed_with_source(
                format!("LDAP search under '{}' failed", request.base_dn),
                e,
            )
        })?;

        debug!(found = entries.len(), "LDAP search completed");

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| Self::to_entry(entry, &request.attributes))
            .collect())
    }

    #[instrument(skip(self, values))]
    async fn modify_replace(
        &self,
        dn: &str,
        attribute: &str,
        values: &[String],
    ) -> DirectoryResult<()> {
        let mut ldap = self.handle()?;

        // ldap3 takes a set: value order is not kept on the wire and duplicates collapse.
        let value_set: HashSet<String> = values.iter().cloned().collect();
        let mods = vec![Mod::Replace(attribute.to_string(), value_set)];

        debug!(dn = %dn, values = values.len(), "Replacing attribute values");

        let result = ldap
            .modify(dn, mods)
            .await
            .map_err(|e| Self::transport_error(format!("failed to modify entry: {dn}"), e))?;

        match result.rc {
            0 => {
                info!(dn = %dn, attribute = %attribute, "LDAP entry updated");
                Ok(())
            }
            RC_NO_SUCH_OBJECT => Err(DirectoryError::not_found("entry", dn)),
            rc => Err(DirectoryError::operation_failed(format!(
                "LDAP modify failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    #[instrument(skip(self, attributes))]
    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()> {
        let mut ldap = self.handle()?;

        let attrs: Vec<(&str, HashSet<&str>)> = attributes
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| {
                (
                    name.as_str(),
                    values.iter().map(String::as_str).collect::<HashSet<_>>(),
                )
            })
            .collect();

        debug!(dn = %dn, "Creating LDAP entry");

        let result = ldap
            .add(dn, attrs)
            .await
            .map_err(|e| Self::transport_error(format!("failed to create entry: {dn}"), e))?;

        match result.rc {
            0 => {
                info!(dn = %dn, "LDAP entry created");
                Ok(())
            }
            RC_ALREADY_EXISTS => Err(DirectoryError::AlreadyExists { dn: dn.to_string() }),
            rc => Err(DirectoryError::operation_failed(format!(
                "LDAP add failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, dn: &str) -> DirectoryResult<()> {
        let mut ldap = self.handle()?;

        debug!(dn = %dn, "Deleting LDAP entry");

        let result = ldap
            .delete(dn)
            .await
            .map_err(|e| Self::transport_error(format!("failed to delete entry: {dn}"), e))?;

        match result.rc {
            0 => {
                info!(dn = %dn, "LDAP entry deleted");
                Ok(())
            }
            RC_NO_SUCH_OBJECT => Err(DirectoryError::not_found("entry", dn)),
            rc => Err(DirectoryError::operation_failed(format!(
                "LDAP delete failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn close(&self) -> DirectoryResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut ldap = self.ldap.clone();
        ldap.unbind()
            .await
            .map_err(|e| Self::transport_error("LDAP unbind failed".to_string(), e))
    }
}

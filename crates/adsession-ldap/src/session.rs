//! Directory session
//!
//! A [`Session`] owns at most one live connection to the directory server.
//! It connects (dial plus optional bind), disconnects, probes the
//! connection's health and re-establishes it with a bounded, cancellable
//! retry loop.
//!
//! Connections are safe for concurrent use, so a session is cheap to clone
//! and clones share the same connection.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use adsession_connector::config::DirectoryConfig;
use adsession_connector::entry::{Scope, SearchRequest};
use adsession_connector::error::{DirectoryError, DirectoryResult};
use adsession_connector::filter::render_template;
use adsession_connector::logger::{Logger, NopLogger};
use adsession_connector::transport::{DirectoryConnection, DirectoryTransport};

use crate::config::ClientConfig;
use crate::resolver::single_entry;
use crate::transport::LdapTransport;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Dialing and binding.
    Connecting,
    /// A live, bound connection is held.
    Connected,
    /// The health probe failed and the retry loop is running.
    Reconnecting,
    /// The last reconnect gave up or was cancelled.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Timing of the reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each attempt.
    pub poll_interval: Duration,
    /// Maximum number of connect attempts.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

    /// Build a policy; zero values select the defaults.
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval: if poll_interval.is_zero() {
                Self::DEFAULT_POLL_INTERVAL
            } else {
                poll_interval
            },
            max_attempts: if max_attempts == 0 {
                Self::DEFAULT_MAX_ATTEMPTS
            } else {
                max_attempts
            },
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::ZERO, 0)
    }
}

type SharedConnection = Arc<dyn DirectoryConnection>;

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A session with an Active Directory server.
#[derive(Clone)]
pub struct Session {
    config: Arc<ClientConfig>,
    transport: Arc<dyn DirectoryTransport>,
    logger: Arc<dyn Logger>,

    /// Live connection, if any.
    connection: Arc<RwLock<Option<SharedConnection>>>,

    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// Create a session over the given transport.
    ///
    /// The configuration is validated; nothing is dialed until
    /// [`connect`](Self::connect) or the first operation.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn DirectoryTransport>,
    ) -> DirectoryResult<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            transport,
            logger: Arc::new(NopLogger),
            connection: Arc::new(RwLock::new(None)),
            state: Arc::new(Mutex::new(SessionState::Disconnected)),
        })
    }

    /// Create a session over the `ldap3` network transport.
    pub fn ldap(config: ClientConfig) -> DirectoryResult<Self> {
        Self::new(config, Arc::new(LdapTransport::new()))
    }

    /// Replace the debug logger.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a live connection is held.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!(from = %*current, to = %state, "Session state changed");
            *current = state;
        }
    }

    /// Set the state while holding the connection lock, so that no connect
    /// or disconnect interleaves with the change.
    async fn transition(&self, state: SessionState) {
        let _guard = self.connection.write().await;
        self.set_state(state);
    }

    /// Connect and bind. A no-op when already connected.
    ///
    /// Dial failures are `ConnectionFailed`; a rejected bind is
    /// `AuthenticationFailed`.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn connect(&self) -> DirectoryResult<()> {
        self.shared_connection().await.map(|_| ())
    }

    /// Release the connection. A no-op when not connected; close errors are
    /// logged, never returned.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn disconnect(&self) {
        // State changes only under the connection write lock.
        let mut guard = self.connection.write().await;
        if let Some(connection) = guard.take() {
            Self::close_quietly(connection.as_ref()).await;
            info!("Disconnected from directory server");
        }
        self.set_state(SessionState::Disconnected);
    }

    /// The live connection, connecting first if there is none.
    pub(crate) async fn shared_connection(&self) -> DirectoryResult<SharedConnection> {
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let mut guard = self.connection.write().await;
        // Another task may have connected while we waited for the lock.
        if let Some(connection) = guard.as_ref() {
            return Ok(Arc::clone(connection));
        }

        self.set_state(SessionState::Connecting);
        match self.establish().await {
            Ok(connection) => {
                *guard = Some(Arc::clone(&connection));
                self.set_state(SessionState::Connected);
                info!(url = %self.config.url, "Connected to directory server");
                Ok(connection)
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                warn!(url = %self.config.url, error = %e, "Failed to connect to directory server");
                Err(e)
            }
        }
    }

    /// Dial and, with a bind account configured, bind.
    async fn establish(&self) -> DirectoryResult<SharedConnection> {
        let connection = self
            .transport
            .dial(&self.config.url, &self.config.dial_options())
            .await?;

        if let Some(bind) = &self.config.bind {
            if let Err(e) = connection.bind(&bind.dn, &bind.password).await {
                Self::close_quietly(connection.as_ref()).await;
                return Err(e);
            }
            debug!(bind_dn = %bind.dn, "Bound to directory server");
        }

        Ok(Arc::from(connection))
    }

    async fn close_quietly(connection: &dyn DirectoryConnection) {
        if let Err(e) = connection.close().await {
            warn!(error = %e, "Error while closing directory connection");
        }
    }

    /// Probe the live connection with a search for the bind identity's own
    /// entry, or a base read of the search root without a bind account.
    async fn probe(&self) -> DirectoryResult<()> {
        let connection = self
            .connection
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| DirectoryError::connection_failed("session is not connected"))?;

        let request = match &self.config.bind {
            Some(bind) => SearchRequest::new(
                self.config.users_search_base(),
                render_template(&self.config.users.filter_by_dn, &bind.dn),
            )
            .with_attributes([self.config.users.id_attribute.as_str()]),
            None => SearchRequest::new(&self.config.search_base, "(objectClass=*)")
                .with_scope(Scope::Base)
                .with_attributes(["objectClass"]),
        }
        .with_time_limit(self.config.timeout());

        let entries = connection.search(&request).await?;
        single_entry(&request, entries).map(|_| ())
    }

    /// Check the connection and re-establish it if it is lost.
    ///
    /// A healthy session returns at once without any attempt. Otherwise,
    /// every `poll_interval` the session is disconnected and connected again,
    /// at most `max_attempts` times; zero values select 5 seconds and 2
    /// attempts. Cancelling `cancel` stops the loop at the next wait; an
    /// attempt already in flight is finished but never retried.
    #[instrument(skip(self, cancel), fields(url = %self.config.url))]
    pub async fn reconnect(
        &self,
        cancel: &CancellationToken,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> DirectoryResult<()> {
        let mut last_error = match self.probe().await {
            Ok(()) => {
                debug!("Directory connection is healthy");
                return Ok(());
            }
            Err(e) => e,
        };

        let policy = ReconnectPolicy::new(poll_interval, max_attempts);
        warn!(
            error = %last_error,
            max_attempts = policy.max_attempts,
            poll_interval_ms = millis(policy.poll_interval),
            "Directory connection lost, reconnecting"
        );
        self.transition(SessionState::Reconnecting).await;

        let mut ticker = interval_at(Instant::now() + policy.poll_interval, policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!(attempts, "Reconnect cancelled");
                    self.transition(SessionState::Failed).await;
                    return Err(DirectoryError::Cancelled);
                }

                _ = ticker.tick() => {
                    if attempts >= policy.max_attempts {
                        warn!(attempts, error = %last_error, "Giving up reconnecting");
                        self.transition(SessionState::Failed).await;
                        return Err(DirectoryError::ExhaustedRetries {
                            attempts,
                            last_error: Box::new(last_error),
                        });
                    }

                    attempts += 1;
                    self.logger.debugf(format_args!(
                        "Reconnecting to directory server. Attempt: {attempts}"
                    ));

                    match self.redial().await {
                        Ok(()) => {
                            self.logger.debug("Successfully reconnected to directory server");
                            info!(attempts, "Reconnected to directory server");
                            return Ok(());
                        }
                        Err(e) => {
                            debug!(attempt = attempts, error = %e, "Reconnect attempt failed");
                            last_error = e;
                        }
                    }
                }
            }
        }
    }

    /// Replace the live connection with a fresh one.
    async fn redial(&self) -> DirectoryResult<()> {
        let mut guard = self.connection.write().await;
        if let Some(previous) = guard.take() {
            Self::close_quietly(previous.as_ref()).await;
        }
        let connection = self.establish().await?;
        *guard = Some(connection);
        self.set_state(SessionState::Connected);
        Ok(())
    }

    /// Check that `dn` can bind with `password`.
    ///
    /// Uses a separate connection that is always closed; the session's own
    /// connection is not touched.
    #[instrument(skip(self, password))]
    pub async fn check_credentials(&self, dn: &str, password: &str) -> DirectoryResult<()> {
        if dn.is_empty() {
            return Err(DirectoryError::validation("dn must not be empty"));
        }
        // An empty password would be an unauthenticated bind and succeed.
        if password.is_empty() {
            return Err(DirectoryError::validation("password must not be empty"));
        }

        let connection = self
            .transport
            .dial(&self.config.url, &self.config.dial_options())
            .await?;

        let result = connection.bind(dn, password).await;
        Self::close_quietly(connection.as_ref()).await;

        match &result {
            Ok(()) => debug!("Credentials accepted"),
            Err(e) => debug!(error = %e, "Credentials rejected"),
        }
        result
    }

    /// Replace every value of `attribute` on `dn` in one modify operation.
    #[instrument(skip(self, values), fields(values = values.len()))]
    pub async fn update_attribute(
        &self,
        dn: &str,
        attribute: &str,
        values: &[String],
    ) -> DirectoryResult<()> {
        let connection = self.shared_connection().await?;
        connection
            .modify_replace(dn, attribute, values)
            .await
            .map_err(|e| e.context(format!("failed to update '{attribute}' of '{dn}'")))
    }

    /// Create an entry.
    #[instrument(skip(self, attributes))]
    pub async fn add_entry(
        &self,
        dn: &str,
        attributes: &[(String, Vec<String>)],
    ) -> DirectoryResult<()> {
        let connection = self.shared_connection().await?;
        connection
            .add(dn, attributes)
            .await
            .map_err(|e| e.context(format!("failed to add entry '{dn}'")))
    }

    /// Delete an entry.
    #[instrument(skip(self))]
    pub async fn delete_entry(&self, dn: &str) -> DirectoryResult<()> {
        let connection = self.shared_connection().await?;
        connection
            .delete(dn)
            .await
            .map_err(|e| e.context(format!("failed to delete entry '{dn}'")))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

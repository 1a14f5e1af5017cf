//! # Active Directory Session
//!
//! Client-side session manager for Active Directory over LDAP.
//!
//! This crate keeps one authenticated connection per [`Session`], resolves
//! users and groups, and reconciles group membership.
//!
//! ## Features
//!
//! - Connect and bind, LDAPS with optional certificate verification
//! - Health probe with a bounded, cancellable reconnect loop
//! - Single-entry searches that reject ambiguous results
//! - User and group lookups with their groups / members
//! - Concurrent membership reconciliation written as one `member` replace
//! - Credential checks on a throwaway connection
//!
//! ## Example
//!
//! ```ignore
//! use adsession_ldap::{ClientConfig, Session};
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("ldaps://dc1.example.com:636", "DC=example,DC=com")
//!     .with_bind("CN=svc-adsession,OU=Service,DC=example,DC=com", "secret");
//!
//! let session = Session::ldap(config)?;
//! session.connect().await?;
//!
//! let added = session.add_group_members("admins", ["jdoe", "asmith"]).await?;
//!
//! let cancel = CancellationToken::new();
//! session.reconnect(&cancel, Duration::from_secs(5), 3).await?;
//! ```

pub mod config;
pub mod groups;
pub mod membership;
pub mod model;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod users;

// Re-exports
pub use config::{BindAccount, ClientConfig, GroupsConfig, UsersConfig};
pub use groups::GetGroupArgs;
pub use model::{Group, GroupMember, User, UserGroup};
pub use session::{ReconnectPolicy, Session, SessionState};
pub use transport::LdapTransport;
pub use users::GetUserArgs;

//! Active Directory client configuration
//!
//! Connection settings, the bind account and the per-kind (users / groups)
//! search settings used by [`Session`](crate::session::Session).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use adsession_connector::config::{DialOptions, DirectoryConfig};
use adsession_connector::error::{DirectoryError, DirectoryResult};
use adsession_connector::filter::validate_template;

const REDACTED: &str = "***REDACTED***";

/// Configuration for an Active Directory client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Directory URL (e.g., "ldaps://dc1.example.com:636").
    pub url: String,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_tls: bool,

    /// Network and search timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Default search root (e.g., "DC=example,DC=com").
    pub search_base: String,

    /// Account used to bind after dialing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<BindAccount>,

    /// User lookup settings.
    #[serde(default)]
    pub users: UsersConfig,

    /// Group lookup settings.
    #[serde(default)]
    pub groups: GroupsConfig,
}

/// Identity used for the session bind.
#[derive(Clone, Serialize, Deserialize)]
pub struct BindAccount {
    /// Bind DN (e.g., "CN=svc-adsession,OU=Service,DC=example,DC=com").
    pub dn: String,

    /// Bind password.
    pub password: String,
}

impl BindAccount {
    /// Create a bind account.
    pub fn new(dn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for BindAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindAccount")
            .field("dn", &self.dn)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Settings for user lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// Search base override; the global search base when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_base: Option<String>,

    /// Attribute holding the user identifier.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,

    /// Attributes fetched for every user.
    #[serde(default = "default_user_attributes")]
    pub attributes: Vec<String>,

    /// Filter template for lookups by identifier.
    #[serde(default = "default_user_filter_by_id")]
    pub filter_by_id: String,

    /// Filter template for lookups by DN.
    #[serde(default = "default_user_filter_by_dn")]
    pub filter_by_dn: String,

    /// Filter template listing the groups of a user DN.
    #[serde(default = "default_user_filter_groups_by_dn")]
    pub filter_groups_by_dn: String,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            search_base: None,
            id_attribute: default_id_attribute(),
            attributes: default_user_attributes(),
            filter_by_id: default_user_filter_by_id(),
            filter_by_dn: default_user_filter_by_dn(),
            filter_groups_by_dn: default_user_filter_groups_by_dn(),
        }
    }
}

/// Settings for group lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Search base override; the global search base when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_base: Option<String>,

    /// Attribute holding the group identifier.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,

    /// Attributes fetched for every group.
    #[serde(default = "default_group_attributes")]
    pub attributes: Vec<String>,

    /// Filter template for lookups by identifier.
    #[serde(default = "default_group_filter_by_id")]
    pub filter_by_id: String,

    /// Filter template for lookups by DN.
    #[serde(default = "default_group_filter_by_dn")]
    pub filter_by_dn: String,

    /// Filter template listing the members of a group DN.
    #[serde(default = "default_group_filter_members_by_dn")]
    pub filter_members_by_dn: String,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            search_base: None,
            id_attribute: default_id_attribute(),
            attributes: default_group_attributes(),
            filter_by_id: default_group_filter_by_id(),
            filter_by_dn: default_group_filter_by_dn(),
            filter_members_by_dn: default_group_filter_members_by_dn(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_id_attribute() -> String {
    "sAMAccountName".to_string()
}

fn default_user_attributes() -> Vec<String> {
    vec!["givenName".to_string(), "sn".to_string(), "mail".to_string()]
}

fn default_group_attributes() -> Vec<String> {
    vec!["cn".to_string(), "description".to_string()]
}

fn default_user_filter_by_id() -> String {
    "(&(objectClass=person)(sAMAccountName={}))".to_string()
}

fn default_user_filter_by_dn() -> String {
    "(&(objectClass=person)(distinguishedName={}))".to_string()
}

fn default_user_filter_groups_by_dn() -> String {
    "(&(objectClass=group)(member={}))".to_string()
}

fn default_group_filter_by_id() -> String {
    "(&(objectClass=group)(sAMAccountName={}))".to_string()
}

fn default_group_filter_by_dn() -> String {
    "(&(objectClass=group)(distinguishedName={}))".to_string()
}

fn default_group_filter_members_by_dn() -> String {
    "(&(objectCategory=person)(memberOf={}))".to_string()
}

/// Append attributes to a list, skipping names already present.
fn append_unique<I, S>(target: &mut Vec<String>, attributes: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for attribute in attributes {
        let attribute = attribute.into();
        if !target.iter().any(|a| a.eq_ignore_ascii_case(&attribute)) {
            target.push(attribute);
        }
    }
}

impl ClientConfig {
    /// Create a config with default user and group settings.
    pub fn new(url: impl Into<String>, search_base: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            insecure_tls: false,
            timeout_secs: default_timeout_secs(),
            search_base: search_base.into(),
            bind: None,
            users: UsersConfig::default(),
            groups: GroupsConfig::default(),
        }
    }

    /// Load a config from JSON.
    pub fn from_json(json: &str) -> DirectoryResult<Self> {
        serde_json::from_str(json).map_err(|e| DirectoryError::InvalidConfiguration {
            message: format!("failed to parse client config: {e}"),
        })
    }

    /// Set the bind account.
    pub fn with_bind(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind = Some(BindAccount::new(dn, password));
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Skip TLS certificate verification.
    #[must_use]
    pub fn with_insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    /// Replace the user settings.
    #[must_use]
    pub fn with_users(mut self, users: UsersConfig) -> Self {
        self.users = users;
        self
    }

    /// Replace the group settings.
    #[must_use]
    pub fn with_groups(mut self, groups: GroupsConfig) -> Self {
        self.groups = groups;
        self
    }

    /// Fetch additional attributes for every user.
    pub fn append_user_attributes<I, S>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_unique(&mut self.users.attributes, attributes);
    }

    /// Fetch additional attributes for every group.
    pub fn append_group_attributes<I, S>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_unique(&mut self.groups.attributes, attributes);
    }

    /// Base DN for user searches.
    #[must_use]
    pub fn users_search_base(&self) -> &str {
        self.users
            .search_base
            .as_deref()
            .filter(|base| !base.is_empty())
            .unwrap_or(&self.search_base)
    }

    /// Base DN for group searches.
    #[must_use]
    pub fn groups_search_base(&self) -> &str {
        self.groups
            .search_base
            .as_deref()
            .filter(|base| !base.is_empty())
            .unwrap_or(&self.search_base)
    }

    /// Timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Dial options derived from the URL scheme and TLS settings.
    #[must_use]
    pub fn dial_options(&self) -> DialOptions {
        DialOptions::for_url(&self.url)
            .insecure(self.insecure_tls)
            .with_connect_timeout(self.timeout())
    }
}

impl DirectoryConfig for ClientConfig {
    fn validate(&self) -> DirectoryResult<()> {
        if self.url.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "url is required".to_string(),
            });
        }

        let scheme = self.url.to_ascii_lowercase();
        if !scheme.starts_with("ldap://") && !scheme.starts_with("ldaps://") {
            return Err(DirectoryError::InvalidConfiguration {
                message: format!("url must use ldap:// or ldaps://: {}", self.url),
            });
        }

        if self.search_base.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "search_base is required".to_string(),
            });
        }

        if let Some(bind) = &self.bind {
            if bind.dn.is_empty() {
                return Err(DirectoryError::InvalidConfiguration {
                    message: "bind.dn is required".to_string(),
                });
            }
            // An empty simple-bind password is an anonymous bind.
            if bind.password.is_empty() {
                return Err(DirectoryError::InvalidConfiguration {
                    message: "bind.password is required".to_string(),
                });
            }
        }

        if self.users.id_attribute.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "users.id_attribute is required".to_string(),
            });
        }
        if self.groups.id_attribute.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "groups.id_attribute is required".to_string(),
            });
        }

        validate_template("users.filter_by_id", &self.users.filter_by_id)?;
        validate_template("users.filter_by_dn", &self.users.filter_by_dn)?;
        validate_template(
            "users.filter_groups_by_dn",
            &self.users.filter_groups_by_dn,
        )?;
        validate_template("groups.filter_by_id", &self.groups.filter_by_id)?;
        validate_template("groups.filter_by_dn", &self.groups.filter_by_dn)?;
        validate_template(
            "groups.filter_members_by_dn",
            &self.groups.filter_members_by_dn,
        )?;

        Ok(())
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(bind) = config.bind.as_mut() {
            bind.password = REDACTED.to_string();
        }
        config
    }
}

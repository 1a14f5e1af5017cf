//! User lookups

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use adsession_connector::entry::SearchRequest;
use adsession_connector::error::{DirectoryError, DirectoryResult};
use adsession_connector::filter::render_template;

use crate::config::UsersConfig;
use crate::model::{User, UserGroup};
use crate::session::Session;

/// Arguments of [`Session::get_user`].
///
/// A raw filter wins over a DN, which wins over an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserArgs {
    /// User identifier (value of the users ID attribute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// User DN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,

    /// Raw LDAP filter, used as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Attributes to fetch instead of the configured ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,

    /// Do not fetch the user's groups.
    #[serde(default)]
    pub skip_groups_search: bool,
}

impl GetUserArgs {
    /// Look up by identifier.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Look up by DN.
    pub fn by_dn(dn: impl Into<String>) -> Self {
        Self {
            dn: Some(dn.into()),
            ..Self::default()
        }
    }

    /// Look up with a raw filter.
    pub fn by_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Fetch these attributes instead of the configured ones.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Skip the groups search.
    #[must_use]
    pub fn skip_groups_search(mut self) -> Self {
        self.skip_groups_search = true;
        self
    }

    /// Check that an identifier, a DN or a filter is given.
    pub fn validate(&self) -> DirectoryResult<()> {
        if [&self.id, &self.dn, &self.filter].into_iter().any(|v| non_empty(v).is_some()) {
            Ok(())
        } else {
            Err(DirectoryError::validation(
                "neither of id, dn or filter provided",
            ))
        }
    }

    /// The search filter for these arguments.
    pub fn search_filter(&self, config: &UsersConfig) -> String {
        if let Some(filter) = non_empty(&self.filter) {
            filter.to_string()
        } else if let Some(dn) = non_empty(&self.dn) {
            render_template(&config.filter_by_dn, dn)
        } else {
            render_template(&config.filter_by_id, non_empty(&self.id).unwrap_or_default())
        }
    }
}

/// The value, unless absent or empty.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Requested attributes, always including the identifier attribute.
pub(crate) fn with_id_attribute(mut attributes: Vec<String>, id_attribute: &str) -> Vec<String> {
    if !attributes.iter().any(|a| a == "*" || a.eq_ignore_ascii_case(id_attribute)) {
        attributes.push(id_attribute.to_string());
    }
    attributes
}

impl Session {
    /// Fetch a single user.
    ///
    /// Returns `None` when no user matches. Unless skipped, the user's
    /// groups are fetched into [`User::groups`].
    #[instrument(skip(self))]
    pub async fn get_user(&self, args: &GetUserArgs) -> DirectoryResult<Option<User>> {
        args.validate()?;

        let config = self.config();
        let attributes = args
            .attributes
            .clone()
            .unwrap_or_else(|| config.users.attributes.clone());
        let request =
            SearchRequest::new(config.users_search_base(), args.search_filter(&config.users))
                .with_attributes(with_id_attribute(attributes, &config.users.id_attribute))
                .with_time_limit(config.timeout());

        let Some(entry) = self.search_entry(&request).await? else {
            debug!(filter = %request.filter, "User not found");
            return Ok(None);
        };

        let mut user = User::from_entry(entry, &config.users.id_attribute);
        if !args.skip_groups_search {
            user.groups = self
                .user_groups(&user.dn)
                .await
                .map_err(|e| e.context(format!("failed to fetch groups of '{}'", user.dn)))?;
        }

        Ok(Some(user))
    }

    /// Groups listing `dn` as a member.
    async fn user_groups(&self, dn: &str) -> DirectoryResult<Vec<UserGroup>> {
        let config = self.config();
        let request = SearchRequest::new(
            config.groups_search_base(),
            render_template(&config.users.filter_groups_by_dn, dn),
        )
        .with_attributes([config.groups.id_attribute.as_str()])
        .with_time_limit(config.timeout());

        Ok(self
            .search_entries(&request)
            .await?
            .into_iter()
            .map(|entry| UserGroup {
                id: entry.text(&config.groups.id_attribute).to_string(),
                dn: entry.dn,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(GetUserArgs::default().validate().is_err());
        assert!(GetUserArgs::by_id("").validate().is_err());
        assert!(GetUserArgs::by_id("jdoe").validate().is_ok());
        assert!(GetUserArgs::by_dn("CN=jdoe,DC=example,DC=com").validate().is_ok());
        assert!(GetUserArgs::by_filter("(mail=*)").validate().is_ok());
    }

    #[test]
    fn test_search_filter_precedence() {
        let config = UsersConfig::default();

        let args = GetUserArgs::by_id("jdoe");
        assert_eq!(
            args.search_filter(&config),
            "(&(objectClass=person)(sAMAccountName=jdoe))"
        );

        let args = GetUserArgs {
            dn: Some("CN=Doe\\, John,DC=example,DC=com".to_string()),
            ..GetUserArgs::by_id("jdoe")
        };
        assert_eq!(
            args.search_filter(&config),
            "(&(objectClass=person)(distinguishedName=CN=Doe\\5c, John,DC=example,DC=com))"
        );

        let args = GetUserArgs {
            filter: Some("(mail=jdoe@example.com)".to_string()),
            ..args
        };
        assert_eq!(args.search_filter(&config), "(mail=jdoe@example.com)");
    }

    #[test]
    fn test_search_filter_skips_empty_values() {
        let config = UsersConfig::default();
        let args = GetUserArgs {
            filter: Some(String::new()),
            dn: Some(String::new()),
            ..GetUserArgs::by_id("jdoe")
        };
        assert!(args.validate().is_ok());
        assert_eq!(
            args.search_filter(&config),
            "(&(objectClass=person)(sAMAccountName=jdoe))"
        );

        let args = GetUserArgs {
            filter: Some(String::new()),
            ..GetUserArgs::by_dn("CN=jdoe,DC=example,DC=com")
        };
        assert_eq!(
            args.search_filter(&config),
            "(&(objectClass=person)(distinguishedName=CN=jdoe,DC=example,DC=com))"
        );
    }

    #[test]
    fn test_search_filter_escapes_id() {
        let args = GetUserArgs::by_id("*)(objectClass=*");
        assert_eq!(
            args.search_filter(&UsersConfig::default()),
            "(&(objectClass=person)(sAMAccountName=\\2a\\29\\28objectClass=\\2a))"
        );
    }

    #[test]
    fn test_with_id_attribute() {
        assert_eq!(
            with_id_attribute(vec!["mail".to_string()], "sAMAccountName"),
            vec!["mail", "sAMAccountName"]
        );
        assert_eq!(
            with_id_attribute(vec!["samaccountname".to_string()], "sAMAccountName"),
            vec!["samaccountname"]
        );
        assert_eq!(with_id_attribute(vec!["*".to_string()], "uid"), vec!["*"]);
    }

    #[test]
    fn test_args_from_json() {
        let args: GetUserArgs =
            serde_json::from_str(r#"{"id": "jdoe", "skip_groups_search": true}"#).unwrap();
        assert_eq!(args, GetUserArgs::by_id("jdoe").skip_groups_search());
    }
}

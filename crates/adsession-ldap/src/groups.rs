//! Group lookups

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use adsession_connector::entry::SearchRequest;
use adsession_connector::error::{DirectoryError, DirectoryResult};
use adsession_connector::filter::render_template;

use crate::config::GroupsConfig;
use crate::model::{Group, GroupMember};
use crate::session::Session;
use crate::users::{non_empty, with_id_attribute};

/// Arguments of [`Session::get_group`].
///
/// A raw filter wins over a DN, which wins over an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetGroupArgs {
    /// Group identifier (value of the groups ID attribute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Group DN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,

    /// Raw LDAP filter, used as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Attributes to fetch instead of the configured ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,

    /// Do not fetch the group's members.
    #[serde(default)]
    pub skip_members_search: bool,
}

impl GetGroupArgs {
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

    /// Skip the members search.
    #[must_use]
    pub fn skip_members_search(mut self) -> Self {
        self.skip_members_search = true;
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
    pub fn search_filter(&self, config: &GroupsConfig) -> String {
        if let Some(filter) = non_empty(&self.filter) {
            filter.to_string()
        } else if let Some(dn) = non_empty(&self.dn) {
            render_template(&config.filter_by_dn, dn)
        } else {
            render_template(&config.filter_by_id, non_empty(&self.id).unwrap_or_default())
        }
    }
}

impl Session {
    /// Fetch a single group.
    ///
    /// Returns `None` when no group matches. Unless skipped, the group's
    /// members are fetched into [`Group::members`].
    #[instrument(skip(self))]
    pub async fn get_group(&self, args: &GetGroupArgs) -> DirectoryResult<Option<Group>> {
        args.validate()?;

        let config = self.config();
        let attributes = args
            .attributes
            .clone()
            .unwrap_or_else(|| config.groups.attributes.clone());
        let request =
            SearchRequest::new(config.groups_search_base(), args.search_filter(&config.groups))
                .with_attributes(with_id_attribute(attributes, &config.groups.id_attribute))
                .with_time_limit(config.timeout());

        let Some(entry) = self.search_entry(&request).await? else {
            debug!(filter = %request.filter, "Group not found");
            return Ok(None);
        };

        let mut group = Group::from_entry(entry, &config.groups.id_attribute);
        if !args.skip_members_search {
            group.members = self
                .group_members(&group.dn)
                .await
                .map_err(|e| e.context(format!("failed to fetch members of '{}'", group.dn)))?;
        }

        Ok(Some(group))
    }

    /// Users listing `dn` in their `memberOf`.
    async fn group_members(&self, dn: &str) -> DirectoryResult<Vec<GroupMember>> {
        let config = self.config();
        let request = SearchRequest::new(
            config.users_search_base(),
            render_template(&config.groups.filter_members_by_dn, dn),
        )
        .with_attributes([config.users.id_attribute.as_str()])
        .with_time_limit(config.timeout());

        Ok(self
            .search_entries(&request)
            .await?
            .into_iter()
            .map(|entry| GroupMember {
                id: entry.text(&config.users.id_attribute).to_string(),
                dn: entry.dn,
            })
            .collect())
    }
}

//! Directory model
//!
//! Users and groups decoded from raw entries. Each attribute keeps only its
//! first value, and the related entries (a user's groups, a group's members)
//! are snapshots taken when the object was fetched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use adsession_connector::entry::{AttributeValue, Entry};

/// A group a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub dn: String,
    pub id: String,
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub dn: String,
    pub id: String,
}

/// An Active Directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub dn: String,
    pub id: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub groups: Vec<UserGroup>,
}

/// An Active Directory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub dn: String,
    pub id: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

/// Collapse every attribute to its first value.
fn first_values(entry: Entry) -> BTreeMap<String, AttributeValue> {
    let mut attributes = BTreeMap::new();
    for attribute in entry.attributes {
        if let Some(value) = attribute.values.into_iter().next() {
            attributes.entry(attribute.name).or_insert(value);
        }
    }
    attributes
}

fn string_attribute<'a>(attributes: &'a BTreeMap<String, AttributeValue>, name: &str) -> &'a str {
    attributes
        .get(name)
        .and_then(AttributeValue::as_text)
        .unwrap_or("")
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

impl User {
    /// Decode a user entry; the identifier comes from `id_attribute`.
    pub fn from_entry(entry: Entry, id_attribute: &str) -> Self {
        let id = entry.text(id_attribute).to_string();
        let dn = entry.dn.clone();
        Self {
            dn,
            id,
            attributes: first_values(entry),
            groups: Vec::new(),
        }
    }

    /// Text value of an attribute.
    ///
    /// Returns an empty string when the attribute is absent or binary.
    pub fn get_string_attribute(&self, name: &str) -> &str {
        string_attribute(&self.attributes, name)
    }

    /// Whether the groups snapshot contains the group identifier.
    pub fn is_group_member(&self, group_id: &str) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    /// DNs of the user's groups; `None` when there are none.
    pub fn groups_dn(&self) -> Option<Vec<String>> {
        non_empty(self.groups.iter().map(|g| g.dn.clone()).collect())
    }

    /// Identifiers of the user's groups; `None` when there are none.
    pub fn groups_id(&self) -> Option<Vec<String>> {
        non_empty(self.groups.iter().map(|g| g.id.clone()).collect())
    }
}

impl Group {
    /// Decode a group entry; the identifier comes from `id_attribute`.
    pub fn from_entry(entry: Entry, id_attribute: &str) -> Self {
        let id = entry.text(id_attribute).to_string();
        let dn = entry.dn.clone();
        Self {
            dn,
            id,
            attributes: first_values(entry),
            members: Vec::new(),
        }
    }

    /// Text value of an attribute.
    ///
    /// Returns an empty string when the attribute is absent or binary.
    pub fn get_string_attribute(&self, name: &str) -> &str {
        string_attribute(&self.attributes, name)
    }

    /// Whether the members snapshot contains the user identifier.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id == user_id)
    }

    /// DNs of the group's members; `None` when there are none.
    pub fn members_dn(&self) -> Option<Vec<String>> {
        non_empty(self.members.iter().map(|m| m.dn.clone()).collect())
    }

    /// Identifiers of the group's members; `None` when there are none.
    pub fn members_id(&self) -> Option<Vec<String>> {
        non_empty(self.members.iter().map(|m| m.id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_entry() -> Entry {
        Entry::new("CN=jdoe,OU=Users,DC=example,DC=com")
            .with_attribute("sAMAccountName", ["jdoe"])
            .with_attribute("mail", ["jdoe@example.com"])
            .with_attribute("proxyAddresses", ["smtp:a@example.com", "smtp:b@example.com"])
            .with_attribute("objectGUID", [vec![0xde_u8, 0xad]])
            .with_attribute("description", Vec::<String>::new())
    }

    #[test]
    fn test_user_from_entry() {
        let user = User::from_entry(user_entry(), "sAMAccountName");
        assert_eq!(user.dn, "CN=jdoe,OU=Users,DC=example,DC=com");
        assert_eq!(user.id, "jdoe");
        assert_eq!(user.get_string_attribute("mail"), "jdoe@example.com");
        // Multi-valued attributes keep their first value.
        assert_eq!(user.get_string_attribute("proxyAddresses"), "smtp:a@example.com");
        assert!(!user.attributes.contains_key("description"));
        assert!(user.groups.is_empty());
    }

    #[test]
    fn test_get_string_attribute_fallbacks() {
        let user = User::from_entry(user_entry(), "sAMAccountName");
        assert_eq!(user.get_string_attribute("objectGUID"), "");
        assert_eq!(user.get_string_attribute("telephoneNumber"), "");
        // Names match exactly as returned by the server.
        assert_eq!(user.get_string_attribute("MAIL"), "");
    }

    #[test]
    fn test_missing_id_attribute_decodes_empty() {
        let group = Group::from_entry(Entry::new("CN=g,DC=example,DC=com"), "sAMAccountName");
        assert_eq!(group.id, "");
        assert_eq!(group.get_string_attribute("cn"), "");
    }

    #[test]
    fn test_user_groups() {
        let mut user = User::from_entry(user_entry(), "sAMAccountName");
        assert_eq!(user.groups_dn(), None);
        assert_eq!(user.groups_id(), None);
        assert!(!user.is_group_member("admins"));

        user.groups.push(UserGroup {
            dn: "CN=admins,DC=example,DC=com".to_string(),
            id: "admins".to_string(),
        });
        assert!(user.is_group_member("admins"));
        assert!(!user.is_group_member("CN=admins,DC=example,DC=com"));
        assert_eq!(
            user.groups_dn(),
            Some(vec!["CN=admins,DC=example,DC=com".to_string()])
        );
        assert_eq!(user.groups_id(), Some(vec!["admins".to_string()]));
    }

    #[test]
    fn test_group_members() {
        let mut group = Group::default();
        assert_eq!(group.members_dn(), None);
        assert_eq!(group.members_id(), None);

        group.members = vec![
            GroupMember {
                dn: "CN=a,DC=example,DC=com".to_string(),
                id: "a".to_string(),
            },
            GroupMember {
                dn: "CN=b,DC=example,DC=com".to_string(),
                id: "b".to_string(),
            },
        ];
        assert!(group.has_member("b"));
        assert!(!group.has_member("c"));
        assert_eq!(
            group.members_dn(),
            Some(vec![
                "CN=a,DC=example,DC=com".to_string(),
                "CN=b,DC=example,DC=com".to_string()
            ])
        );
        assert_eq!(
            group.members_id(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_user_serialization() {
        let user = User::from_entry(user_entry(), "sAMAccountName");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "jdoe");
        assert_eq!(json["attributes"]["mail"], "jdoe@example.com");
        assert_eq!(json["groups"], serde_json::json!([]));
    }
}

//! Common test utilities for adsession-ldap integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use adsession_connector::entry::Entry;
use adsession_connector::filter::render_template;
use adsession_connector::logger::Logger;
use adsession_connector::memory::MemoryDirectory;
use adsession_ldap::{ClientConfig, GroupsConfig, Session, UsersConfig};

pub const BASE_DN: &str = "DC=company,DC=com";
pub const ADMIN_DN: &str = "CN=Administrator,CN=Users,DC=company,DC=com";
pub const ADMIN_PASSWORD: &str = "P@ssw0rd";

/// DN of a fixture user.
pub fn user_dn(id: &str) -> String {
    format!("CN={id},OU=Users,{BASE_DN}")
}

/// DN of a fixture group.
pub fn group_dn(id: &str) -> String {
    format!("CN={id},OU=Groups,{BASE_DN}")
}

/// Filter the session uses to find a user by identifier.
pub fn user_filter(id: &str) -> String {
    render_template(&UsersConfig::default().filter_by_id, id)
}

/// Filter the session uses to find a user by DN.
pub fn user_dn_filter(dn: &str) -> String {
    render_template(&UsersConfig::default().filter_by_dn, dn)
}

/// Filter the session uses to list the groups of a user.
pub fn user_groups_filter(dn: &str) -> String {
    render_template(&UsersConfig::default().filter_groups_by_dn, dn)
}

/// Filter the session uses to find a group by identifier.
pub fn group_filter(id: &str) -> String {
    render_template(&GroupsConfig::default().filter_by_id, id)
}

/// Filter the session uses to find a group by DN.
pub fn group_dn_filter(dn: &str) -> String {
    render_template(&GroupsConfig::default().filter_by_dn, dn)
}

/// Filter the session uses to list the members of a group.
pub fn group_members_filter(dn: &str) -> String {
    render_template(&GroupsConfig::default().filter_members_by_dn, dn)
}

/// Builds a [`MemoryDirectory`] whose filters match what a session with the
/// default configuration sends.
pub struct DirectoryBuilder {
    directory: MemoryDirectory,
}

impl DirectoryBuilder {
    /// An empty directory with the administrator bind account.
    pub fn new() -> Self {
        let directory = MemoryDirectory::new()
            .with_account(ADMIN_DN, ADMIN_PASSWORD)
            .with_entry(Entry::new(ADMIN_DN).with_attribute("sAMAccountName", ["Administrator"]))
            .with_filter(user_dn_filter(ADMIN_DN), [ADMIN_DN]);
        Self { directory }
    }

    /// Add a user findable by identifier and by DN.
    pub fn user(self, id: &str) -> Self {
        let dn = user_dn(id);
        let directory = self
            .directory
            .with_entry(
                Entry::new(&dn)
                    .with_attribute("sAMAccountName", [id])
                    .with_attribute("givenName", [format!("{id} given name")])
                    .with_attribute("mail", [format!("{id}@company.com")]),
            )
            .with_filter(user_filter(id), [dn.as_str()])
            .with_filter(user_dn_filter(&dn), [dn.as_str()]);
        Self { directory }
    }

    /// Add a group with the given members (user identifiers).
    pub fn group(self, id: &str, members: &[&str]) -> Self {
        let dn = group_dn(id);
        let member_dns: Vec<String> = members.iter().map(|m| user_dn(m)).collect();

        let mut directory = self
            .directory
            .with_entry(
                Entry::new(&dn)
                    .with_attribute("sAMAccountName", [id])
                    .with_attribute("cn", [id])
                    .with_attribute("description", [format!("{id} description")])
                    .with_attribute("member", member_dns.clone()),
            )
            .with_filter(group_filter(id), [dn.as_str()])
            .with_filter(group_dn_filter(&dn), [dn.as_str()])
            .with_filter(group_members_filter(&dn), member_dns.clone());

        for member_dn in &member_dns {
            directory = directory.with_filter(user_groups_filter(member_dn), [dn.as_str()]);
        }
        Self { directory }
    }

    /// Map an arbitrary filter to entries.
    pub fn filter(self, filter: &str, dns: &[String]) -> Self {
        Self {
            directory: self.directory.with_filter(filter, dns.iter().cloned()),
        }
    }

    /// Make searches for `filter` fail.
    pub fn failing(self, filter: String) -> Self {
        Self {
            directory: self.directory.with_failing_filter(filter),
        }
    }

    /// Delay searches for `filter`.
    pub fn slow(self, filter: String, delay: std::time::Duration) -> Self {
        Self {
            directory: self.directory.with_filter_delay(filter, delay),
        }
    }

    pub fn build(self) -> MemoryDirectory {
        self.directory
    }
}

/// The standard fixture directory.
///
/// - `user1`, `user2`, `userToAdd`: plain users
/// - `group1`: members `user1`
/// - `group2`: members `user2`, `userToAdd`
/// - `entryForErr`: every lookup of it fails
/// - `groupWithErrMember`: its members search fails
/// - `notUniq`: two users and two groups share the identifier
pub fn fixture_directory() -> MemoryDirectory {
    let not_uniq = [user_dn("notUniq1"), user_dn("notUniq2")];
    let not_uniq_groups = [group_dn("notUniq1"), group_dn("notUniq2")];

    DirectoryBuilder::new()
        .user("user1")
        .user("user2")
        .user("userToAdd")
        .user("notUniq1")
        .user("notUniq2")
        .group("group1", &["user1"])
        .group("group2", &["user2", "userToAdd"])
        .group("groupWithErrMember", &[])
        .group("notUniq1", &[])
        .group("notUniq2", &[])
        .filter(&user_filter("notUniq"), &not_uniq)
        .filter(&group_filter("notUniq"), &not_uniq_groups)
        .filter("customFilterToSearchUser", &[user_dn("user1")])
        .filter("customFilterToSearchGroup", &[group_dn("group1")])
        .failing(user_filter("entryForErr"))
        .failing(group_filter("entryForErr"))
        .failing(group_members_filter(&group_dn("groupWithErrMember")))
        .build()
}

/// Client configuration matching the fixtures.
pub fn config() -> ClientConfig {
    ClientConfig::new("ldaps://127.0.0.1:636", BASE_DN)
        .with_insecure_tls(true)
        .with_bind(ADMIN_DN, ADMIN_PASSWORD)
}

/// A session over the directory.
pub fn session(directory: &MemoryDirectory) -> Session {
    Session::new(config(), Arc::new(directory.clone())).expect("valid config")
}

/// Logger recording every message.
#[derive(Clone, Default)]
pub struct CaptureLogger {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CaptureLogger {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl Logger for CaptureLogger {
    fn debug(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

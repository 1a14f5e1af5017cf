//! Group membership reconciliation
//!
//! Adds or removes accounts from a group's `member` attribute. Candidates
//! are resolved concurrently; once every lookup has finished the whole new
//! member list is written with a single replace. A failed lookup aborts the
//! call before anything is written.

use std::collections::HashSet;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use adsession_connector::error::{DirectoryError, DirectoryResult};

use crate::groups::GetGroupArgs;
use crate::model::{Group, User};
use crate::session::Session;
use crate::users::GetUserArgs;

/// Attribute holding a group's member DNs.
pub const MEMBER_ATTRIBUTE: &str = "member";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipChange {
    Add,
    Remove,
}

impl MembershipChange {
    fn verb(self) -> &'static str {
        match self {
            MembershipChange::Add => "added to",
            MembershipChange::Remove => "removed from",
        }
    }
}

/// Member list after appending `to_add`: existing DNs first, then the new
/// ones in the given order.
pub fn members_after_add(group: &Group, to_add: &[String]) -> Vec<String> {
    let mut members: Vec<String> = group.members.iter().map(|m| m.dn.clone()).collect();
    members.extend(to_add.iter().cloned());
    members
}

/// Member list without `to_remove` (exact DN match), order preserved.
pub fn members_after_remove(group: &Group, to_remove: &[String]) -> Vec<String> {
    group
        .members
        .iter()
        .filter(|m| !to_remove.contains(&m.dn))
        .map(|m| m.dn.clone())
        .collect()
}

/// Candidate identifiers without repeats, first occurrence kept.
fn unique_candidates<I, S>(member_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    member_ids
        .into_iter()
        .map(Into::into)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

impl Session {
    /// Add accounts to a group's members.
    ///
    /// Returns the number of accounts added. Accounts that do not exist or
    /// are already members are skipped; if nothing is left to add, nothing
    /// is written.
    pub async fn add_group_members<I, S>(
        &self,
        group_id: &str,
        member_ids: I,
    ) -> DirectoryResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reconcile_members(group_id, unique_candidates(member_ids), MembershipChange::Add)
            .await
    }

    /// Remove accounts from a group's members.
    ///
    /// Returns the number of accounts removed. Accounts that do not exist or
    /// are not members are skipped; if nothing is left to remove, nothing is
    /// written.
    pub async fn remove_group_members<I, S>(
        &self,
        group_id: &str,
        member_ids: I,
    ) -> DirectoryResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reconcile_members(group_id, unique_candidates(member_ids), MembershipChange::Remove)
            .await
    }

    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    async fn reconcile_members(
        &self,
        group_id: &str,
        candidates: Vec<String>,
        change: MembershipChange,
    ) -> DirectoryResult<usize> {
        let group = self
            .get_group(&GetGroupArgs::by_id(group_id))
            .await
            .map_err(|e| e.context(format!("failed to fetch group '{group_id}'")))?
            .ok_or_else(|| DirectoryError::not_found("group", group_id))?;

        let accounts = self.resolve_accounts(&candidates).await?;

        let mut changed: Vec<String> = Vec::new();
        for (member_id, account) in candidates.iter().zip(accounts) {
            let Some(user) = account else {
                self.logger().debugf(format_args!(
                    "Account '{member_id}' being {} '{group_id}' wasn't found",
                    change.verb()
                ));
                continue;
            };

            let is_member = group.has_member(&user.id);
            match change {
                MembershipChange::Add if is_member => {
                    self.logger().debugf(format_args!(
                        "The account '{member_id}' is already a member of the group '{group_id}'"
                    ));
                }
                MembershipChange::Remove if !is_member => {
                    self.logger().debugf(format_args!(
                        "The account '{member_id}' isn't a member of the group '{group_id}'"
                    ));
                }
                _ => {
                    if !changed.contains(&user.dn) {
                        changed.push(user.dn);
                    }
                }
            }
        }

        if changed.is_empty() {
            debug!("No membership changes");
            return Ok(0);
        }

        let members = match change {
            MembershipChange::Add => members_after_add(&group, &changed),
            MembershipChange::Remove => members_after_remove(&group, &changed),
        };

        self.logger().debugf(format_args!(
            "Updating members of group '{group_id}'; Old count: {}; New count: {}",
            group.members.len(),
            members.len()
        ));

        self.update_attribute(&group.dn, MEMBER_ATTRIBUTE, &members)
            .await?;

        info!(
            group_dn = %group.dn,
            changed = changed.len(),
            members = members.len(),
            "Group members updated"
        );

        Ok(changed.len())
    }

    /// Look up every candidate concurrently. Results are in candidate order.
    async fn resolve_accounts(&self, candidates: &[String]) -> DirectoryResult<Vec<Option<User>>> {
        let mut tasks = JoinSet::new();
        for (index, member_id) in candidates.iter().enumerate() {
            let session = self.clone();
            let args = GetUserArgs::by_id(member_id.as_str()).skip_groups_search();
            tasks.spawn(async move { (index, session.get_user(&args).await) });
        }

        let mut accounts: Vec<Option<User>> = vec![None; candidates.len()];
        // Returning early drops the set, which aborts the pending lookups.
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| DirectoryError::Internal {
                message: format!("account lookup task failed: {e}"),
            })?;
            accounts[index] = result.map_err(|e| {
                e.context(format!("failed to fetch account '{}'", candidates[index]))
            })?;
        }

        Ok(accounts)
    }
}

//! Operations exposed to callers: people search, group search, and adding
//! people to a group (or previewing the addition).

use std::collections::HashSet;

use chrono::Utc;
use ldap3::{Mod, Scope};
use tracing::{debug, info, warn};

use crate::attributes::AttributeMap;
use crate::compile;
use crate::config::RosterConfig;
use crate::directory::{Directory, DirectorySession, ModifyOutcome};
use crate::error::{CoreError, ErrorKind};
use crate::filter::Filter;
use crate::matcher::QueryMatcher;
use crate::normalize;
use crate::query::ParsedQuery;
use crate::record::{
    partition_membership, GroupRecord, MembershipReceipt, MembershipSplit, UserRecord,
};

/// Attribute that receives new members.
const MEMBER_ATTRIBUTE: &str = "memberUid";

/// Immutable per-process context shared by every request.
#[derive(Debug, Clone)]
pub struct Roster<D> {
    directory: D,
    attributes: AttributeMap,
    user_base_dn: String,
    group_base_dn: String,
}

impl<D: Directory> Roster<D> {
    pub fn new(
        directory: D,
        attributes: AttributeMap,
        user_base_dn: impl Into<String>,
        group_base_dn: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            attributes,
            user_base_dn: user_base_dn.into(),
            group_base_dn: group_base_dn.into(),
        }
    }

    pub fn from_config(directory: D, config: &RosterConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self::new(
            directory,
            config.attribute_map()?,
            config.user_base_dn.clone(),
            config.group_base_dn.clone(),
        ))
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Search people. An empty query returns no results without contacting
    /// the directory.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserRecord>, CoreError> {
        let parsed = ParsedQuery::parse(query.trim());
        if parsed.is_empty() {
            return Ok(Vec::new());
        }
        let filter = compile::user_filter(&parsed, &self.attributes)?;
        let matcher = QueryMatcher::new(&parsed)?;
        let attrs = self.attributes.directory_attributes();

        let mut session = self.directory.connect().await?;
        let result = session
            .search(&self.user_base_dn, &filter, Scope::Subtree, &attrs)
            .await;
        close(&mut session).await;
        let entries = result?;

        let found = entries.len();
        let users: Vec<UserRecord> = entries
            .iter()
            .filter_map(|e| normalize::normalize_user(e, &self.attributes))
            .collect();
        let users = matcher.retain(users);

        info!(
            "user search {:?}: {} entries, {} returned",
            query,
            found,
            users.len()
        );
        Ok(users)
    }

    /// Search groups of both POSIX and Active Directory flavours. An empty
    /// query returns no results without contacting the directory.
    pub async fn search_groups(&self, query: &str) -> Result<Vec<GroupRecord>, CoreError> {
        let parsed = ParsedQuery::parse(query.trim());
        if parsed.is_empty() {
            return Ok(Vec::new());
        }
        let filter = compile::group_filter(&parsed, &self.attributes)?;
        let matcher = QueryMatcher::new(&parsed)?;
        let attrs = normalize::group_attributes(&self.attributes);

        let mut session = self.directory.connect().await?;
        let result = session
            .search(&self.group_base_dn, &filter, Scope::Subtree, &attrs)
            .await;
        close(&mut session).await;
        let entries = result?;

        let found = entries.len();
        let groups: Vec<GroupRecord> = entries
            .iter()
            .filter_map(|e| normalize::normalize_group(e, &self.attributes))
            .collect();
        let groups = matcher.retain(groups);

        info!(
            "group search {:?}: {} entries, {} returned",
            query,
            found,
            groups.len()
        );
        Ok(groups)
    }

    /// Add every user in `user_ids` to the POSIX group `group_id`.
    ///
    /// Modifications run one at a time in the given order and stop at the
    /// first failure; earlier additions are not rolled back. A user who is
    /// already a member counts as success.
    pub async fn submit_membership(
        &self,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<MembershipReceipt, CoreError> {
        let group_id = group_id.trim();
        if group_id.is_empty() {
            return Err(CoreError::Validation("group id is required".to_string()));
        }
        let user_ids = dedup_user_ids(user_ids);
        if user_ids.is_empty() {
            return Err(CoreError::Validation(
                "at least one user id is required".to_string(),
            ));
        }
        let filter = compile::group_lookup_filter(group_id)?;

        let mut session = self.directory.connect().await?;
        let result = self
            .add_members(&mut session, group_id, &filter, &user_ids)
            .await;
        close(&mut session).await;
        result
    }

    /// Resolve a POSIX group exactly as [`Roster::submit_membership`] does and
    /// split `user_ids` into its current members and non-members. Nothing is
    /// modified.
    pub async fn preview_membership(
        &self,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<MembershipSplit, CoreError> {
        let group_id = group_id.trim();
        if group_id.is_empty() {
            return Err(CoreError::Validation("group id is required".to_string()));
        }
        let filter = compile::group_lookup_filter(group_id)?;
        let attrs = normalize::group_attributes(&self.attributes);

        let mut session = self.directory.connect().await?;
        let result = session
            .search(&self.group_base_dn, &filter, Scope::Subtree, &attrs)
            .await;
        close(&mut session).await;

        let group = result?
            .iter()
            .find_map(|e| normalize::normalize_group(e, &self.attributes))
            .ok_or_else(|| CoreError::NotFound(format!("group {:?}", group_id)))?;
        Ok(partition_membership(&group, &dedup_user_ids(user_ids)))
    }

    async fn add_members(
        &self,
        session: &mut D::Session,
        group_id: &str,
        filter: &Filter,
        user_ids: &[String],
    ) -> Result<MembershipReceipt, CoreError> {
        let groups = session
            .search(
                &self.group_base_dn,
                filter,
                Scope::Subtree,
                &[MEMBER_ATTRIBUTE.to_string()],
            )
            .await?;
        let group_dn = match groups.as_slice() {
            [] => return Err(CoreError::NotFound(format!("group {:?}", group_id))),
            [group] => group.dn.clone(),
            [first, ..] => {
                warn!(
                    "group {:?} matched {} entries, using {}",
                    group_id,
                    groups.len(),
                    first.dn
                );
                first.dn.clone()
            }
        };

        let mut added = Vec::new();
        let mut already_present = Vec::new();
        for user_id in user_ids {
            let mods = vec![Mod::Add(
                MEMBER_ATTRIBUTE.to_string(),
                HashSet::from([user_id.clone()]),
            )];
            let outcome = session.modify(&group_dn, mods).await.map_err(|e| {
                warn!("adding {} to {} failed: {}", user_id, group_dn, e);
                naming_user(e, user_id)
            })?;
            match outcome {
                ModifyOutcome::Applied => added.push(user_id.clone()),
                ModifyOutcome::AlreadyPresent => {
                    debug!("{} is already a member of {}", user_id, group_dn);
                    already_present.push(user_id.clone());
                }
            }
        }

        info!(
            "group {}: {} added, {} already members",
            group_dn,
            added.len(),
            already_present.len()
        );
        Ok(MembershipReceipt {
            group_id: group_id.to_string(),
            group_dn,
            added,
            already_present,
            timestamp: Utc::now(),
        })
    }
}

/// Prefix an error from a membership modify with the user it was for,
/// keeping its kind.
fn naming_user(err: CoreError, user_id: &str) -> CoreError {
    let msg = match &err {
        CoreError::ModifyFailed(msg) => format!("adding {}: {}", user_id, msg),
        other => format!("adding {}: {}", user_id, other),
    };
    match err.kind() {
        ErrorKind::Validation => CoreError::Validation(msg),
        ErrorKind::NotFound => CoreError::NotFound(msg),
        ErrorKind::Config => CoreError::Config(msg),
        ErrorKind::Directory => CoreError::ModifyFailed(msg),
    }
}

/// Trim ids, drop blanks and repeated ids, keep first-seen order.
fn dedup_user_ids(user_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    user_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

async fn close<S: DirectorySession>(session: &mut S) {
    if let Err(e) = session.close().await {
        warn!("failed to close directory session: {}", e);
    }
}

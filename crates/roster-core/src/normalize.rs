//! Turn raw directory entries into [`UserRecord`]s and [`GroupRecord`]s.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::attributes::AttributeMap;
use crate::dn;
use crate::entry::DirectoryEntry;
use crate::record::{GroupRecord, UserRecord};

/// Values directories and upstream tooling use in place of "no value".
const SENTINEL_VALUES: [&str; 5] = ["null", "NULL", "None", "undefined", "UNDEFINED"];

/// Identifier values that never name a real account, compared case-insensitively.
const INVALID_IDS: [&str; 3] = ["null", "none", "undefined"];

const POSIX_MEMBER_ATTRIBUTE: &str = "memberUid";
const AD_MEMBER_ATTRIBUTE: &str = "member";

/// Replace an absent or sentinel value with the empty string.
pub fn scrub(value: Option<&str>) -> String {
    match value {
        Some(v) if !SENTINEL_VALUES.contains(&v) => v.to_string(),
        _ => String::new(),
    }
}

/// Build a user record, or `None` when the entry lacks a usable id or e-mail.
pub fn normalize_user(entry: &DirectoryEntry, attributes: &AttributeMap) -> Option<UserRecord> {
    let fields: Vec<(String, String)> = attributes
        .iter()
        .map(|(field, attr)| (field.to_string(), scrub(entry.first_value(attr))))
        .collect();
    let record = UserRecord::new(fields);

    let id = record.id();
    if id.is_empty() || INVALID_IDS.iter().any(|bad| id.eq_ignore_ascii_case(bad)) {
        debug!("skipping {}: no usable id", entry.dn);
        return None;
    }
    if record.email().is_empty() {
        debug!("skipping {}: no e-mail", entry.dn);
        return None;
    }
    Some(record)
}

/// Attributes to request for a group search.
pub fn group_attributes(attributes: &AttributeMap) -> Vec<String> {
    let mut attrs: Vec<String> = ["cn", "gidNumber", POSIX_MEMBER_ATTRIBUTE, AD_MEMBER_ATTRIBUTE, "description"]
        .iter()
        .map(|a| a.to_string())
        .collect();
    if let Some(alt) = attributes.alternate_identifier() {
        if !attrs.iter().any(|a| a.eq_ignore_ascii_case(alt)) {
            attrs.push(alt.to_string());
        }
    }
    attrs
}

/// Build a group record. The id is taken from the alternate identifier
/// attribute, then `gidNumber`, then `cn`; an entry with none of them is skipped.
pub fn normalize_group(entry: &DirectoryEntry, attributes: &AttributeMap) -> Option<GroupRecord> {
    let cn = scrub(entry.first_value("cn"));
    let gid_raw = scrub(entry.first_value("gidNumber"));
    let alt = attributes
        .alternate_identifier()
        .map(|attr| scrub(entry.first_value(attr)))
        .unwrap_or_default();

    let id = [&alt, &gid_raw, &cn]
        .into_iter()
        .find(|v| !v.is_empty())
        .cloned();
    let Some(id) = id else {
        warn!("skipping group {}: no identifier attribute", entry.dn);
        return None;
    };

    let gid_number = if gid_raw.is_empty() {
        None
    } else {
        match gid_raw.trim().parse::<u32>() {
            Ok(gid) => Some(gid),
            Err(e) => {
                debug!("group {}: ignoring gidNumber {:?}: {}", entry.dn, gid_raw, e);
                None
            }
        }
    };

    let name = if cn.is_empty() { id.clone() } else { cn };

    Some(GroupRecord {
        id,
        name,
        description: scrub(entry.first_value("description")),
        gid_number,
        members: group_members(entry),
    })
}

/// Resolve member identifiers. POSIX `memberUid` values win when present;
/// otherwise the `CN` of every Active Directory `member` DN is used.
pub fn group_members(entry: &DirectoryEntry) -> Vec<String> {
    let mut members = BTreeSet::new();

    let posix: Vec<&String> = entry
        .values(POSIX_MEMBER_ATTRIBUTE)
        .unwrap_or_default()
        .iter()
        .filter(|v| !v.trim().is_empty())
        .collect();

    if !posix.is_empty() {
        members.extend(posix.into_iter().cloned());
    } else if let Some(dns) = entry.values(AD_MEMBER_ATTRIBUTE) {
        for member_dn in dns {
            match dn::common_name(member_dn) {
                Some(cn) => {
                    members.insert(cn.to_string());
                }
                None => warn!(
                    "group {}: cannot parse member DN {:?}, skipping",
                    entry.dn, member_dn
                ),
            }
        }
    }

    members.into_iter().collect()
}

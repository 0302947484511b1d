use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::attributes::LogicalField;

/// A person, flattened to logical field names. Absent values are empty strings.
///
/// Fields keep the order of the attribute mapping and serialize as a JSON
/// object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    fields: Vec<(String, String)>,
}

impl UserRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: LogicalField) -> &str {
        self.fields
            .iter()
            .find(|(name, _)| name == field.as_ref())
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.get(LogicalField::Id)
    }

    pub fn email(&self) -> &str {
        self.get(LogicalField::Email)
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl Serialize for UserRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A group as shown to the operator. `members` is sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "gidNumber")]
    pub gid_number: Option<u32>,
    pub members: Vec<String>,
}

impl GroupRecord {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

/// Values a record exposes to the post-filter.
pub trait Searchable {
    fn search_values(&self) -> Vec<Cow<'_, str>>;
}

impl Searchable for UserRecord {
    fn search_values(&self) -> Vec<Cow<'_, str>> {
        self.fields
            .iter()
            .map(|(_, v)| Cow::Borrowed(v.as_str()))
            .collect()
    }
}

impl Searchable for GroupRecord {
    fn search_values(&self) -> Vec<Cow<'_, str>> {
        let mut values = vec![
            Cow::Borrowed(self.id.as_str()),
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.description.as_str()),
        ];
        if let Some(gid) = self.gid_number {
            values.push(Cow::Owned(gid.to_string()));
        }
        values
    }
}

/// Selected users split by whether they already belong to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipSplit {
    pub members: Vec<String>,
    pub non_members: Vec<String>,
}

/// Split `selected` into current members and non-members of `group`,
/// keeping the selection order.
pub fn partition_membership(group: &GroupRecord, selected: &[String]) -> MembershipSplit {
    let (members, non_members): (Vec<String>, Vec<String>) = selected
        .iter()
        .cloned()
        .partition(|id| group.has_member(id));
    MembershipSplit {
        members,
        non_members,
    }
}

/// Join the e-mail addresses of the given users into a recipients line.
pub fn recipients(users: &[UserRecord]) -> String {
    users
        .iter()
        .map(|u| u.email())
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a successful membership submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipReceipt {
    pub group_id: String,
    pub group_dn: String,
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

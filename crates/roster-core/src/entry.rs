use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw directory entry: its DN and every returned attribute.
///
/// Attributes may be multi-valued; an attribute can be present with no values,
/// so presence and emptiness are queried separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: String, attributes: BTreeMap<String, Vec<String>>) -> Self {
        Self { dn, attributes }
    }

    pub fn from_search_entry(entry: ldap3::SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs.into_iter().collect(),
        }
    }

    /// Look up an attribute by name. Attribute names compare case-insensitively,
    /// as they do on the server.
    pub fn values(&self, attr: &str) -> Option<&[String]> {
        self.attributes
            .get(attr)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attr))
                    .map(|(_, vals)| vals)
            })
            .map(|vals| vals.as_slice())
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.values(attr).is_some()
    }

    /// Get the first value of an attribute, if present.
    pub fn first_value(&self, attr: &str) -> Option<&str> {
        self.values(attr)
            .and_then(|vals| vals.first())
            .map(|s| s.as_str())
    }

    /// Get all object classes for this entry.
    pub fn object_classes(&self) -> Vec<&str> {
        self.values("objectClass")
            .map(|vals| vals.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }
}

use std::str::FromStr;

use strum::{AsRefStr, Display, EnumString};
use tracing::debug;

use crate::error::CoreError;

/// Mapping applied when no explicit one is configured.
pub const DEFAULT_ATTRIBUTE_MAPPING: &str =
    "id:cn name:displayName email:mail jobtitle:title department:department uidNumber:uidNumber";

/// Application-level field names that can be mapped onto directory attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalField {
    Id,
    Name,
    Email,
    #[strum(serialize = "jobtitle")]
    JobTitle,
    Department,
    #[strum(serialize = "uidNumber")]
    UidNumber,
}

impl LogicalField {
    /// Fields whose attributes receive substring conditions in a user search.
    pub const SEARCHABLE: [LogicalField; 5] = [
        LogicalField::Id,
        LogicalField::Name,
        LogicalField::Email,
        LogicalField::JobTitle,
        LogicalField::Department,
    ];
}

/// Ordered mapping from logical field to directory attribute.
///
/// Built once from configuration and never mutated. `id` and `email` are
/// always mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMap {
    fields: Vec<(LogicalField, String)>,
    id_attribute: String,
    email_attribute: String,
    alternate_identifier: Option<String>,
}

impl AttributeMap {
    /// Parse whitespace-separated `logicalName:directoryAttribute` pairs.
    pub fn parse(mapping: &str) -> Result<Self, CoreError> {
        let mut fields: Vec<(LogicalField, String)> = Vec::new();

        for pair in mapping.split_whitespace() {
            let (logical, attr) = pair.split_once(':').ok_or_else(|| {
                CoreError::Config(format!("attribute mapping {:?} is missing ':'", pair))
            })?;
            if attr.is_empty() || attr.contains(':') {
                return Err(CoreError::Config(format!(
                    "attribute mapping {:?} has an invalid directory attribute",
                    pair
                )));
            }
            let field = LogicalField::from_str(logical).map_err(|_| {
                CoreError::Config(format!(
                    "attribute mapping {:?} names unknown field {:?}",
                    pair, logical
                ))
            })?;
            if fields.iter().any(|(f, _)| *f == field) {
                return Err(CoreError::Config(format!(
                    "field {:?} is mapped more than once",
                    logical
                )));
            }
            fields.push((field, attr.to_string()));
        }

        let lookup = |wanted: LogicalField| {
            fields
                .iter()
                .find(|(f, _)| *f == wanted)
                .map(|(_, a)| a.clone())
                .ok_or_else(|| {
                    CoreError::Config(format!("attribute mapping must include {:?}", wanted.as_ref()))
                })
        };
        let id_attribute = lookup(LogicalField::Id)?;
        let email_attribute = lookup(LogicalField::Email)?;

        let alternate_identifier = if id_attribute == "uid" {
            None
        } else {
            Some(id_attribute.clone())
        };

        debug!(
            "attribute map: {:?} alternate_identifier={:?}",
            fields, alternate_identifier
        );

        Ok(Self {
            fields,
            id_attribute,
            email_attribute,
            alternate_identifier,
        })
    }

    pub fn get(&self, field: LogicalField) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, a)| a.as_str())
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn email_attribute(&self) -> &str {
        &self.email_attribute
    }

    /// The mapped `id` attribute when it is something other than `uid`.
    /// Group records resolve their id through it first.
    pub fn alternate_identifier(&self) -> Option<&str> {
        self.alternate_identifier.as_deref()
    }

    /// Mapped pairs in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalField, &str)> {
        self.fields.iter().map(|(f, a)| (*f, a.as_str()))
    }

    /// Every mapped directory attribute, in configuration order.
    pub fn directory_attributes(&self) -> Vec<String> {
        self.fields.iter().map(|(_, a)| a.clone()).collect()
    }
}

impl FromStr for AttributeMap {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for AttributeMap {
    fn default() -> Self {
        let fields: Vec<(LogicalField, String)> = vec![
            (LogicalField::Id, "cn".to_string()),
            (LogicalField::Name, "displayName".to_string()),
            (LogicalField::Email, "mail".to_string()),
            (LogicalField::JobTitle, "title".to_string()),
            (LogicalField::Department, "department".to_string()),
            (LogicalField::UidNumber, "uidNumber".to_string()),
        ];
        Self {
            fields,
            id_attribute: "cn".to_string(),
            email_attribute: "mail".to_string(),
            alternate_identifier: Some("cn".to_string()),
        }
    }
}

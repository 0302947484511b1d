//! Compile tokenized queries into directory filters.

use tracing::debug;

use crate::attributes::{AttributeMap, LogicalField};
use crate::error::CoreError;
use crate::filter::Filter;
use crate::query::{ParsedQuery, Term};

const GROUP_OBJECT_CLASSES: [&str; 2] = ["posixGroup", "group"];

/// Characters that would alter the structure of a filter if they reached it.
const FILTER_METACHARACTERS: [(char, &str); 5] = [
    ('(', "opening parenthesis"),
    (')', "closing parenthesis"),
    ('\\', "backslash"),
    ('\0', "NUL character"),
    ('*', "wildcard"),
];

/// Reject a value that contains filter metacharacters.
pub fn check_filter_input(value: &str) -> Result<(), CoreError> {
    for (ch, name) in FILTER_METACHARACTERS {
        if value.contains(ch) {
            return Err(CoreError::InvalidFilterInput {
                token: value.to_string(),
                reason: format!("contains a {}", name),
            });
        }
    }
    Ok(())
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// A filter that matches no entry of the given object class.
fn match_nothing(base: Filter) -> Filter {
    Filter::and([base, Filter::not(Filter::present("objectClass"))])
}

fn searchable_terms(query: &ParsedQuery) -> Result<Vec<&Term>, CoreError> {
    let terms: Vec<&Term> = query.non_empty_terms().collect();
    for term in &terms {
        check_filter_input(&term.text)?;
    }
    Ok(terms)
}

/// Build the people filter.
///
/// Each term becomes an OR of substring conditions over the searchable mapped
/// attributes, plus an exact `uidNumber` condition for numeric terms. Terms are
/// ANDed together and with `objectClass=person`. Quoting is ignored here; it is
/// enforced afterwards by [`crate::matcher::QueryMatcher`].
pub fn user_filter(query: &ParsedQuery, attributes: &AttributeMap) -> Result<Filter, CoreError> {
    let person = Filter::equal("objectClass", "person");
    let terms = searchable_terms(query)?;
    if terms.is_empty() {
        return Ok(match_nothing(person));
    }

    let searchable: Vec<&str> = LogicalField::SEARCHABLE
        .iter()
        .filter_map(|f| attributes.get(*f))
        .collect();
    let uid_number = attributes.get(LogicalField::UidNumber);

    let mut clauses = vec![person];
    for term in terms {
        let mut conditions: Vec<Filter> = searchable
            .iter()
            .map(|attr| Filter::contains(*attr, term.text.as_str()))
            .collect();
        if let Some(attr) = uid_number.filter(|_| is_numeric(&term.text)) {
            conditions.push(Filter::equal(attr, term.text.as_str()));
        }
        clauses.push(Filter::Or(conditions));
    }

    let filter = Filter::And(clauses);
    debug!("user filter: {}", filter);
    Ok(filter)
}

/// Attributes a group search term is compared against: the alternate
/// identifier (when one is configured) and `cn`.
fn group_term_attributes(attributes: &AttributeMap) -> Vec<&str> {
    let mut attrs = Vec::with_capacity(2);
    if let Some(alt) = attributes.alternate_identifier() {
        if !alt.eq_ignore_ascii_case("cn") {
            attrs.push(alt);
        }
    }
    attrs.push("cn");
    attrs
}

/// Build the group filter.
///
/// Quoted terms compile to exact conditions, unquoted ones to substring
/// conditions. Numeric terms also match `gidNumber` exactly. Both POSIX and
/// Active Directory group classes are accepted.
pub fn group_filter(query: &ParsedQuery, attributes: &AttributeMap) -> Result<Filter, CoreError> {
    let group_class = Filter::or(
        GROUP_OBJECT_CLASSES
            .iter()
            .map(|class| Filter::equal("objectClass", *class)),
    );
    let terms = searchable_terms(query)?;
    if terms.is_empty() {
        return Ok(match_nothing(group_class));
    }

    let term_attrs = group_term_attributes(attributes);

    let mut clauses = vec![group_class];
    for term in terms {
        let text = term.text.as_str();
        let mut conditions: Vec<Filter> = term_attrs
            .iter()
            .map(|attr| {
                if term.quoted {
                    Filter::equal(*attr, text)
                } else {
                    Filter::contains(*attr, text)
                }
            })
            .collect();
        if is_numeric(text) {
            conditions.push(Filter::equal("gidNumber", text));
        }
        clauses.push(Filter::Or(conditions));
    }

    let filter = Filter::And(clauses);
    debug!("group filter: {}", filter);
    Ok(filter)
}

/// Exact lookup of a POSIX group by `cn`, used before modifying membership.
pub fn group_lookup_filter(group_id: &str) -> Result<Filter, CoreError> {
    check_filter_input(group_id)?;
    Ok(Filter::and([
        Filter::equal("objectClass", "posixGroup"),
        Filter::equal("cn", group_id),
    ]))
}

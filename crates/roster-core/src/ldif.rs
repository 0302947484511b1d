//! Minimal LDIF reader used to seed the offline directory.

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine;

use crate::entry::DirectoryEntry;
use crate::error::CoreError;

/// Read entries from an LDIF file.
pub fn read(path: &Path) -> Result<Vec<DirectoryEntry>, CoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Import(format!("failed to read {}: {}", path.display(), e)))?;
    parse(&content)
}

/// Parse LDIF content. Blank lines separate entries; `#` comments and the
/// `version:` line are ignored; folded lines and `::` base64 values are
/// decoded.
pub fn parse(content: &str) -> Result<Vec<DirectoryEntry>, CoreError> {
    let mut entries = Vec::new();
    let mut dn: Option<String> = None;
    let mut attrs: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (index, line) in unfold(content).iter().enumerate() {
        let line = line.trim_end();

        if line.is_empty() {
            if let Some(dn) = dn.take() {
                entries.push(DirectoryEntry::new(dn, std::mem::take(&mut attrs)));
            }
            continue;
        }
        if line.starts_with('#') || (dn.is_none() && line.starts_with("version:")) {
            continue;
        }

        let (attr, value) = parse_line(line)
            .ok_or_else(|| CoreError::Import(format!("line {}: cannot parse {:?}", index + 1, line)))?;

        if attr.eq_ignore_ascii_case("dn") {
            if let Some(prev) = dn.replace(value) {
                entries.push(DirectoryEntry::new(prev, std::mem::take(&mut attrs)));
            }
        } else if dn.is_none() {
            return Err(CoreError::Import(format!(
                "line {}: attribute {:?} before any dn",
                index + 1,
                attr
            )));
        } else {
            attrs.entry(attr).or_default().push(value);
        }
    }

    if let Some(dn) = dn {
        entries.push(DirectoryEntry::new(dn, attrs));
    }

    Ok(entries)
}

/// Split `attr: value`, `attr:: base64` or a bare `attr:`.
fn parse_line(line: &str) -> Option<(String, String)> {
    let (attr, rest) = line.split_once(':')?;
    if attr.is_empty() || attr.contains(' ') {
        return None;
    }
    let value = match rest.strip_prefix(':') {
        Some(b64) => {
            let b64 = b64.trim();
            base64::engine::general_purpose::STANDARD
                .decode(b64)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())?
        }
        None => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
    };
    Some((attr.to_string(), value))
}

/// Join continuation lines (those starting with a single space) onto the
/// previous line.
fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in content.lines() {
        match (line.strip_prefix(' '), lines.last_mut()) {
            (Some(cont), Some(prev)) if !prev.is_empty() => prev.push_str(cont),
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let content = "\
version: 1
# people
dn: uid=jdoe,ou=people,dc=example,dc=com
objectClass: person
cn: jdoe
mail: jdoe@example.com

dn: cn=eng,ou=groups,dc=example,dc=com
objectClass: posixGroup
memberUid: jdoe
memberUid: asmith
";
        let entries = parse(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].first_value("mail"), Some("jdoe@example.com"));
        assert_eq!(entries[1].values("memberUid").unwrap().len(), 2);
    }

    #[test]
    fn test_folded_and_base64() {
        let content = "\
dn: cn=Zoe,dc=example
description: a long
  folded value
displayName:: Wm/DqyBEb2U=
title:
";
        let entries = parse(content).unwrap();
        let e = &entries[0];
        assert_eq!(e.first_value("description"), Some("a long folded value"));
        assert_eq!(e.first_value("displayName"), Some("Zoë Doe"));
        assert_eq!(e.first_value("title"), Some(""));
    }

    #[test]
    fn test_attribute_before_dn_is_error() {
        assert!(parse("cn: orphan\n").is_err());
    }

    #[test]
    fn test_unparsable_line_is_error() {
        let err = parse("dn: cn=x\nnot an attribute\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {}", err);
    }
}

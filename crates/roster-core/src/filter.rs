use std::fmt;

use ldap3::ldap_escape;

use crate::entry::DirectoryEntry;

/// A directory search filter expression.
///
/// Values are stored unescaped and escaped once, when the expression is
/// rendered to RFC 4515 text with `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// `(attr=value)`
    Equal { attr: String, value: String },
    /// `(attr=*value*)`
    Contains { attr: String, value: String },
    /// `(attr=*)`
    Present(String),
}

impl Filter {
    pub fn equal(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equal {
            attr: attr.into(),
            value: value.into(),
        }
    }

    pub fn contains(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            attr: attr.into(),
            value: value.into(),
        }
    }

    pub fn present(attr: impl Into<String>) -> Self {
        Filter::Present(attr.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate the filter against an entry the way a directory server with
    /// case-insensitive matching rules would.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Equal { attr, value } => entry
                .values(attr)
                .map(|vals| {
                    let wanted = value.to_lowercase();
                    vals.iter().any(|v| v.to_lowercase() == wanted)
                })
                .unwrap_or(false),
            Filter::Contains { attr, value } => {
                let needle = value.to_lowercase();
                entry
                    .values(attr)
                    .map(|vals| vals.iter().any(|v| v.to_lowercase().contains(&needle)))
                    .unwrap_or(false)
            }
            Filter::Present(attr) => entry
                .values(attr)
                .map(|vals| !vals.is_empty())
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) => {
                write!(f, "(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Not(filter) => write!(f, "(!{})", filter),
            Filter::Equal { attr, value } => write!(f, "({}={})", attr, ldap_escape(value)),
            Filter::Contains { attr, value } => {
                write!(f, "({}=*{}*)", attr, ldap_escape(value))
            }
            Filter::Present(attr) => write!(f, "({}=*)", attr),
        }
    }
}

/// Validate that a string is a well-formed LDAP search filter per RFC 4515.
///
/// ```text
/// filter     = "(" filtercomp ")"
/// filtercomp = and / or / not / item
/// and        = "&" filterlist
/// or         = "|" filterlist
/// not        = "!" filter
/// filterlist = 1*filter
/// item       = attr filtertype value
/// filtertype = "=" / "~=" / ">=" / "<="
/// ```
pub fn validate_filter(filter: &str) -> Result<(), String> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Err("Filter cannot be empty".to_string());
    }

    let mut cursor = Cursor {
        input: filter.as_bytes(),
        pos: 0,
    };
    cursor.filter()?;
    if cursor.pos != cursor.input.len() {
        return Err(format!(
            "Unexpected characters after filter at position {}",
            cursor.pos + 1
        ));
    }
    Ok(())
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        if self.peek() != Some(byte) {
            return Err(format!(
                "Expected '{}' at position {}",
                byte as char,
                self.pos + 1
            ));
        }
        self.pos += 1;
        Ok(())
    }

    fn filter(&mut self) -> Result<(), String> {
        self.expect(b'(')?;
        match self.peek() {
            None => {
                return Err(format!(
                    "Unexpected end of filter after '(' at position {}",
                    self.pos
                ))
            }
            Some(op @ (b'&' | b'|')) => {
                self.pos += 1;
                self.filter_list(op as char)?;
            }
            Some(b'!') => {
                self.pos += 1;
                self.filter()?;
            }
            Some(_) => self.item()?,
        }
        self.expect(b')')
    }

    fn filter_list(&mut self, op: char) -> Result<(), String> {
        if self.peek() != Some(b'(') {
            return Err(format!(
                "Empty filter list in '{}' operator at position {}",
                op,
                self.pos + 1
            ));
        }
        while self.peek() == Some(b'(') {
            self.filter()?;
        }
        Ok(())
    }

    fn item(&mut self) -> Result<(), String> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b';')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(format!(
                "Expected attribute name after '(' at position {}",
                start + 1
            ));
        }

        match (self.peek(), self.input.get(self.pos + 1).copied()) {
            (Some(b'~' | b'>' | b'<'), Some(b'=')) => self.pos += 2,
            (Some(b'='), _) => self.pos += 1,
            _ => {
                return Err(
                    "Expected comparison operator (=, ~=, >=, <=) after attribute name"
                        .to_string(),
                )
            }
        }

        while let Some(b) = self.peek() {
            match b {
                b')' => break,
                b'(' => {
                    return Err(format!(
                        "Unescaped '(' in value at position {}",
                        self.pos + 1
                    ))
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.input.len());
        Ok(())
    }
}

//! Splitting a free-text search query into quoted and unquoted terms.
//!
//! `alice "bob smith" 42` yields the quoted term `bob smith` and the unquoted
//! terms `alice` and `42`. A term opens a quote only at its first character and
//! only when a matching closing quote follows; otherwise the quote mark is kept
//! as part of an ordinary unquoted term.

/// One search term and whether it was written inside quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub text: String,
    pub quoted: bool,
}

/// A tokenized query. Terms keep their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    terms: Vec<Term>,
}

impl ParsedQuery {
    pub fn parse(query: &str) -> Self {
        let mut terms = Vec::new();
        let mut rest = query;

        loop {
            rest = rest.trim_start();
            let Some(first) = rest.chars().next() else {
                break;
            };

            if first == '"' || first == '\'' {
                let body = &rest[first.len_utf8()..];
                if let Some(close) = body.find(first) {
                    terms.push(Term {
                        text: body[..close].to_string(),
                        quoted: true,
                    });
                    rest = &body[close + first.len_utf8()..];
                    continue;
                }
            }

            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            terms.push(Term {
                text: rest[..end].to_string(),
                quoted: false,
            });
            rest = &rest[end..];
        }

        Self { terms }
    }

    /// All terms, quoted and unquoted, in query order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Terms that carry at least one non-whitespace character.
    pub fn non_empty_terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().filter(|t| !t.text.trim().is_empty())
    }

    pub fn quoted(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|t| t.quoted)
            .map(|t| t.text.as_str())
            .collect()
    }

    pub fn unquoted(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|t| !t.quoted)
            .map(|t| t.text.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty_terms().next().is_none()
    }
}

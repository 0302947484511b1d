//! Precision pass over normalized records.
//!
//! Directory substring filters only give coarse recall: `*bob*` also hits
//! `Bobby`, and the directory has no notion of a quoted whole-word term. Every
//! record is therefore re-checked here before it is returned.

use regex::{Regex, RegexBuilder};

use crate::error::CoreError;
use crate::query::ParsedQuery;
use crate::record::Searchable;

#[derive(Debug)]
pub struct QueryMatcher {
    words: Vec<Regex>,
    substrings: Vec<String>,
}

impl QueryMatcher {
    pub fn new(query: &ParsedQuery) -> Result<Self, CoreError> {
        let mut words = Vec::new();
        let mut substrings = Vec::new();

        for term in query.non_empty_terms() {
            if term.quoted {
                words.push(word_pattern(&term.text)?);
            } else {
                substrings.push(term.text.to_lowercase());
            }
        }

        Ok(Self { words, substrings })
    }

    /// True when every quoted term occurs as a whole word, and every unquoted
    /// term as a substring, in at least one of the record's values.
    pub fn matches<R: Searchable>(&self, record: &R) -> bool {
        let values = record.search_values();
        let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();

        self.words
            .iter()
            .all(|re| values.iter().any(|v| re.is_match(v)))
            && self
                .substrings
                .iter()
                .all(|needle| lowered.iter().any(|v| v.contains(needle.as_str())))
    }

    /// Keep only the records that satisfy every term.
    pub fn retain<R: Searchable>(&self, records: Vec<R>) -> Vec<R> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Case-insensitive match of `term` bounded by non-word characters or the
/// ends of the value.
fn word_pattern(term: &str) -> Result<Regex, CoreError> {
    RegexBuilder::new(&format!(r"(?:^|\W){}(?:\W|$)", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .map_err(|e| CoreError::InvalidFilterInput {
            token: term.to_string(),
            reason: e.to_string(),
        })
}

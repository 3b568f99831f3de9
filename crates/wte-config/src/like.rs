//! SQL-style LIKE patterns.
//!
//! `%` matches any run of characters (including none) and `_` matches exactly
//! one character. Everything else matches literally and case-sensitively.

use regex::Regex;
use std::fmt;

/// A compiled LIKE pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '%' | '_' => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(if ch == '%' { "(?s:.*)" } else { "(?s:.)" });
                }
                other => literal.push(other),
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

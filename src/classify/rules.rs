// src/classify/rules.rs

//! Ordered pattern → classification tables.
//!
//! Rules are evaluated top to bottom and the first match wins, so more
//! specific phrases must come before generic ones. New phrases only need a
//! new row.

use regex::Regex;
use tracing::warn;

#[derive(Debug)]
pub struct RuleTable<T> {
    rules: Vec<(Regex, T)>,
}

impl<T: Copy> RuleTable<T> {
    /// Compile a table. Invalid patterns are logged and dropped.
    pub fn new(rows: &[(&str, T)]) -> Self {
        let rules = rows
            .iter()
            .filter_map(|(pattern, value)| match Regex::new(pattern) {
                Ok(re) => Some((re, *value)),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "invalid classification pattern; ignoring");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn first_match(&self, text: &str) -> Option<T> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, value)| *value)
    }
}

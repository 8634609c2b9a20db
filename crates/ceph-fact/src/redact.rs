//! Scrubbing of secret-looking values from the cluster configuration dump.

use crate::error::ConfigError;
use regex::Regex;
use serde_json::Value;

/// Filters always applied to `config dump` entries.
pub const DEFAULT_FILTERS: &[&str] = &["(?i)password", "(?i)key", "(?i)cert"];

/// Replacement for hidden values.
pub const PLACEHOLDER: &str = "** HIDDEN **";

/// Fields of a `config dump` entry that are matched against the filters.
const MATCHED_FIELDS: &[&str] = &["name", "section", "value"];

/// Compiled redaction filters.
#[derive(Debug, Clone)]
pub struct Redactor {
    filters: Vec<Regex>,
}

impl Redactor {
    /// The default filters plus `extra`. Fails on the first pattern that is
    /// not a valid regular expression.
    pub fn new(extra: &[String]) -> Result<Self, ConfigError> {
        let patterns = DEFAULT_FILTERS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned());

        let mut filters = Vec::new();
        for pattern in patterns {
            let compiled = Regex::new(&pattern).map_err(|source| ConfigError::InvalidFilter {
                pattern: pattern.clone(),
                source,
            })?;
            filters.push(compiled);
        }
        Ok(Self { filters })
    }

    /// Number of active filters.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    fn matches(&self, text: &str) -> bool {
        self.filters.iter().any(|f| f.is_match(text))
    }

    /// Hides the `value` of every entry whose name, section or value matches
    /// a filter. Anything that is not a list of objects is returned as is.
    pub fn redact_config(&self, mut dump: Value) -> Value {
        let entries = match dump.as_array_mut() {
            Some(entries) => entries,
            None => return dump,
        };

        for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
            let hit = MATCHED_FIELDS
                .iter()
                .filter_map(|field| entry.get(*field).and_then(Value::as_str))
                .any(|text| self.matches(text));
            if hit {
                entry.insert("value".to_string(), Value::String(PLACEHOLDER.to_string()));
            }
        }
        dump
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            filters: DEFAULT_FILTERS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

//! Substitution tables and naming-template rendering.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RunError, RunResult};

/// Matches the iteration placeholder of a case naming template.
fn iteration_placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%d|<ITER>").expect("static pattern compiles"))
}

/// Whether a case naming template carries an iteration placeholder.
pub fn has_iteration_placeholder(template: &str) -> bool {
    iteration_placeholder().is_match(template)
}

/// Render a case naming template such as `iter-%d` for one iteration.
pub fn render_case_name(template: &str, iteration: u32) -> RunResult<String> {
    if !has_iteration_placeholder(template) {
        return Err(RunError::InvalidConfiguration(format!(
            "case naming template '{}' has no iteration placeholder (%d or <ITER>)",
            template
        )));
    }
    Ok(iteration_placeholder()
        .replace_all(template, iteration.to_string().as_str())
        .into_owned())
}

/// Fill positional `%d` placeholders: the first is the realization, the
/// second the iteration. Further occurrences are left alone.
pub(crate) fn fill_positional(template: &str, realization: usize, iteration: u32) -> String {
    template
        .replacen("%d", &realization.to_string(), 1)
        .replacen("%d", &iteration.to_string(), 1)
}

/// Ordered key/value table applied during path and name resolution.
///
/// Keys are applied in insertion order; inserting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionList {
    entries: Vec<(String, String)>,
}

impl SubstitutionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply every substitution to `input`.
    pub fn substitute(&self, input: &str) -> String {
        self.entries
            .iter()
            .fold(input.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = SubstitutionList::new();
        for (key, value) in iter {
            list.insert(key, value);
        }
        list
    }
}

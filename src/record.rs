use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Separator between a category and its main key in a grouped field.
pub const GROUP_SEPARATOR: &str = " - ";

/// Field the datastore keys records on.
pub const ISO_CODE_FIELD: &str = "ISO code";

/// Country token taken from a guideline URL path (`/en-us/guidelines/<code>/sms`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: impl Into<String>) -> Self {
        CountryCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CountryCode {
    fn from(s: &str) -> Self {
        CountryCode(s.to_string())
    }
}

/// Field/value pairs as scraped from one page, in document order.
///
/// Re-inserting a key replaces its value but keeps the position where the
/// key was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPairs {
    pairs: IndexMap<String, String>,
}

impl RawPairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawPairs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut raw = RawPairs::new();
        for (k, v) in iter {
            raw.insert(k, v);
        }
        raw
    }
}

/// Shape of a cleaned field key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey<'a> {
    /// Scalar attribute, e.g. `ISO code`.
    Simple(&'a str),
    /// `<category> - <main key>`, e.g. `Short code - Dialing code`.
    Grouped { category: &'a str, key: &'a str },
}

impl<'a> FieldKey<'a> {
    pub fn parse(field: &'a str) -> Self {
        match field.split_once(GROUP_SEPARATOR) {
            Some((category, key)) => FieldKey::Grouped {
                category: category.trim(),
                key,
            },
            None => FieldKey::Simple(field),
        }
    }

    pub fn category(&self) -> Option<&'a str> {
        match self {
            FieldKey::Simple(_) => None,
            FieldKey::Grouped { category, .. } => Some(category),
        }
    }
}

/// Final per-country record with a deterministic field order.
///
/// Built only by [`crate::normalize::normalize`], so iteration order always
/// follows the canonical simple-key order followed by category buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: IndexMap<String, String>,
}

impl NormalizedRecord {
    pub(crate) fn push(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of the `ISO code` field, if present and non-empty.
    pub fn iso_code(&self) -> Option<&str> {
        self.get(ISO_CODE_FIELD).filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flatten back into raw pairs, e.g. to re-normalize a stored record.
    pub fn to_raw(&self) -> RawPairs {
        self.iter().collect()
    }
}

// ── Tests ──

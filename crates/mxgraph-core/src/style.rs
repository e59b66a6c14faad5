use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One `key[=value]` segment of a style string. `value` is `None` for bare
/// flag tokens such as shape names (`ellipse`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleEntry {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Parsed form of the semicolon-delimited style attribute of a cell.
///
/// Entries keep their parse/insertion order and are never deduplicated, so
/// `style.to_string()` reproduces a canonical (`;`-terminated) input exactly.
/// Lookups return the last occurrence of a key, which is the one draw.io
/// applies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Style {
    entries: Vec<StyleEntry>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsing never fails: a segment with several `=` splits on the first.
    pub fn parse(s: &str) -> Self {
        let mut segments: Vec<&str> = s.trim().split(';').map(str::trim).collect();
        if segments.last() == Some(&"") {
            segments.pop();
        }

        let entries = segments
            .into_iter()
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) => StyleEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                },
                None => StyleEntry {
                    key: segment.to_string(),
                    value: None,
                },
            })
            .collect();
        Self { entries }
    }

    /// `Some(None)` for a flag, `Some(Some(v))` for a value, `None` when the
    /// key is absent.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_deref())
    }

    /// Value of `key`, flattening flags and absence to `None`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.upsert(key.into(), Some(value.to_string()));
    }

    pub fn set_flag(&mut self, key: impl Into<String>) {
        self.upsert(key.into(), None);
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.set_flag(key);
        self
    }

    /// Removes every occurrence of `key`, returning the last removed value.
    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        let removed = self.get(key).map(|v| v.map(str::to_string));
        self.entries.retain(|e| e.key != key);
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn upsert(&mut self, key: String, value: Option<String>) {
        match self.entries.iter_mut().rev().find(|e| e.key == key) {
            Some(existing) => existing.value = value,
            None => self.entries.push(StyleEntry { key, value }),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry.value.as_deref() {
                Some(value) => write!(f, "{}={};", entry.key, value)?,
                None => write!(f, "{};", entry.key)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Style {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Style {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(key, value)| StyleEntry {
                key: key.into(),
                value,
            })
            .collect();
        Self { entries }
    }
}

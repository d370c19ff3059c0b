//! Query arguments and their layering rules.
//!
//! Every request is described by a [`QueryArgs`] map. Maps are combined with
//! [`merge`], where a later layer overrides an earlier one key by key:
//!
//! | Layer            | Purpose                                  | Part of cache key |
//! |------------------|------------------------------------------|-------------------|
//! | client identity  | `tool`, `email`                          | no                |
//! | default args     | configured once per client               | yes               |
//! | per-call args    | supplied to each endpoint call           | yes               |
//!
//! Keys are kept sorted, so two maps built in different insertion orders are
//! indistinguishable once constructed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single argument value.
///
/// The variant is significant for cache identity: `7157` and `"7157"` are
/// sent identically on the wire but serialize differently, so they may map to
/// different cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A sorted map of query arguments.
///
/// # Examples
///
/// ```
/// use eutils::args::QueryArgs;
///
/// let args = QueryArgs::new()
///     .with("term", "VEGF")
///     .with("db", "gene");
///
/// let keys: Vec<_> = args.iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec!["db", "term"]);
/// assert_eq!(args.to_string(), "db=gene;term=VEGF");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryArgs {
    inner: BTreeMap<String, ArgValue>,
}

impl QueryArgs {
    /// Creates an empty argument map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an argument, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.inner.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the map as `application/x-www-form-urlencoded` fields.
    pub fn to_form(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryArgs
where
    K: Into<String>,
    V: Into<ArgValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

impl fmt::Display for QueryArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// Combines argument layers in order; on key collision the later layer wins.
pub fn merge<'a>(layers: impl IntoIterator<Item = &'a QueryArgs>) -> QueryArgs {
    let mut merged = QueryArgs::new();
    for layer in layers {
        for (k, v) in &layer.inner {
            merged.inner.insert(k.clone(), v.clone());
        }
    }
    merged
}

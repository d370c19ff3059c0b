//! Reply header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name.
///
/// # Examples
///
/// ```
/// use eutils::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json; charset=UTF-8");
///
/// assert_eq!(headers.get("content-type"), Some("application/json; charset=UTF-8"));
/// assert_eq!(headers.media_type(), Some("application/json".to_owned()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `Content-Type` media type, lowercased and without parameters.
    ///
    /// `"Application/JSON; charset=UTF-8"` yields `"application/json"`.
    pub fn media_type(&self) -> Option<String> {
        let raw = self.get("content-type")?;
        let essence = raw.split(';').next().unwrap_or(raw).trim();
        Some(essence.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<&reqwest::header::HeaderMap> for Headers {
    /// Copies a reqwest header map. Values that are not visible ASCII are dropped.
    fn from(map: &reqwest::header::HeaderMap) -> Self {
        let mut headers = Self::with_capacity(map.len());
        for (name, value) in map {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str(), value);
            }
        }
        headers
    }
}

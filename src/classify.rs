//! Reply classification.
//!
//! The remote service does not report failures consistently: a rejected
//! query may arrive as an error status with an XML or JSON body, or as
//! `200 OK` with an `<ERROR>` element embedded in the payload. [`classify`]
//! folds all of these into one [`Classification`].
//!
//! Rules, first match wins:
//!
//! 1. Error status: JSON bodies yield their `error` field, anything else is
//!    parsed as markup for an `ERROR` element.
//! 2. Success status but the body contains `<error>` or `<ERROR>`: parsed as
//!    markup for an `ERROR` element.
//! 3. The body is the access-denied page.
//! 4. Success. A `meta` element with `content="no-cache"` makes the payload
//!    ineligible for caching. A body that mentions `no-cache` but cannot be
//!    parsed is never cached either.
//!
//! A body that cannot be parsed in steps 1 and 2 is a malformed response and
//! the parse failure is kept in the message.

use std::fmt;

use tracing::debug;

use crate::http::Reply;
use crate::markup::Document;

/// Marker of the remote service's access-denied page.
pub const ACCESS_DENIED_MARKER: &str = r#"<h1 class="error">Access Denied</h1>"#;

/// Substring checked before parsing a body for the no-cache marker.
const NO_CACHE_TOKEN: &str = "no-cache";

const UNKNOWN_ERROR: &str = "Unknown Error";

/// Why a query failed, as decided by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote service explicitly rejected the query.
    RequestRejected,
    /// The remote service returned its access-denied page.
    AccessDenied,
    /// A reply expected to carry error detail could not be parsed.
    MalformedResponse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RequestRejected => "request rejected",
            Self::AccessDenied => "access denied",
            Self::MalformedResponse => "malformed response",
        })
    }
}

/// Result of classifying one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success { cacheable: bool },
    Failure { kind: ErrorKind, message: String },
}

impl Classification {
    fn rejected(message: impl Into<String>) -> Self {
        Self::Failure {
            kind: ErrorKind::RequestRejected,
            message: message.into(),
        }
    }

    fn malformed(detail: impl fmt::Display) -> Self {
        Self::Failure {
            kind: ErrorKind::MalformedResponse,
            message: format!("error parsing reply: {detail}"),
        }
    }
}

/// Classifies `reply`, received for a request to `url`.
///
/// `url` is only used in the access-denied message and must not carry
/// credentials.
///
/// # Examples
///
/// ```
/// use eutils::classify::{classify, Classification, ErrorKind};
/// use eutils::http::Reply;
///
/// let reply = Reply::new(400, "Bad Request").body("<eInfoResult><ERROR>bad database</ERROR></eInfoResult>");
/// assert_eq!(
///     classify("https://example.org/einfo.fcgi", &reply),
///     Classification::Failure { kind: ErrorKind::RequestRejected, message: "bad database".into() },
/// );
/// ```
pub fn classify(url: &str, reply: &Reply) -> Classification {
    if !reply.is_ok() {
        if reply.header_map().media_type().as_deref() == Some("application/json") {
            return classify_json_error(reply);
        }
        return classify_markup_error(reply);
    }

    let text = reply.text();

    if text.contains("<error>") || text.contains("<ERROR>") {
        return classify_markup_error(reply);
    }

    if text.contains(ACCESS_DENIED_MARKER) {
        return Classification::Failure {
            kind: ErrorKind::AccessDenied,
            message: format!("Access Denied: {url}"),
        };
    }

    Classification::Success {
        cacheable: !is_marked_no_cache(&text, reply),
    }
}

fn classify_json_error(reply: &Reply) -> Classification {
    let value: serde_json::Value = match serde_json::from_slice(reply.bytes()) {
        Ok(value) => value,
        Err(e) => return Classification::malformed(e),
    };
    match value.get("error") {
        Some(serde_json::Value::String(message)) => Classification::rejected(message.as_str()),
        Some(other) => Classification::rejected(other.to_string()),
        None => Classification::malformed("JSON reply has no `error` field"),
    }
}

fn classify_markup_error(reply: &Reply) -> Classification {
    match Document::parse(reply.bytes()) {
        Ok(doc) => {
            let message = doc
                .find_ignore_case("ERROR")
                .map(|e| e.text())
                .filter(|t| !t.is_empty())
                .unwrap_or(UNKNOWN_ERROR);
            Classification::rejected(message)
        }
        Err(e) => Classification::malformed(e),
    }
}

// Only bodies containing the token are parsed. Once the token is present, a
// body that does not parse (typically HTML with void `<meta>` tags) counts as
// marked.
fn is_marked_no_cache(text: &str, reply: &Reply) -> bool {
    if !text.contains(NO_CACHE_TOKEN) {
        return false;
    }
    match Document::parse(reply.bytes()) {
        Ok(doc) => doc.has_attribute_value("meta", "content", NO_CACHE_TOKEN),
        Err(e) => {
            debug!(error = %e, "no-cache token in an unparseable body; not caching");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

    fn failure(c: Classification) -> (ErrorKind, String) {
        match c {
            Classification::Failure { kind, message } => (kind, message),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn rejected_query_with_error_status() {
        let reply = Reply::new(400, "Bad Request")
            .header("Content-Type", "text/xml")
            .body("<eSearchResult><ERROR>bad database</ERROR></eSearchResult>");
        assert_eq!(
            failure(classify(URL, &reply)),
            (ErrorKind::RequestRejected, "bad database".to_owned())
        );
    }

    #[test]
    fn error_status_without_error_element() {
        let reply = Reply::new(500, "Internal Server Error").body("<eSearchResult/>");
        assert_eq!(
            failure(classify(URL, &reply)),
            (ErrorKind::RequestRejected, "Unknown Error".to_owned())
        );
    }

    #[test]
    fn json_error_body() {
        let reply = Reply::new(429, "Too Many Requests")
            .header("Content-Type", "application/json")
            .body(r#"{"error":"API rate limit exceeded","count":"11"}"#);
        assert_eq!(
            failure(classify(URL, &reply)),
            (ErrorKind::RequestRejected, "API rate limit exceeded".to_owned())
        );
    }

    #[test]
    fn json_without_error_field_is_malformed() {
        let reply = Reply::new(400, "Bad Request")
            .header("Content-Type", "application/json; charset=utf-8")
            .body(r#"{"status":"bad"}"#);
        let (kind, _) = failure(classify(URL, &reply));
        assert_eq!(kind, ErrorKind::MalformedResponse);
    }

    #[test]
    fn unparseable_error_body_keeps_parse_detail() {
        let reply = Reply::new(502, "Bad Gateway").body("upstream connect error");
        let (kind, message) = failure(classify(URL, &reply));
        assert_eq!(kind, ErrorKind::MalformedResponse);
        assert!(message.contains("no root element"), "{message}");
    }

    #[test]
    fn embedded_error_despite_ok_status() {
        let reply = Reply::ok().body(
            "<eSearchResult><error>Invalid query</error><Count>0</Count></eSearchResult>",
        );
        assert_eq!(
            failure(classify(URL, &reply)),
            (ErrorKind::RequestRejected, "Invalid query".to_owned())
        );
    }

    #[test]
    fn embedded_error_in_broken_markup_is_malformed() {
        let reply = Reply::ok().body("<eSearchResult><ERROR>oops</eSearchResult>");
        let (kind, _) = failure(classify(URL, &reply));
        assert_eq!(kind, ErrorKind::MalformedResponse);
    }

    #[test]
    fn access_denied_page() {
        let reply = Reply::ok().body(
            r#"<html><body><h1 class="error">Access Denied</h1></body></html>"#,
        );
        assert_eq!(
            failure(classify(URL, &reply)),
            (ErrorKind::AccessDenied, format!("Access Denied: {URL}"))
        );
    }

    #[test]
    fn plain_success_is_cacheable() {
        let reply = Reply::ok().body("<eSearchResult><Count>3</Count></eSearchResult>");
        assert_eq!(
            classify(URL, &reply),
            Classification::Success { cacheable: true }
        );
    }

    #[test]
    fn no_cache_meta_is_not_cacheable() {
        let reply = Reply::ok().body(
            r#"<html><head><meta http-equiv="Cache-Control" content="no-cache"/></head><body/></html>"#,
        );
        assert_eq!(
            classify(URL, &reply),
            Classification::Success { cacheable: false }
        );
    }

    #[test]
    fn html_no_cache_page_with_void_meta_is_not_cacheable() {
        let reply = Reply::ok().body(
            r#"<!DOCTYPE html><html><head><meta http-equiv="Pragma" content="no-cache"><title>Busy</title></head><body>try later</body></html>"#,
        );
        assert_eq!(
            classify(URL, &reply),
            Classification::Success { cacheable: false }
        );
    }

    #[test]
    fn no_cache_token_in_text_alone_is_cacheable() {
        let reply = Reply::ok().body("<eSummaryResult><Title>no-cache policies</Title></eSummaryResult>");
        assert_eq!(
            classify(URL, &reply),
            Classification::Success { cacheable: true }
        );
    }
}

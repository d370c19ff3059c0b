//! Minimal markup document model over [`quick_xml`].
//!
//! Replies from the remote service are XML (occasionally HTML). The
//! classifier only ever needs two things from them: the text of a named
//! element, and whether some element carries a given attribute value. A flat
//! list of elements in document order is enough for both.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Errors produced while parsing a reply body.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document has no root element")]
    NoRootElement,

    #[error("element <{name}> is never closed")]
    Unclosed { name: String },
}

/// One element: its local name, attributes, and directly contained text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concatenated text and CDATA directly inside this element, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Returns the unescaped value of `key`, if the attribute is present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed markup document.
///
/// # Examples
///
/// ```
/// use eutils::markup::Document;
///
/// let doc = Document::parse(b"<eSearchResult><ERROR>bad database</ERROR></eSearchResult>").unwrap();
/// assert_eq!(doc.find_ignore_case("error").map(|e| e.text()), Some("bad database"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    /// Parses `input` into a document.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Xml`] for ill-formed markup (mismatched tags, bad escapes, ...).
    /// - [`ParseError::NoRootElement`] if the input holds no element at all.
    /// - [`ParseError::Unclosed`] if input ends with elements still open.
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::from_reader(input);
        let mut elements: Vec<Element> = Vec::new();
        // Indices into `elements` of currently open tags.
        let mut open: Vec<usize> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|source| ParseError::Xml {
                position: reader.buffer_position() as u64,
                source,
            })?;
            let position = reader.buffer_position() as u64;
            let xml_err = |source: quick_xml::Error| ParseError::Xml { position, source };

            match event {
                Event::Start(start) => {
                    elements.push(element_from(&start).map_err(xml_err)?);
                    open.push(elements.len() - 1);
                }
                Event::Empty(start) => {
                    elements.push(element_from(&start).map_err(xml_err)?);
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(text) => {
                    if let Some(&idx) = open.last() {
                        let text = text
                            .unescape()
                            .map_err(quick_xml::Error::from)
                            .map_err(xml_err)?;
                        elements[idx].text.push_str(&text);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(&idx) = open.last() {
                        elements[idx].text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&idx) = open.last() {
            return Err(ParseError::Unclosed {
                name: elements[idx].name.clone(),
            });
        }
        if elements.is_empty() {
            return Err(ParseError::NoRootElement);
        }

        Ok(Self { elements })
    }

    /// First element whose local name equals `name`, ignoring ASCII case.
    pub fn find_ignore_case(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// `true` if any element named `name` (ASCII case-insensitive) has
    /// attribute `key` equal to `value`.
    pub fn has_attribute_value(&self, name: &str, key: &str, value: &str) -> bool {
        self.elements
            .iter()
            .filter(|e| e.name.eq_ignore_ascii_case(name))
            .any(|e| e.attribute(key) == Some(value))
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attributes,
        text: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_element_text() {
        let doc = Document::parse(
            br#"<?xml version="1.0"?>
<!DOCTYPE eSearchResult>
<eSearchResult><ERROR>Invalid db name specified: pubmedx</ERROR></eSearchResult>"#,
        )
        .unwrap();
        assert_eq!(
            doc.find_ignore_case("ERROR").map(Element::text),
            Some("Invalid db name specified: pubmedx")
        );
        assert_eq!(
            doc.find_ignore_case("error").map(Element::name),
            Some("ERROR")
        );
        assert!(doc.find_ignore_case("Count").is_none());
    }

    #[test]
    fn root_element_is_searchable() {
        let doc = Document::parse(b"<ERROR>bad database</ERROR>").unwrap();
        assert_eq!(doc.find_ignore_case("ERROR").map(Element::text), Some("bad database"));
    }

    #[test]
    fn attribute_value_lookup() {
        let doc = Document::parse(
            br#"<html><head><meta http-equiv="Pragma" content="no-cache"/></head><body/></html>"#,
        )
        .unwrap();
        assert!(doc.has_attribute_value("meta", "content", "no-cache"));
        assert!(!doc.has_attribute_value("meta", "content", "max-age=60"));
        assert!(!doc.has_attribute_value("body", "content", "no-cache"));
    }

    #[test]
    fn entities_are_unescaped() {
        let doc = Document::parse(b"<r><ERROR>a &amp; b</ERROR></r>").unwrap();
        assert_eq!(doc.find_ignore_case("ERROR").map(Element::text), Some("a & b"));
    }

    #[test]
    fn mismatched_tags_fail() {
        let err = Document::parse(b"<a><b></a>").unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }));
    }

    #[test]
    fn unclosed_fails() {
        let err = Document::parse(b"<eSearchResult><Count>3</Count>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unclosed { .. } | ParseError::Xml { .. }
        ));
    }

    #[test]
    fn plain_text_has_no_root() {
        let err = Document::parse(b"Service unavailable").unwrap_err();
        assert!(matches!(err, ParseError::NoRootElement));
    }
}

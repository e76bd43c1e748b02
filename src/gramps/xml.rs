//! Minimal XML element tree over `quick-xml`.
//!
//! The Gramps format is shallow and attribute-heavy; reading the document into
//! a small element tree keeps the staged, order-dependent parse in
//! [`super::parser`] readable, and the whole document is already in memory as
//! text anyway.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::GrampsError;

/// One XML element: local name, attributes, children, and accumulated text.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Trimmed text of a named child, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|c| c.text.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

fn xml_err(e: impl std::fmt::Display) -> GrampsError {
    GrampsError::Xml {
        message: e.to_string(),
    }
}

/// Parse document text into an element tree, returning the root element.
///
/// A document with no root element at all is a malformed-document error.
pub fn parse_tree(input: &str) -> Result<XmlElement, GrampsError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let mut element = XmlElement {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                for attr in start.attributes() {
                    let attr = attr.map_err(xml_err)?;
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr.unescape_value().map_err(xml_err)?.into_owned();
                    element.attrs.insert(key, value);
                }
                stack.push(element);
            }
            Event::Empty(start) => {
                let mut element = XmlElement {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                for attr in start.attributes() {
                    let attr = attr.map_err(xml_err)?;
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr.unescape_value().map_err(xml_err)?.into_owned();
                    element.attrs.insert(key, value);
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| GrampsError::Malformed {
                    message: "unbalanced closing tag".into(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(GrampsError::Malformed {
            message: "unclosed elements at end of document".into(),
        });
    }
    root.ok_or_else(|| GrampsError::Malformed {
        message: "no root element".into(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), GrampsError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(GrampsError::Malformed {
                    message: "multiple root elements".into(),
                });
            }
            *root = Some(element);
        }
    }
    Ok(())
}

/// Indented XML emitter with escaping.
///
/// Emission is infallible (it writes to an in-memory string); escaping goes
/// through `quick_xml::escape` so output always re-parses with the reader
/// above.
#[derive(Debug)]
pub struct XmlBuilder {
    buf: String,
    depth: usize,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self {
            buf: "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_owned(),
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }

    fn write_attrs(&mut self, attrs: &[(&str, &str)]) {
        for (key, value) in attrs {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            self.buf.push_str(&quick_xml::escape::escape(*value));
            self.buf.push('"');
        }
    }

    /// Open a container element.
    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        self.write_attrs(attrs);
        self.buf.push_str(">\n");
        self.depth += 1;
    }

    /// Emit a self-closing element.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        self.write_attrs(attrs);
        self.buf.push_str("/>\n");
    }

    /// Emit `<name>text</name>`.
    pub fn text_element(&mut self, name: &str, text: &str) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push('>');
        self.buf.push_str(&quick_xml::escape::escape(text));
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push_str(">\n");
    }

    /// Close the innermost open element.
    pub fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push_str(">\n");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let root = parse_tree(
            r#"<database><people><person handle="_i1"><gender>M</gender></person></people></database>"#,
        )
        .unwrap();
        assert_eq!(root.name, "database");
        let person = root.child("people").unwrap().child("person").unwrap();
        assert_eq!(person.attr("handle"), Some("_i1"));
        assert_eq!(person.child_text("gender").as_deref(), Some("M"));
    }

    #[test]
    fn empty_elements_carry_attributes() {
        let root = parse_tree(r#"<a><dateval val="1900-01-01"/></a>"#).unwrap();
        assert_eq!(
            root.child("dateval").unwrap().attr("val"),
            Some("1900-01-01")
        );
    }

    #[test]
    fn entities_are_unescaped() {
        let root = parse_tree(r#"<a name="J &amp; M"><t>x &lt; y</t></a>"#).unwrap();
        assert_eq!(root.attr("name"), Some("J & M"));
        assert_eq!(root.child_text("t").as_deref(), Some("x < y"));
    }

    #[test]
    fn missing_root_is_malformed() {
        assert!(matches!(
            parse_tree("   "),
            Err(GrampsError::Malformed { .. })
        ));
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(parse_tree("<database><people>").is_err());
    }

    #[test]
    fn builder_output_re_parses() {
        let mut builder = XmlBuilder::new();
        builder.open("database", &[]);
        builder.open("people", &[]);
        builder.open("person", &[("handle", "_i1")]);
        builder.text_element("gender", "M");
        builder.empty("eventref", &[("hlink", "_e1")]);
        builder.close("person");
        builder.close("people");
        builder.close("database");

        let root = parse_tree(&builder.finish()).unwrap();
        let person = root.child("people").unwrap().child("person").unwrap();
        assert_eq!(person.attr("handle"), Some("_i1"));
        assert_eq!(person.child("eventref").unwrap().attr("hlink"), Some("_e1"));
    }

    #[test]
    fn builder_escapes_text_and_attributes() {
        let mut builder = XmlBuilder::new();
        builder.open("a", &[("name", "J & M <wed>")]);
        builder.text_element("t", "x < y");
        builder.close("a");
        let root = parse_tree(&builder.finish()).unwrap();
        assert_eq!(root.attr("name"), Some("J & M <wed>"));
        assert_eq!(root.child_text("t").as_deref(), Some("x < y"));
    }
}

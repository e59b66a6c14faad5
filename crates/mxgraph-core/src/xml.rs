// Owned XML element tree shared by the envelope, the graph model and the
// payload codec.
//
// Trimming policy (same as for .drawio envelopes):
// - whitespace-only text inside an element is formatting and is dropped
// - any other text is kept exactly, entity and character references resolved

use crate::error::{ParseError, ParseResult};
use indexmap::IndexMap;
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Write;
use std::str;

/// Insertion-ordered attribute bag. Order is preserved so that pass-through
/// attributes survive a round trip in the position they were read.
pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Element {
    pub name: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// First child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Parse a document and return its root element. Prolog, comments and
    /// processing instructions are skipped.
    pub fn parse(xml: &str) -> ParseResult<Element> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(element_from_start(&e)?),
                Event::Empty(e) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let mut element = stack.pop().ok_or_else(|| {
                        ParseError::Structure("closing tag without open element".into())
                    })?;
                    if element.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
                        // formatting-only
                        element.text = None;
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => push_text(&mut stack, &t.decode()?),
                Event::CData(c) => push_text(&mut stack, &c.decode()?),
                Event::GeneralRef(r) => push_text(&mut stack, &resolve_reference(&r)?),
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ParseError::Structure(format!(
                "unclosed element <{}>",
                open.name
            )));
        }
        root.ok_or_else(|| ParseError::Structure("no root element found".into()))
    }

    pub fn parse_bytes(bytes: &[u8]) -> ParseResult<Element> {
        Self::parse(str::from_utf8(bytes)?)
    }

    /// Compact serialization: no declaration, no indentation, childless
    /// elements written self-closing.
    pub fn to_xml_string(&self) -> ParseResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        let bytes = writer.into_inner();
        Ok(String::from_utf8(bytes).map_err(|e| e.utf8_error())?)
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> ParseResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value: Cow::Owned(escape_attr_value(value).into_bytes()),
            });
        }

        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = self.text.as_deref() {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Markup escaping plus character references for tab, newline and carriage
/// return. Readers normalize those characters to spaces when they appear
/// literally in an attribute value.
fn escape_attr_value(value: &str) -> String {
    let escaped = escape(value);
    if !escaped.contains(['\t', '\n', '\r']) {
        return escaped.into_owned();
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for ch in escaped.chars() {
        match ch {
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
    out
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> ParseResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ParseError::Structure(format!(
            "multiple root elements (second is <{}>)",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], txt: &str) {
    // text outside the root element is whitespace or garbage the reader
    // already rejected
    if let Some(current) = stack.last_mut() {
        match current.text.as_mut() {
            Some(existing) => existing.push_str(txt),
            None => current.text = Some(txt.to_string()),
        }
    }
}

fn resolve_reference(r: &BytesRef<'_>) -> ParseResult<String> {
    if let Some(ch) = r.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = r.decode()?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| ParseError::UnknownEntity(name.into_owned()))
}

fn element_from_start(e: &BytesStart<'_>) -> ParseResult<Element> {
    Ok(Element {
        name: local_name_start(e)?,
        attrs: attrs_to_map(e)?,
        children: Vec::new(),
        text: None,
    })
}

fn attrs_to_map(e: &BytesStart<'_>) -> ParseResult<Attributes> {
    let mut out = Attributes::new();
    for a in e.attributes() {
        let a = a?;
        let key = str::from_utf8(a.key.as_ref())?.to_string();
        let val = a.unescape_value()?.to_string();
        out.insert(key, val);
    }
    Ok(out)
}

fn local_name_start(e: &BytesStart<'_>) -> ParseResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_attribute_order_and_drops_formatting_text() {
        let el = Element::parse(
            r#"<mxCell id="2" value="a" style="x=1;" vertex="1" parent="1">
                 <mxGeometry x="1" y="2" width="3" height="4" as="geometry"/>
               </mxCell>"#,
        )
        .unwrap();

        let keys: Vec<&str> = el.attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "value", "style", "vertex", "parent"]);
        assert_eq!(el.text, None);
        assert_eq!(el.children.len(), 1);
        assert_eq!(el.child("mxGeometry").unwrap().attr("as"), Some("geometry"));
    }

    #[test]
    fn resolves_references_in_text_and_attributes() {
        let el = Element::parse(r#"<d v="a &amp; b&#xa;c">x &lt; y</d>"#).unwrap();
        assert_eq!(el.attr("v"), Some("a & b\nc"));
        assert_eq!(el.text.as_deref(), Some("x < y"));
    }

    #[test]
    fn writes_compact_xml_with_escaping() {
        let el = Element::new("root")
            .with_child(Element::new("mxCell").with_attr("id", "0"))
            .with_child(
                Element::new("mxCell")
                    .with_attr("id", "1")
                    .with_attr("value", "<b>\"hi\"</b>"),
            );
        let xml = el.to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<root><mxCell id="0"/><mxCell id="1" value="&lt;b&gt;&quot;hi&quot;&lt;/b&gt;"/></root>"#
        );
        assert_eq!(Element::parse(&xml).unwrap(), el);
    }

    #[test]
    fn attribute_whitespace_is_written_as_character_references() {
        let source = r#"<mxCell id="2" value="line1&#xa;line2&#9;tab&#13;"/>"#;
        let el = Element::parse(source).unwrap();
        assert_eq!(el.attr("value"), Some("line1\nline2\ttab\r"));

        let xml = el.to_xml_string().unwrap();
        assert_eq!(xml, r#"<mxCell id="2" value="line1&#10;line2&#9;tab&#13;"/>"#);
        assert!(!xml.contains('\n'));
        assert_eq!(Element::parse(&xml).unwrap(), el);
    }

    #[test]
    fn rejects_unclosed_and_empty_documents() {
        assert!(Element::parse("<a><b></b>").is_err());
        assert!(Element::parse("   ").is_err());
    }
}

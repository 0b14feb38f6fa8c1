//! A minimal owned element tree built on top of `quick_xml`.
//!
//! The manifest builders are pure functions over [`XmlElement`], so the whole document is
//! read once into this tree before any DASH semantics are applied. Namespaces are not resolved:
//! names keep their prefix and lookups can either match the qualified name or ignore the prefix.

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{MpdError, MpdResult};

#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> MpdResult<Self> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = std::str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Qualified name, including any namespace prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Attribute value by its exact (possibly prefixed) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value matched on the local part of its name, e.g. `cenc:default_KID`.
    pub fn attr_ignore_prefix(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key) == local_name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    pub fn children_named<'a, 'b>(
        &'a self,
        local_name: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + use<'a, 'b> {
        self.children
            .iter()
            .filter(move |child| child.local_name() == local_name)
    }

    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children_named(local_name).next()
    }

    /// Text content directly inside this element, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Reads the whole document into an element tree.
///
/// When `expected_root` is given, the first element is checked against it before anything
/// else is read, so a foreign document fails without being walked.
pub fn parse_document(input: &str, expected_root: Option<&str>) -> MpdResult<XmlElement> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = XmlElement::from_start(&start)?;
                if stack.is_empty() {
                    check_root(&element, expected_root)?;
                }
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => {
                        check_root(&element, expected_root)?;
                        return Ok(element);
                    }
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| MpdError::MpdParsing("Unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(std::str::from_utf8(&data)?);
                }
            }
            Event::Eof => {
                return Err(MpdError::MpdParsing(
                    "Unexpected end of document".to_string(),
                ))
            }
            _ => {}
        }
    }
}

fn check_root(element: &XmlElement, expected_root: Option<&str>) -> MpdResult<()> {
    match expected_root {
        Some(expected) if element.local_name() != expected => {
            Err(MpdError::InvalidRootElement(element.name().to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <MPD xmlns:cenc="urn:mpeg:cenc:2013" type="static">
                <BaseURL>http://a.com/ &amp; b/</BaseURL>
                <Period><cenc:pssh>AAAA</cenc:pssh></Period>
                <Period cenc:default_KID="x"/>
            </MPD>"#,
            Some("MPD"),
        )
        .unwrap();

        assert_eq!(root.name(), "MPD");
        assert_eq!(root.attr("type"), Some("static"));
        assert_eq!(root.children().count(), 3);
        assert_eq!(root.child("BaseURL").unwrap().text(), "http://a.com/ & b/");

        let periods: Vec<_> = root.children_named("Period").collect();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].child("pssh").unwrap().name(), "cenc:pssh");
        assert_eq!(periods[1].attr_ignore_prefix("default_KID"), Some("x"));
        assert_eq!(periods[1].attr("default_KID"), None);
    }

    #[test]
    fn test_wrong_root() {
        let result = parse_document("<html><MPD/></html>", Some("MPD"));
        assert!(matches!(result, Err(MpdError::InvalidRootElement(name)) if name == "html"));
    }

    #[test]
    fn test_truncated_document() {
        assert!(parse_document("<MPD><Period>", Some("MPD")).is_err());
    }
}

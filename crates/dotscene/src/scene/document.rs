//! Parsed document tree
//!
//! The whole document is read into an owned [`Element`] tree before any
//! materialization starts. Elements keep attributes and children in document
//! order; text content is not used by the format and is dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::DocumentCorrupt;

/// Tag of the only accepted root element
pub const SCENE_TAG: &str = "scene";

/// Immutable XML element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    /// Element without attributes or children
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append an attribute in place
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// Append a child in place
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by exact name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Child elements in document order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child with the given tag
    pub fn first_child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Children with the given tag, in document order
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }
}

/// Parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse a complete document held in memory
    pub fn parse(text: &str) -> Result<Self, DocumentCorrupt> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(element_from(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = element_from(&start)?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocumentCorrupt::Xml("unexpected closing tag".to_string()))?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(DocumentCorrupt::Xml(err.to_string())),
            }
        }

        if let Some(open) = stack.last() {
            return Err(DocumentCorrupt::Xml(format!("unclosed element <{}>", open.tag)));
        }
        let root = root.ok_or_else(|| DocumentCorrupt::Xml("document has no root element".to_string()))?;
        Ok(Self { root })
    }

    /// Wrap an already built tree
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Root element, whatever its tag
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Root element, which must be `scene`
    pub fn scene(&self) -> Result<&Element, DocumentCorrupt> {
        if self.root.tag == SCENE_TAG {
            Ok(&self.root)
        } else {
            Err(DocumentCorrupt::MissingRoot(self.root.tag.clone()))
        }
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, DocumentCorrupt> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| DocumentCorrupt::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| DocumentCorrupt::Xml(err.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close_element(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentCorrupt> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(DocumentCorrupt::Xml(format!(
                "second root element <{}>",
                element.tag
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree_in_order() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?>
            <scene formatVersion="1.0">
                <nodes>
                    <node name="a"/>
                    <node name="b"><position x="1" y="2" z="3"/></node>
                </nodes>
                <environment/>
            </scene>"#,
        )
        .unwrap();

        let scene = doc.scene().unwrap();
        assert_eq!(scene.attribute("formatVersion"), Some("1.0"));
        let tags: Vec<&str> = scene.children().iter().map(Element::tag).collect();
        assert_eq!(tags, vec!["nodes", "environment"]);

        let nodes = scene.first_child("nodes").unwrap();
        let names: Vec<&str> = nodes.children_named("node").filter_map(|n| n.attribute("name")).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(nodes.children()[1].first_child("position").unwrap().has_attribute("z"));
    }

    #[test]
    fn test_attribute_entities_unescaped() {
        let doc = Document::parse(r#"<scene author="A &amp; B"/>"#).unwrap();
        assert_eq!(doc.root().attribute("author"), Some("A & B"));
    }

    #[test]
    fn test_wrong_root_rejected() {
        let doc = Document::parse("<level/>").unwrap();
        assert!(matches!(doc.scene(), Err(DocumentCorrupt::MissingRoot(tag)) if tag == "level"));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(matches!(Document::parse("<scene><nodes></scene>"), Err(DocumentCorrupt::Xml(_))));
        assert!(matches!(Document::parse("<scene>"), Err(DocumentCorrupt::Xml(_))));
        assert!(matches!(Document::parse(""), Err(DocumentCorrupt::Xml(_))));
        assert!(matches!(Document::parse("<a/><b/>"), Err(DocumentCorrupt::Xml(_))));
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = Element::new("scene").with_child(Element::new("light").with_attribute("name", "Sun"));
        let parsed = Document::parse(r#"<scene><light name="Sun"/></scene>"#).unwrap();
        assert_eq!(parsed.root(), &built);
    }
}

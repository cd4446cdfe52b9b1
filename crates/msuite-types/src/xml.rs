//! Minimal XML element tree.
//!
//! Metadata records are held as a tree so that every element and attribute
//! survives a parse and re-encode, including content nothing here models.
//! Comments, processing instructions and whitespace-only text are not kept.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};

const NAME_KEY: &str = "name";
const ATTRIBUTES_KEY: &str = "attributes";
const CHILDREN_KEY: &str = "children";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// One element with its attributes and children in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `premis:object`.
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
}

fn parse_error(e: impl fmt::Display) -> TypeError {
    TypeError::Parse(e.to_string())
}

fn shape_error(what: &str) -> TypeError {
    TypeError::Parse(format!("structural metadata: {what}"))
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_element(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn push_element(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn prefix(&self) -> Option<&str> {
        split_name(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_name(&self.name).1
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct text content with surrounding whitespace removed.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                text.push_str(t);
            }
        }
        text.trim().to_string()
    }

    /// Parse a document and return its root element.
    pub fn parse(text: &str) -> TypeResult<Self> {
        let mut reader = Reader::from_str(text);
        let mut open: Vec<XmlElement> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(parse_error)? {
                Event::Start(start) => open.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    close(&mut open, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| TypeError::Parse("unexpected closing tag".into()))?;
                    close(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(parse_error)?;
                    push_text(&mut open, &text)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data).map_err(parse_error)?;
                    push_text(&mut open, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if let Some(element) = open.last() {
            return Err(TypeError::Parse(format!("unclosed element <{}>", element.name)));
        }
        root.ok_or_else(|| TypeError::Parse("document has no root element".into()))
    }

    /// Encode as indented XML, without declaration.
    pub fn to_xml(&self) -> TypeResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Structural form: `{"name", "attributes", "children"}`, with text
    /// children as plain strings. Empty members are omitted.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(NAME_KEY.into(), Value::String(self.name.clone()));
        if !self.attributes.is_empty() {
            let attributes = self
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            object.insert(ATTRIBUTES_KEY.into(), Value::Object(attributes));
        }
        if !self.children.is_empty() {
            let children = self
                .children
                .iter()
                .map(|child| match child {
                    XmlNode::Element(element) => element.to_json(),
                    XmlNode::Text(text) => Value::String(text.clone()),
                })
                .collect();
            object.insert(CHILDREN_KEY.into(), Value::Array(children));
        }
        Value::Object(object)
    }

    pub fn from_json(value: &Value) -> TypeResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| shape_error("element is not an object"))?;
        let name = object
            .get(NAME_KEY)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| shape_error("element has no name"))?;
        let mut element = XmlElement::new(name);
        if let Some(attributes) = object.get(ATTRIBUTES_KEY) {
            let attributes = attributes
                .as_object()
                .ok_or_else(|| shape_error("attributes are not an object"))?;
            for (key, value) in attributes {
                let value = value
                    .as_str()
                    .ok_or_else(|| shape_error("attribute value is not a string"))?;
                element.attributes.insert(key.clone(), value.to_string());
            }
        }
        if let Some(children) = object.get(CHILDREN_KEY) {
            let children = children
                .as_array()
                .ok_or_else(|| shape_error("children are not an array"))?;
            for child in children {
                element.children.push(match child {
                    Value::String(text) => XmlNode::Text(text.clone()),
                    other => XmlNode::Element(Self::from_json(other)?),
                });
            }
        }
        Ok(element)
    }

    /// Structural equality that ignores namespace prefixes, namespace
    /// declarations and whitespace around text. `scope` and `other_scope`
    /// are the bindings in effect outside each element.
    pub fn equivalent(&self, scope: &Namespaces, other: &XmlElement, other_scope: &Namespaces) -> bool {
        let inside = scope.enter(self);
        let other_inside = other_scope.enter(other);
        if self.local_name() != other.local_name()
            || inside.namespace_of(self) != other_inside.namespace_of(other)
            || inside.plain_attributes(self) != other_inside.plain_attributes(other)
            || self.text() != other.text()
        {
            return false;
        }
        let mine: Vec<_> = self.elements().collect();
        let theirs: Vec<_> = other.elements().collect();
        mine.len() == theirs.len()
            && mine
                .iter()
                .zip(&theirs)
                .all(|(a, b)| a.equivalent(&inside, b, &other_inside))
    }
}

fn element_from(start: &BytesStart<'_>) -> TypeResult<XmlElement> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref()).map_err(parse_error)?;
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(parse_error)?;
        let key = std::str::from_utf8(attribute.key.as_ref()).map_err(parse_error)?;
        let value = attribute.unescape_value().map_err(parse_error)?;
        element.attributes.insert(key.to_string(), value.into_owned());
    }
    Ok(element)
}

fn close(open: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> TypeResult<()> {
    match open.last_mut() {
        Some(parent) => parent.push_element(element),
        None if root.is_some() => return Err(TypeError::Parse("more than one root element".into())),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(open: &mut [XmlElement], text: &str) -> TypeResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let parent = open
        .last_mut()
        .ok_or_else(|| TypeError::Parse("text outside the root element".into()))?;
    match parent.children.last_mut() {
        Some(XmlNode::Text(previous)) => previous.push_str(text),
        _ => parent.children.push(XmlNode::Text(text.to_string())),
    }
    Ok(())
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> TypeResult<()> {
    writer
        .write_event(event)
        .map_err(|e| TypeError::Serialization(e.to_string()))
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &XmlElement) -> TypeResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(inner) => write_element(writer, inner)?,
            XmlNode::Text(text) => emit(writer, Event::Text(BytesText::new(text)))?,
        }
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

/// Namespace bindings in scope at some point of a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespaces {
    default: Option<String>,
    prefixed: BTreeMap<String, String>,
}

impl Namespaces {
    /// Bindings in effect inside `element`: these plus its own declarations.
    pub fn enter(&self, element: &XmlElement) -> Self {
        let mut scope = self.clone();
        for (name, value) in &element.attributes {
            if name == "xmlns" {
                scope.default = (!value.is_empty()).then(|| value.clone());
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.prefixed.insert(prefix.to_string(), value.clone());
            }
        }
        scope
    }

    /// Namespace of `element`, which must be in this scope's element (that
    /// is, `self` already includes the element's own declarations).
    pub fn namespace_of(&self, element: &XmlElement) -> Option<&str> {
        match element.prefix() {
            Some(prefix) => self.prefixed.get(prefix).map(String::as_str),
            None => self.default.as_deref(),
        }
    }

    /// Qualified name for `local` in namespace `uri`. Unprefixed when `uri`
    /// is the default namespace or not bound at all.
    pub fn qualify(&self, uri: &str, local: &str) -> String {
        if self.default.as_deref() == Some(uri) {
            return local.to_string();
        }
        match self.prefixed.iter().find(|(_, bound)| bound.as_str() == uri) {
            Some((prefix, _)) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Attributes other than namespace declarations, keyed by resolved
    /// namespace and local name.
    fn plain_attributes<'a>(&'a self, element: &'a XmlElement) -> BTreeMap<(Option<&'a str>, &'a str), &'a str> {
        element
            .attributes
            .iter()
            .filter(|(name, _)| !is_namespace_declaration(name))
            .map(|(name, value)| {
                let (prefix, local) = split_name(name);
                let namespace = prefix.and_then(|p| self.prefixed.get(p).map(String::as_str));
                ((namespace, local), value.as_str())
            })
            .collect()
    }
}

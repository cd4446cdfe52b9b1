//! PREMIS preservation-metadata record.
//!
//! A record keeps its whole XML element tree, so agents, rights, formats,
//! storage locations, extension content and namespace declarations all
//! survive storage and re-encoding untouched. The parts that storage and
//! ingest read (objects with identifiers and fixity, events with the two-way
//! object/event links) are decoded on demand into [`PremisObject`] and
//! [`PremisEvent`] views. Changes go through the record, which inserts new
//! elements in schema order using the document's own PREMIS prefix.
//!
//! The native form is XML. The structural form is the same tree as JSON, see
//! [`XmlElement::to_json`].

use serde_json::Value;

use crate::error::{TypeError, TypeResult};
use crate::xml::{Namespaces, XmlElement, XmlNode};

pub const PREMIS_NAMESPACE: &str = "http://www.loc.gov/premis/v3";
pub const PREMIS_VERSION: &str = "3.0";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Order of the top-level sections of a record.
const RECORD_ORDER: &[&str] = &["object", "event", "agent", "rights"];

/// Order of the children of an object.
const OBJECT_ORDER: &[&str] = &[
    "objectIdentifier",
    "objectCategory",
    "preservationLevel",
    "significantProperties",
    "objectCharacteristics",
    "originalName",
    "storage",
    "signatureInformation",
    "environmentFunction",
    "environmentDesignation",
    "environmentRegistry",
    "environmentExtension",
    "relationship",
    "linkingEventIdentifier",
    "linkingRightsStatementIdentifier",
];

/// Unqualified names are accepted as PREMIS when no default namespace is
/// declared.
fn is_premis_namespace(namespace: Option<&str>) -> bool {
    matches!(namespace, None | Some(PREMIS_NAMESPACE))
}

/// Whether `child` is the PREMIS element `local`. `inside` is the scope of
/// the child's parent.
fn is_premis(inside: &Namespaces, child: &XmlElement, local: &str) -> bool {
    child.local_name() == local && is_premis_namespace(inside.enter(child).namespace_of(child))
}

/// PREMIS children of `parent` named `local`, each paired with the scope in
/// effect outside the child. `outside` is the scope outside `parent`.
fn premis_children<'a>(
    parent: &'a XmlElement,
    outside: &Namespaces,
    local: &'a str,
) -> impl Iterator<Item = (&'a XmlElement, Namespaces)> + 'a {
    let inside = outside.enter(parent);
    let outside = inside.clone();
    parent
        .elements()
        .filter(move |child| is_premis(&inside, child, local))
        .map(move |child| (child, outside.clone()))
}

fn child_text(parent: &XmlElement, outside: &Namespaces, local: &str) -> Option<String> {
    premis_children(parent, outside, local)
        .next()
        .map(|(child, _)| child.text())
}

fn text_element(name: String, text: &str) -> XmlElement {
    let element = XmlElement::new(name);
    if text.is_empty() {
        element
    } else {
        element.with_text(text)
    }
}

/// Insert `element` among the children of `parent` after every PREMIS
/// sibling that comes no later in `order`.
fn insert_in_order(parent: &mut XmlElement, inside: &Namespaces, order: &[&str], element: XmlElement) {
    let rank_of = |local: &str| order.iter().position(|name| *name == local);
    let rank = rank_of(element.local_name()).unwrap_or(order.len());
    let position = parent
        .children
        .iter()
        .enumerate()
        .filter_map(|(index, child)| match child {
            XmlNode::Element(sibling)
                if is_premis_namespace(inside.enter(sibling).namespace_of(sibling)) =>
            {
                rank_of(sibling.local_name())
                    .filter(|sibling_rank| *sibling_rank <= rank)
                    .map(|_| index + 1)
            }
            _ => None,
        })
        .last()
        .unwrap_or(0);
    parent.children.insert(position, XmlNode::Element(element));
}

/// A PREMIS record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PremisRecord {
    root: XmlElement,
}

impl PremisRecord {
    /// A record describing a single object, with no events yet.
    pub fn new(object: PremisObject) -> Self {
        let mut root = XmlElement::new("premis")
            .with_attribute("xmlns", PREMIS_NAMESPACE)
            .with_attribute("version", PREMIS_VERSION);
        let inside = Namespaces::default().enter(&root);
        root.push_element(object.to_element(&inside));
        Self { root }
    }

    /// Wrap a parsed tree, checking that its root is a PREMIS record.
    pub fn from_element(root: XmlElement) -> TypeResult<Self> {
        if !is_premis(&Namespaces::default(), &root, "premis") {
            return Err(TypeError::Parse(format!(
                "root element <{}> is not a PREMIS record",
                root.name
            )));
        }
        Ok(Self { root })
    }

    /// Decode the native XML form.
    pub fn parse(bytes: &[u8]) -> TypeResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| TypeError::Parse(e.to_string()))?;
        Self::from_element(XmlElement::parse(text)?)
    }

    /// Encode to the native XML form, with declaration.
    pub fn to_xml(&self) -> TypeResult<String> {
        Ok(format!("{XML_DECLARATION}{}", self.root.to_xml()?))
    }

    /// The structural (JSON tree) form.
    pub fn to_json(&self) -> TypeResult<Value> {
        Ok(self.root.to_json())
    }

    /// Rebuild a record from its structural form.
    pub fn from_json(value: Value) -> TypeResult<Self> {
        Self::from_element(XmlElement::from_json(&value)?)
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    fn sections(&self, local: &'static str) -> impl Iterator<Item = (&XmlElement, Namespaces)> {
        premis_children(&self.root, &Namespaces::default(), local)
    }

    pub(crate) fn event_elements(&self) -> Vec<(&XmlElement, Namespaces)> {
        self.sections("event").collect()
    }

    pub fn objects(&self) -> Vec<PremisObject> {
        self.sections("object")
            .map(|(element, outside)| PremisObject::decode(element, &outside))
            .collect()
    }

    pub fn events(&self) -> Vec<PremisEvent> {
        self.sections("event")
            .map(|(element, outside)| PremisEvent::decode(element, &outside))
            .collect()
    }

    pub fn first_object(&self) -> TypeResult<PremisObject> {
        self.sections("object")
            .next()
            .map(|(element, outside)| PremisObject::decode(element, &outside))
            .ok_or(TypeError::MissingObject)
    }

    /// The self-declared identifier: the first identifier of the first object.
    pub fn identifier_value(&self) -> TypeResult<String> {
        self.first_object()?
            .identifier_value()
            .map(str::to_string)
            .ok_or(TypeError::MissingObject)
    }

    pub fn events_of_type(&self, event_type: &str) -> impl Iterator<Item = PremisEvent> {
        let event_type = event_type.to_string();
        self.events()
            .into_iter()
            .filter(move |event| event.event_type == event_type)
    }

    /// Append an event after any existing objects and events.
    pub fn add_event(&mut self, event: &PremisEvent) {
        let inside = Namespaces::default().enter(&self.root);
        let element = event.to_element(&inside);
        insert_in_order(&mut self.root, &inside, RECORD_ORDER, element);
    }

    /// Link the first object to an event.
    pub fn add_linking_event(&mut self, link: &LinkingEventIdentifier) -> TypeResult<()> {
        let (object, inside) = self.first_object_element_mut()?;
        let element = link.to_element(&inside);
        insert_in_order(object, &inside, OBJECT_ORDER, element);
        Ok(())
    }

    /// Set or replace the original name of the first object.
    pub fn set_original_name(&mut self, name: &str) -> TypeResult<()> {
        let (object, inside) = self.first_object_element_mut()?;
        let existing = object.children.iter().position(|child| {
            matches!(child, XmlNode::Element(element) if is_premis(&inside, element, "originalName"))
        });
        match existing {
            Some(index) => {
                if let XmlNode::Element(element) = &mut object.children[index] {
                    element.children = vec![XmlNode::Text(name.to_string())];
                }
            }
            None => {
                let element = text_element(inside.qualify(PREMIS_NAMESPACE, "originalName"), name);
                insert_in_order(object, &inside, OBJECT_ORDER, element);
            }
        }
        Ok(())
    }

    /// The first object's element and the scope inside it.
    fn first_object_element_mut(&mut self) -> TypeResult<(&mut XmlElement, Namespaces)> {
        let inside_root = Namespaces::default().enter(&self.root);
        let index = self
            .root
            .children
            .iter()
            .position(|child| matches!(child, XmlNode::Element(e) if is_premis(&inside_root, e, "object")))
            .ok_or(TypeError::MissingObject)?;
        match &mut self.root.children[index] {
            XmlNode::Element(object) => {
                let inside = inside_root.enter(object);
                Ok((object, inside))
            }
            XmlNode::Text(_) => Err(TypeError::MissingObject),
        }
    }
}

/// An object as read from, or to be written into, a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PremisObject {
    pub identifiers: Vec<ObjectIdentifier>,
    pub characteristics: Vec<ObjectCharacteristics>,
    pub original_name: Option<String>,
    pub linking_events: Vec<LinkingEventIdentifier>,
}

impl PremisObject {
    pub fn new(identifier_type: impl Into<String>, identifier_value: impl Into<String>) -> Self {
        Self {
            identifiers: vec![ObjectIdentifier {
                identifier_type: identifier_type.into(),
                value: identifier_value.into(),
            }],
            characteristics: Vec::new(),
            original_name: None,
            linking_events: Vec::new(),
        }
    }

    /// Add a fixity entry to the first characteristics block, creating the
    /// block if there is none.
    pub fn with_fixity(mut self, algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        let fixity = Fixity {
            algorithm: algorithm.into(),
            digest: digest.into(),
            originator: None,
        };
        match self.characteristics.first_mut() {
            Some(block) => block.fixity.push(fixity),
            None => self.characteristics.push(ObjectCharacteristics {
                composition_level: Some("0".into()),
                fixity: vec![fixity],
                size: None,
            }),
        }
        self
    }

    pub fn identifier_value(&self) -> Option<&str> {
        self.identifiers.first().map(|i| i.value.as_str())
    }

    /// Every fixity entry across all characteristics blocks.
    pub fn fixities(&self) -> impl Iterator<Item = &Fixity> {
        self.characteristics.iter().flat_map(|c| c.fixity.iter())
    }

    /// First digest declared for `algorithm` (label compared ignoring ASCII
    /// case).
    pub fn fixity(&self, algorithm: &str) -> Option<&str> {
        self.fixities()
            .find(|f| f.algorithm.eq_ignore_ascii_case(algorithm))
            .map(|f| f.digest.as_str())
    }

    pub fn add_linking_event(&mut self, link: LinkingEventIdentifier) {
        self.linking_events.push(link);
    }

    /// Link node pointing at this object, for use inside an event.
    pub fn linking_object_identifier(&self) -> Option<LinkingObjectIdentifier> {
        self.identifiers.first().map(|i| LinkingObjectIdentifier {
            identifier_type: i.identifier_type.clone(),
            value: i.value.clone(),
        })
    }

    pub(crate) fn decode(element: &XmlElement, outside: &Namespaces) -> Self {
        let inside = outside.enter(element);
        Self {
            identifiers: premis_children(element, outside, "objectIdentifier")
                .map(|(id, _)| ObjectIdentifier {
                    identifier_type: child_text(id, &inside, "objectIdentifierType").unwrap_or_default(),
                    value: child_text(id, &inside, "objectIdentifierValue").unwrap_or_default(),
                })
                .collect(),
            characteristics: premis_children(element, outside, "objectCharacteristics")
                .map(|(block, _)| ObjectCharacteristics::decode(block, &inside))
                .collect(),
            original_name: child_text(element, outside, "originalName"),
            linking_events: premis_children(element, outside, "linkingEventIdentifier")
                .map(|(link, _)| LinkingEventIdentifier {
                    identifier_type: child_text(link, &inside, "linkingEventIdentifierType")
                        .unwrap_or_default(),
                    value: child_text(link, &inside, "linkingEventIdentifierValue").unwrap_or_default(),
                })
                .collect(),
        }
    }

    /// Encode as an `object` element. `inside` is the scope of the parent.
    pub(crate) fn to_element(&self, inside: &Namespaces) -> XmlElement {
        let q = |local: &str| inside.qualify(PREMIS_NAMESPACE, local);
        let mut object = XmlElement::new(q("object"));
        for id in &self.identifiers {
            object.push_element(
                XmlElement::new(q("objectIdentifier"))
                    .with_child(text_element(q("objectIdentifierType"), &id.identifier_type))
                    .with_child(text_element(q("objectIdentifierValue"), &id.value)),
            );
        }
        for block in &self.characteristics {
            let mut characteristics = XmlElement::new(q("objectCharacteristics"));
            if let Some(level) = &block.composition_level {
                characteristics.push_element(text_element(q("compositionLevel"), level));
            }
            for fixity in &block.fixity {
                let mut entry = XmlElement::new(q("fixity"))
                    .with_child(text_element(q("messageDigestAlgorithm"), &fixity.algorithm))
                    .with_child(text_element(q("messageDigest"), &fixity.digest));
                if let Some(originator) = &fixity.originator {
                    entry.push_element(text_element(q("messageDigestOriginator"), originator));
                }
                characteristics.push_element(entry);
            }
            if let Some(size) = block.size {
                characteristics.push_element(text_element(q("size"), &size.to_string()));
            }
            object.push_element(characteristics);
        }
        if let Some(name) = &self.original_name {
            object.push_element(text_element(q("originalName"), name));
        }
        for link in &self.linking_events {
            object.push_element(link.to_element(inside));
        }
        object
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectIdentifier {
    pub identifier_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectCharacteristics {
    pub composition_level: Option<String>,
    pub fixity: Vec<Fixity>,
    pub size: Option<u64>,
}

impl ObjectCharacteristics {
    fn decode(element: &XmlElement, outside: &Namespaces) -> Self {
        let inside = outside.enter(element);
        Self {
            composition_level: child_text(element, outside, "compositionLevel"),
            fixity: premis_children(element, outside, "fixity")
                .map(|(entry, _)| Fixity {
                    algorithm: child_text(entry, &inside, "messageDigestAlgorithm").unwrap_or_default(),
                    digest: child_text(entry, &inside, "messageDigest").unwrap_or_default(),
                    originator: child_text(entry, &inside, "messageDigestOriginator"),
                })
                .collect(),
            size: child_text(element, outside, "size").and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fixity {
    pub algorithm: String,
    pub digest: String,
    pub originator: Option<String>,
}

/// An event as read from, or to be written into, a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PremisEvent {
    pub identifier: EventIdentifier,
    pub event_type: String,
    pub date_time: String,
    pub details: Vec<EventDetailInformation>,
    pub linking_objects: Vec<LinkingObjectIdentifier>,
}

impl PremisEvent {
    pub fn new(
        identifier: EventIdentifier,
        event_type: impl Into<String>,
        date_time: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            event_type: event_type.into(),
            date_time: date_time.into(),
            details: Vec::new(),
            linking_objects: Vec::new(),
        }
    }

    pub fn add_detail(&mut self, detail: impl Into<String>) {
        self.details.push(EventDetailInformation {
            detail: detail.into(),
        });
    }

    pub fn add_linking_object(&mut self, link: LinkingObjectIdentifier) {
        self.linking_objects.push(link);
    }

    /// Link node pointing at this event, for use inside an object.
    pub fn linking_event_identifier(&self) -> LinkingEventIdentifier {
        LinkingEventIdentifier {
            identifier_type: self.identifier.identifier_type.clone(),
            value: self.identifier.value.clone(),
        }
    }

    pub(crate) fn decode(element: &XmlElement, outside: &Namespaces) -> Self {
        let inside = outside.enter(element);
        let identifier = premis_children(element, outside, "eventIdentifier")
            .next()
            .map(|(id, _)| EventIdentifier {
                identifier_type: child_text(id, &inside, "eventIdentifierType").unwrap_or_default(),
                value: child_text(id, &inside, "eventIdentifierValue").unwrap_or_default(),
            })
            .unwrap_or_else(|| EventIdentifier {
                identifier_type: String::new(),
                value: String::new(),
            });
        Self {
            identifier,
            event_type: child_text(element, outside, "eventType").unwrap_or_default(),
            date_time: child_text(element, outside, "eventDateTime").unwrap_or_default(),
            details: premis_children(element, outside, "eventDetailInformation")
                .filter_map(|(info, _)| child_text(info, &inside, "eventDetail"))
                .map(|detail| EventDetailInformation { detail })
                .collect(),
            linking_objects: premis_children(element, outside, "linkingObjectIdentifier")
                .map(|(link, _)| LinkingObjectIdentifier {
                    identifier_type: child_text(link, &inside, "linkingObjectIdentifierType")
                        .unwrap_or_default(),
                    value: child_text(link, &inside, "linkingObjectIdentifierValue").unwrap_or_default(),
                })
                .collect(),
        }
    }

    /// Encode as an `event` element. `inside` is the scope of the parent.
    pub(crate) fn to_element(&self, inside: &Namespaces) -> XmlElement {
        let q = |local: &str| inside.qualify(PREMIS_NAMESPACE, local);
        let mut event = XmlElement::new(q("event"))
            .with_child(
                XmlElement::new(q("eventIdentifier"))
                    .with_child(text_element(q("eventIdentifierType"), &self.identifier.identifier_type))
                    .with_child(text_element(q("eventIdentifierValue"), &self.identifier.value)),
            )
            .with_child(text_element(q("eventType"), &self.event_type))
            .with_child(text_element(q("eventDateTime"), &self.date_time));
        for info in &self.details {
            event.push_element(
                XmlElement::new(q("eventDetailInformation"))
                    .with_child(text_element(q("eventDetail"), &info.detail)),
            );
        }
        for link in &self.linking_objects {
            event.push_element(
                XmlElement::new(q("linkingObjectIdentifier"))
                    .with_child(text_element(q("linkingObjectIdentifierType"), &link.identifier_type))
                    .with_child(text_element(q("linkingObjectIdentifierValue"), &link.value)),
            );
        }
        event
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventIdentifier {
    pub identifier_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDetailInformation {
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkingObjectIdentifier {
    pub identifier_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkingEventIdentifier {
    pub identifier_type: String,
    pub value: String,
}

impl LinkingEventIdentifier {
    fn to_element(&self, inside: &Namespaces) -> XmlElement {
        let q = |local: &str| inside.qualify(PREMIS_NAMESPACE, local);
        XmlElement::new(q("linkingEventIdentifier"))
            .with_child(text_element(q("linkingEventIdentifierType"), &self.identifier_type))
            .with_child(text_element(q("linkingEventIdentifierValue"), &self.value))
    }
}

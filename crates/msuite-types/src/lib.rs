//! Foundation types for MaterialSuite storage.
//!
//! A MaterialSuite is one content blob plus one PREMIS preservation-metadata
//! record, both keyed by a single opaque [`Identifier`]. This crate defines
//! the identifier newtype (and the sanitizer that decides what a safe
//! identifier is) and the PREMIS record every other crate passes around. The
//! record keeps its full XML tree, so content nothing here models is stored
//! and served back unchanged.
//!
//! # Key Types
//!
//! - [`Identifier`]: validated, path- and URL-safe suite identifier
//! - [`PremisRecord`]: metadata record with objects, fixity and events
//! - [`PremisEvent`]: provenance event linked to an object
//! - [`XmlElement`]: the lossless element tree behind a record
//! - [`HistoryChange`]: what a replacement record dropped from the stored one

pub mod error;
pub mod history;
pub mod identifier;
pub mod premis;
pub mod xml;

pub use error::{TypeError, TypeResult};
pub use history::HistoryChange;
pub use identifier::{secure_filename, Identifier};
pub use premis::{
    EventDetailInformation, EventIdentifier, Fixity, LinkingEventIdentifier,
    LinkingObjectIdentifier, ObjectCharacteristics, ObjectIdentifier, PremisEvent, PremisObject,
    PremisRecord,
};
pub use xml::{Namespaces, XmlElement, XmlNode};

//! Provenance events recorded during ingest.

use chrono::{SecondsFormat, Utc};
use msuite_types::{EventIdentifier, PremisEvent, PremisRecord, TypeError};
use uuid::Uuid;

use crate::error::IngestResult;

pub const INGESTION_EVENT_TYPE: &str = "ingestion";
pub const INGESTION_EVENT_DETAIL: &str = "bytestream copied into the long term storage environment.";
pub const EVENT_IDENTIFIER_TYPE: &str = "uuid4";

/// Builds PREMIS events with a fresh identifier and timestamp.
///
/// ```
/// use msuite_ingest::ProvenanceEventBuilder;
///
/// let event = ProvenanceEventBuilder::ingestion().build();
/// assert_eq!(event.event_type, "ingestion");
/// assert_eq!(event.identifier.identifier_type, "uuid4");
/// ```
#[derive(Debug, Clone)]
pub struct ProvenanceEventBuilder {
    event_type: String,
    details: Vec<String>,
}

impl ProvenanceEventBuilder {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            details: Vec::new(),
        }
    }

    /// The event recorded when content enters long term storage.
    pub fn ingestion() -> Self {
        Self::new(INGESTION_EVENT_TYPE).detail(INGESTION_EVENT_DETAIL)
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// A new, unlinked event stamped with the current UTC time.
    pub fn build(&self) -> PremisEvent {
        let identifier = EventIdentifier {
            identifier_type: EVENT_IDENTIFIER_TYPE.to_string(),
            value: Uuid::new_v4().simple().to_string(),
        };
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut event = PremisEvent::new(identifier, self.event_type.clone(), now);
        for detail in &self.details {
            event.add_detail(detail.clone());
        }
        event
    }

    /// Build an event and link it both ways with the record's first object.
    ///
    /// Returns the identifier of the attached event. A record whose first
    /// object has no identifier is left untouched.
    pub fn attach(&self, record: &mut PremisRecord) -> IngestResult<EventIdentifier> {
        let link = record
            .first_object()?
            .linking_object_identifier()
            .ok_or(TypeError::MissingObject)?;
        let mut event = self.build();
        event.add_linking_object(link);
        record.add_linking_event(&event.linking_event_identifier())?;
        record.add_event(&event);
        Ok(event.identifier)
    }
}

//! Append-only checks between two versions of a record.
//!
//! Events, the object/event links and recorded fixity are the provenance of
//! a suite. A replacement record may add to them but must keep every entry
//! the stored record already carries.

use thiserror::Error;

use crate::premis::{PremisEvent, PremisRecord};

/// The first piece of recorded history a replacement record loses.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HistoryChange {
    #[error("event {0} was removed")]
    EventRemoved(String),

    #[error("event {0} was altered")]
    EventAltered(String),

    #[error("object {0} was removed")]
    ObjectRemoved(String),

    #[error("object {object} no longer links event {event}")]
    LinkRemoved { object: String, event: String },

    #[error("object {object} lost its {algorithm} fixity")]
    FixityChanged { object: String, algorithm: String },
}

impl PremisRecord {
    /// Check that this record keeps everything `earlier` recorded: each event
    /// (matched by identifier, compared ignoring prefixes and layout), each
    /// identified object, and each object's event links and fixity entries.
    pub fn preserves_history_of(&self, earlier: &PremisRecord) -> Result<(), HistoryChange> {
        let current_events = self.event_elements();
        for (old, old_scope) in earlier.event_elements() {
            let identifier = PremisEvent::decode(old, &old_scope).identifier;
            let current = current_events
                .iter()
                .find(|(new, new_scope)| PremisEvent::decode(new, new_scope).identifier == identifier)
                .ok_or_else(|| HistoryChange::EventRemoved(identifier.value.clone()))?;
            if !old.equivalent(&old_scope, current.0, &current.1) {
                return Err(HistoryChange::EventAltered(identifier.value));
            }
        }

        let current_objects = self.objects();
        for old in earlier.objects() {
            let Some(id) = old.identifier_value() else {
                continue;
            };
            let current = current_objects
                .iter()
                .find(|new| new.identifier_value() == Some(id))
                .ok_or_else(|| HistoryChange::ObjectRemoved(id.to_string()))?;
            for link in &old.linking_events {
                if !current.linking_events.contains(link) {
                    return Err(HistoryChange::LinkRemoved {
                        object: id.to_string(),
                        event: link.value.clone(),
                    });
                }
            }
            for fixity in old.fixities() {
                let kept = current.fixities().any(|f| {
                    f.algorithm.eq_ignore_ascii_case(&fixity.algorithm)
                        && f.digest.eq_ignore_ascii_case(&fixity.digest)
                });
                if !kept {
                    return Err(HistoryChange::FixityChanged {
                        object: id.to_string(),
                        algorithm: fixity.algorithm.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

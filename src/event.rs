//! Calendar events, as edited by the user and as persisted in the store

use std::fmt::{Display, Formatter};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

bitflags! {
    /// The user-editable fields of an event.
    ///
    /// Used to report which fields a patch touches, and which fields differ
    /// between two versions of the same event.
    pub struct EventFields: u8 {
        const TITLE = 1;
        const START = 2;
        const END = 4;
        const LOCATION = 8;
        const ATTENDEES = 16;
        const NOTES = 32;
    }
}

/// The repository-assigned identifier of a saved event.
///
/// This same value is stored in the extended-property slot of the matching
/// device calendar event, and is how the two records are correlated across syncs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Generate a random EventId
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// Someone attached to an event, usually picked from the device contacts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
}

/// The user-editable fields of a calendar event.
///
/// Created by the caller and passed by value; nothing in this crate mutates
/// an `EventDetails` behind the caller's back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
    pub notes: Option<String>,
}

impl EventDetails {
    /// A minimal event. Location, attendees and notes can be filled in afterwards
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            location: None,
            attendees: Vec::new(),
            notes: None,
        }
    }

    /// Check the invariants every event must hold.
    ///
    /// A violation is a validation error, it is never silently corrected.
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("an event requires a title".to_string()));
        }
        if self.start > self.end {
            return Err(Error::Validation(format!(
                "event ends ({}) before it starts ({})", self.end, self.start
            )));
        }
        Ok(())
    }

    /// The fields whose values differ between `self` and `other`
    pub fn fields_differing_from(&self, other: &EventDetails) -> EventFields {
        let mut fields = EventFields::empty();
        if self.title != other.title { fields.insert(EventFields::TITLE); }
        if self.start != other.start { fields.insert(EventFields::START); }
        if self.end != other.end { fields.insert(EventFields::END); }
        if self.location != other.location { fields.insert(EventFields::LOCATION); }
        if self.attendees != other.attendees { fields.insert(EventFields::ATTENDEES); }
        if self.notes != other.notes { fields.insert(EventFields::NOTES); }
        fields
    }
}

/// A partial update to an [`EventDetails`].
///
/// Fields left at `None` retain their prior value when the patch is applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub attendees: Option<Vec<Attendee>>,
    pub notes: Option<String>,
}

impl EventPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fields this patch would overwrite
    pub fn fields(&self) -> EventFields {
        let mut fields = EventFields::empty();
        if self.title.is_some() { fields.insert(EventFields::TITLE); }
        if self.start.is_some() { fields.insert(EventFields::START); }
        if self.end.is_some() { fields.insert(EventFields::END); }
        if self.location.is_some() { fields.insert(EventFields::LOCATION); }
        if self.attendees.is_some() { fields.insert(EventFields::ATTENDEES); }
        if self.notes.is_some() { fields.insert(EventFields::NOTES); }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn apply_to(&self, details: &mut EventDetails) {
        if let Some(title) = &self.title { details.title = title.clone(); }
        if let Some(start) = self.start { details.start = start; }
        if let Some(end) = self.end { details.end = end; }
        if let Some(location) = &self.location { details.location = Some(location.clone()); }
        if let Some(attendees) = &self.attendees { details.attendees = attendees.clone(); }
        if let Some(notes) = &self.notes { details.notes = Some(notes.clone()); }
    }
}

/// An event that exists in the repository.
///
/// Snapshots are copy-on-write: an update produces a new `SavedEvent`, the one
/// the caller holds is never mutated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedEvent {
    id: EventId,
    details: EventDetails,
    /// The last time either side of the sync wrote this event
    last_modified: DateTime<Utc>,
}

impl SavedEvent {
    pub(crate) fn new(id: EventId, details: EventDetails) -> Self {
        Self { id, details, last_modified: Utc::now() }
    }

    /// Build a snapshot with a chosen modification time. Only test rigs need this;
    /// production snapshots are always stamped by the repository.
    #[cfg(any(test, feature = "local_store_mocks_remote_store"))]
    pub fn new_at(id: EventId, details: EventDetails, last_modified: DateTime<Utc>) -> Self {
        Self { id, details, last_modified }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn details(&self) -> &EventDetails {
        &self.details
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Apply a patch, returning the updated snapshot with a fresh `last_modified`
    pub(crate) fn apply(&self, patch: &EventPatch) -> SavedEvent {
        let mut details = self.details.clone();
        patch.apply_to(&mut details);
        Self {
            id: self.id.clone(),
            details,
            last_modified: Utc::now(),
        }
    }

    #[cfg(any(test, feature = "integration_tests"))]
    pub fn has_same_observable_content_as(&self, other: &SavedEvent) -> bool {
           self.id == other.id
        && self.details == other.details
        // last modified dates are ignored (two equal writes still get distinct stamps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn details() -> EventDetails {
        let start = Utc::now();
        EventDetails::new("Dentist", start, start + Duration::hours(1))
    }

    #[test]
    fn test_validation() {
        assert!(details().validate().is_ok());

        let mut bad = details();
        bad.title = "   ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = details();
        bad.end = bad.start - Duration::minutes(5);
        assert!(bad.validate().is_err());

        // Zero-length events are allowed
        let mut ok = details();
        ok.end = ok.start;
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_patch_retains_omitted_fields() {
        let mut original = details();
        original.location = Some("Main St 1".to_string());
        original.notes = Some("bring the X-rays".to_string());

        let patch = EventPatch {
            title: Some("Dentist (moved)".to_string()),
            ..EventPatch::default()
        };
        assert_eq!(patch.fields(), EventFields::TITLE);

        let saved = SavedEvent::new(EventId::random(), original.clone());
        let updated = saved.apply(&patch);

        assert_eq!(updated.details().title, "Dentist (moved)");
        assert_eq!(updated.details().location, original.location);
        assert_eq!(updated.details().notes, original.notes);
        assert_eq!(updated.details().start, original.start);
    }

    #[test]
    fn test_empty_patch_is_a_noop_on_fields() {
        let saved = SavedEvent::new(EventId::random(), details());
        let updated = saved.apply(&EventPatch::new());
        assert!(EventPatch::new().is_empty());
        assert_eq!(saved.details(), updated.details());
        assert_eq!(saved.id(), updated.id());
    }

    #[test]
    fn test_fields_differing() {
        let left = details();
        assert!(left.fields_differing_from(&left.clone()).is_empty());

        let mut right = left.clone();
        right.title = "Changed".to_string();
        right.notes = Some("note".to_string());
        assert_eq!(
            left.fields_differing_from(&right),
            EventFields::TITLE | EventFields::NOTES
        );
    }

}

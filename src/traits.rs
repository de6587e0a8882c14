//! The narrow interfaces the external collaborators are accessed through
//!
//! The cloud document store, the device calendar and the device contacts are
//! all vendor- or OS-owned. This crate only ever talks to them through these
//! traits, so every implementation (including the in-process ones shipped in
//! the [`store`](crate::store), [`device`](crate::device) and
//! [`contacts`](crate::contacts) modules) is interchangeable.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DeviceError, StoreError};
use crate::event::{EventDetails, EventId};

/// A document payload, as exchanged with the remote store
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The remote document store.
///
/// Documents are addressed by `(user id, collection, document id)`; no call
/// ever reads or writes outside the given user's scope. Every call may fail,
/// and implementations must classify failures as transient or permanent,
/// because callers surface that distinction to the user.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The document, or `None` if it does not exist
    async fn get(&self, user_id: &str, collection: &str, document_id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or overwrite a document
    async fn set(&self, user_id: &str, collection: &str, document_id: &str, document: Document) -> Result<(), StoreError>;

    /// Shallow, key-level merge into a document, creating it if absent.
    /// Keys present in `fields` overwrite; every other key is retained.
    async fn merge(&self, user_id: &str, collection: &str, document_id: &str, fields: Document) -> Result<(), StoreError>;

    /// Every document of a user's collection, keyed by document id
    async fn list(&self, user_id: &str, collection: &str) -> Result<HashMap<String, Document>, StoreError>;

    /// Delete a document. Deleting an absent document is not an error
    async fn delete(&self, user_id: &str, collection: &str, document_id: &str) -> Result<(), StoreError>;
}

/// The id of an event in the device's native calendar, opaque to this crate
pub type DeviceEventId = String;

/// An event as it exists in the device's native calendar
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEvent {
    pub id: DeviceEventId,
    pub details: EventDetails,
    /// The last time the event was modified on the device
    pub last_modified: DateTime<Utc>,
    /// The repository id stored in the extended-property slot,
    /// `None` for events this crate has never linked
    pub correlation_key: Option<EventId>,
}

/// The device's native calendar
#[async_trait]
pub trait DeviceCalendar: Send + Sync {
    /// The events whose start time falls within `[from, to]`
    async fn events_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DeviceEvent>, DeviceError>;

    /// Create an event, stamping `key` into its extended-property slot
    async fn create_event(&mut self, details: &EventDetails, key: &EventId) -> Result<DeviceEventId, DeviceError>;

    /// Overwrite the user-editable fields of an existing event
    async fn update_event(&mut self, id: &DeviceEventId, details: &EventDetails) -> Result<(), DeviceError>;

    /// Stamp the correlation key of an existing, not-yet-linked event
    async fn link_event(&mut self, id: &DeviceEventId, key: &EventId) -> Result<(), DeviceError>;
}

/// An entry of the device address book
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
}

/// Read-only lookup into the device contacts.
///
/// Consumed at event-creation time to build attendee lists; the sync engine
/// never touches it.
#[async_trait]
pub trait ContactsSource: Send + Sync {
    /// The contacts whose name matches the search term
    async fn search(&self, term: &str) -> Result<Vec<Contact>, DeviceError>;
}

//! This crate provides the engine layer of a calendar app.
//!
//! User-edited events are persisted into a cloud document store by an
//! [`EventRepository`], scoped to the identity held by a [`SessionContext`]. \
//! A [`SyncEngine`](engine::SyncEngine) reconciles that remote event set with the
//! device's native calendar: both sides are matched through a correlation key
//! stored on the device event, conflicts are resolved last-write-wins, and the
//! outcome of every item is reported in a [`SyncStatus`](engine::SyncStatus).
//!
//! The store, the device calendar and the device contacts are external
//! collaborators reached through the [`traits`] module. In-process
//! implementations ([`LocalStore`], [`InMemoryCalendar`]) are provided for
//! tests, demos, and for mocking the remote ends in integration tests.

pub mod traits;

pub mod error;
pub use error::{Error, Result};
mod event;
pub use event::{Attendee, EventDetails, EventFields, EventId, EventPatch, SavedEvent};
pub mod session;
pub use session::{Session, SessionContext};
pub mod config;
pub use config::{ImportPolicy, SyncConfig};
pub mod repository;
pub use repository::{EventRepository, RepositoryProvider};
pub mod settings;
pub use settings::{SettingsStore, UserSettings};
pub mod engine;
pub use engine::SyncEngine;

pub mod store;
pub use store::LocalStore;
pub mod device;
pub use device::InMemoryCalendar;
pub mod contacts;

pub mod mock_behaviour;
pub mod utils;

//! Per-user preferences
//!
//! A much simpler sibling of the event repository: one document per user,
//! saved with shallow merge semantics. Last writer wins, consistent with the
//! rest of this crate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::session::Session;
use crate::traits::{Document, DocumentStore};

/// The store collection user preferences live in
const SETTINGS_COLLECTION: &str = "settings";
/// The single document each user's preferences live in
const PREFERENCES_DOCUMENT: &str = "preferences";

/// An arbitrary key-value preference mapping
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings(Document);

impl UserSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Shallow, key-level merge: keys of `partial` overwrite, every other key is retained
    pub fn merge(&mut self, partial: UserSettings) {
        for (key, value) in partial.0 {
            self.0.insert(key, value);
        }
    }
}

impl From<Document> for UserSettings {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl From<UserSettings> for Document {
    fn from(settings: UserSettings) -> Self {
        settings.0
    }
}

/// Preference persistence, scoped to the single identity it was constructed with
pub struct SettingsStore<S: DocumentStore> {
    store: Arc<S>,
    user_id: String,
}

impl<S: DocumentStore> SettingsStore<S> {
    pub fn new(store: Arc<S>, session: &Session) -> Self {
        Self {
            store,
            user_id: session.user_id().to_string(),
        }
    }

    /// The user's preferences, or `None` if nothing was ever saved
    pub async fn settings(&self) -> Result<Option<UserSettings>> {
        let document = self
            .store
            .get(&self.user_id, SETTINGS_COLLECTION, PREFERENCES_DOCUMENT)
            .await?;
        Ok(document.map(UserSettings::from))
    }

    /// Merge `partial` into the stored preferences, creating the document if absent.
    ///
    /// No conflict detection: the last writer wins at key level.
    pub async fn save_settings(&self, partial: UserSettings) -> Result<()> {
        log::debug!("Merging {} preference keys for {}", partial.len(), self.user_id);
        self.store
            .merge(&self.user_id, SETTINGS_COLLECTION, PREFERENCES_DOCUMENT, partial.into())
            .await?;
        Ok(())
    }
}

//! Persistence of events into the remote document store

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::event::{EventDetails, EventId, EventPatch, SavedEvent};
use crate::session::Session;
use crate::settings::SettingsStore;
use crate::traits::{Document, DocumentStore};

/// The store collection every user's events live in
const EVENTS_COLLECTION: &str = "events";

/// Event persistence, scoped to the single identity it was constructed with.
///
/// Every snapshot it returns is copy-on-write: updating an event produces a new
/// [`SavedEvent`], previously returned ones are left untouched.
pub struct EventRepository<S: DocumentStore> {
    store: Arc<S>,
    user_id: String,
}

impl<S: DocumentStore> EventRepository<S> {
    pub fn new(store: Arc<S>, session: &Session) -> Self {
        Self {
            store,
            user_id: session.user_id().to_string(),
        }
    }

    /// The identity this repository is scoped to
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Persist a brand-new event under a freshly minted id.
    ///
    /// Blindly retrying a failed call may create a duplicate, since every call
    /// mints a new id. Callers that need retry-safe creation should mint the id
    /// themselves and use [`Self::save_event_with_key`].
    pub async fn save_event(&self, details: EventDetails) -> Result<SavedEvent> {
        self.save_event_with_key(EventId::random(), details).await
    }

    /// Persist an event under a caller-chosen idempotency key.
    ///
    /// Safe to retry: every attempt writes the same document.
    pub async fn save_event_with_key(&self, id: EventId, details: EventDetails) -> Result<SavedEvent> {
        details.validate()?;
        let event = SavedEvent::new(id, details);
        log::debug!("Saving event {} for {}", event.id(), self.user_id);
        self.store
            .set(&self.user_id, EVENTS_COLLECTION, event.id().as_str(), to_document(&event)?)
            .await?;
        Ok(event)
    }

    /// Merge a partial update into an existing event and return the new snapshot.
    ///
    /// Fields omitted from the patch retain their prior values. Fails with
    /// [`Error::NotFound`] if `id` does not belong to this identity.
    pub async fn update_event(&self, id: &EventId, patch: EventPatch) -> Result<SavedEvent> {
        let current = self
            .get_event(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        log::debug!("Updating event {} (fields {:?})", id, patch.fields());
        let updated = current.apply(&patch);
        updated.details().validate()?;
        self.store
            .set(&self.user_id, EVENTS_COLLECTION, id.as_str(), to_document(&updated)?)
            .await?;
        Ok(updated)
    }

    /// Overwrite every user-editable field of an existing event.
    ///
    /// Unlike [`Self::update_event`] this also clears fields that `details`
    /// leaves empty. The sync engine uses it to apply a newer device-side
    /// version wholesale.
    pub async fn replace_event(&self, id: &EventId, details: EventDetails) -> Result<SavedEvent> {
        if self.get_event(id).await?.is_none() {
            return Err(Error::NotFound(id.clone()));
        }
        details.validate()?;
        let replaced = SavedEvent::new(id.clone(), details);
        self.store
            .set(&self.user_id, EVENTS_COLLECTION, id.as_str(), to_document(&replaced)?)
            .await?;
        Ok(replaced)
    }

    /// The event with this id, or `None` if this identity has no such event
    pub async fn get_event(&self, id: &EventId) -> Result<Option<SavedEvent>> {
        match self.store.get(&self.user_id, EVENTS_COLLECTION, id.as_str()).await? {
            None => Ok(None),
            Some(document) => Ok(Some(from_document(document)?)),
        }
    }

    /// Every event of this identity, ordered by id so callers iterate deterministically.
    ///
    /// Documents that cannot be decoded are skipped with a warning rather than
    /// failing the whole listing.
    pub async fn list_events(&self) -> Result<Vec<SavedEvent>> {
        let documents = self.store.list(&self.user_id, EVENTS_COLLECTION).await?;
        let mut events = Vec::with_capacity(documents.len());
        for (document_id, document) in documents {
            match from_document(document) {
                Ok(event) => events.push(event),
                Err(err) => {
                    log::warn!("Skipping undecodable event document {}: {}", document_id, err);
                }
            }
        }
        events.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(events)
    }

    /// Delete an event. Fails with [`Error::NotFound`] for stale ids
    pub async fn delete_event(&self, id: &EventId) -> Result<()> {
        if self.get_event(id).await?.is_none() {
            return Err(Error::NotFound(id.clone()));
        }
        log::debug!("Deleting event {} for {}", id, self.user_id);
        self.store.delete(&self.user_id, EVENTS_COLLECTION, id.as_str()).await?;
        Ok(())
    }
}

fn to_document(event: &SavedEvent) -> Result<Document> {
    match serde_json::to_value(event) {
        Ok(serde_json::Value::Object(document)) => Ok(document),
        Ok(_) => Err(Error::PermanentStore("event did not serialize to a document".to_string())),
        Err(err) => Err(Error::PermanentStore(format!("unable to serialize event: {}", err))),
    }
}

fn from_document(document: Document) -> Result<SavedEvent> {
    serde_json::from_value(serde_json::Value::Object(document))
        .map_err(|err| Error::PermanentStore(format!("unable to decode event document: {}", err)))
}

/// Hands out store handles scoped to an identity, constructing them once per
/// identity change instead of once per call.
pub struct RepositoryProvider<S: DocumentStore> {
    store: Arc<S>,
    current: Mutex<Option<CachedHandles<S>>>,
}

struct CachedHandles<S: DocumentStore> {
    user_id: String,
    events: Arc<EventRepository<S>>,
    settings: Arc<SettingsStore<S>>,
}

impl<S: DocumentStore> RepositoryProvider<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    /// The event repository for this identity, reused until the identity changes
    pub fn event_repository(&self, session: &Session) -> Arc<EventRepository<S>> {
        self.handles_for(session).events
    }

    /// The settings store for this identity, reused until the identity changes
    pub fn settings_store(&self, session: &Session) -> Arc<SettingsStore<S>> {
        self.handles_for(session).settings
    }

    fn handles_for(&self, session: &Session) -> CachedHandles<S> {
        let mut current = self.current.lock().unwrap();
        if let Some(handles) = current.as_ref() {
            if handles.user_id == session.user_id() {
                return handles.clone();
            }
        }
        log::debug!("Constructing store handles for {}", session.user_id());
        let handles = CachedHandles {
            user_id: session.user_id().to_string(),
            events: Arc::new(EventRepository::new(Arc::clone(&self.store), session)),
            settings: Arc::new(SettingsStore::new(Arc::clone(&self.store), session)),
        };
        *current = Some(handles.clone());
        handles
    }
}

impl<S: DocumentStore> Clone for CachedHandles<S> {
    fn clone(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            events: Arc::clone(&self.events),
            settings: Arc::clone(&self.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};

    use crate::event::EventFields;
    use crate::store::LocalStore;

    fn repository() -> EventRepository<LocalStore> {
        let session = Session::new("user-1");
        EventRepository::new(Arc::new(LocalStore::new()), &session)
    }

    fn details(title: &str) -> EventDetails {
        let start = Utc::now();
        EventDetails::new(title, start, start + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repository = repository();
        let saved = repository.save_event(details("Standup")).await.unwrap();

        let fetched = repository.get_event(saved.id()).await.unwrap().unwrap();
        assert_eq!(saved, fetched);
    }

    #[tokio::test]
    async fn test_empty_patch_update_is_field_equal_to_the_save() {
        let repository = repository();
        let saved = repository.save_event(details("Standup")).await.unwrap();

        let updated = repository.update_event(saved.id(), EventPatch::new()).await.unwrap();
        assert_eq!(saved.details(), updated.details());
        assert_eq!(saved.id(), updated.id());
    }

    #[tokio::test]
    async fn test_update_merges_field_level() {
        let repository = repository();
        let mut initial = details("Standup");
        initial.location = Some("Room 2".to_string());
        let saved = repository.save_event(initial).await.unwrap();

        let patch = EventPatch {
            title: Some("Standup (remote)".to_string()),
            ..EventPatch::default()
        };
        assert_eq!(patch.fields(), EventFields::TITLE);
        let updated = repository.update_event(saved.id(), patch).await.unwrap();

        assert_eq!(updated.details().title, "Standup (remote)");
        assert_eq!(updated.details().location, Some("Room 2".to_string()));
        assert!(updated.last_modified() >= saved.last_modified());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let repository = repository();
        let missing = EventId::random();
        match repository.update_event(&missing, EventPatch::new()).await {
            Err(Error::NotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_reversed_times() {
        let repository = repository();
        let start = Utc::now();
        let reversed = EventDetails::new("Backwards", start, start - Duration::hours(1));
        assert!(matches!(
            repository.save_event(reversed).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_save_with_key_is_idempotent() {
        let repository = repository();
        let key = EventId::random();

        repository.save_event_with_key(key.clone(), details("Review")).await.unwrap();
        repository.save_event_with_key(key.clone(), details("Review")).await.unwrap();

        assert_eq!(repository.list_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_clears_omitted_fields() {
        let repository = repository();
        let mut initial = details("Standup");
        initial.location = Some("Room 2".to_string());
        let saved = repository.save_event(initial).await.unwrap();

        let replaced = repository.replace_event(saved.id(), details("Standup")).await.unwrap();
        assert_eq!(replaced.details().location, None);
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_scoped_per_user() {
        let store = Arc::new(LocalStore::new());
        let mine = EventRepository::new(Arc::clone(&store), &Session::new("user-1"));
        let theirs = EventRepository::new(Arc::clone(&store), &Session::new("user-2"));

        mine.save_event(details("Mine A")).await.unwrap();
        mine.save_event(details("Mine B")).await.unwrap();
        theirs.save_event(details("Theirs")).await.unwrap();

        let listed = mine.list_events().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.windows(2).all(|w| w[0].id() <= w[1].id()));
        assert!(listed.iter().all(|e| e.details().title.starts_with("Mine")));
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let repository = repository();
        let saved = repository.save_event(details("Disposable")).await.unwrap();

        repository.delete_event(saved.id()).await.unwrap();
        assert!(repository.get_event(saved.id()).await.unwrap().is_none());
        assert!(matches!(
            repository.delete_event(saved.id()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_reuses_handles_per_identity() {
        let provider = RepositoryProvider::new(Arc::new(LocalStore::new()));
        let alice = Session::new("alice");
        let bob = Session::new("bob");

        let first = provider.event_repository(&alice);
        let second = provider.event_repository(&alice);
        assert!(Arc::ptr_eq(&first, &second));

        let other = provider.event_repository(&bob);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.user_id(), "bob");

        // Both handle kinds are cached together, per identity
        let settings = provider.settings_store(&bob);
        assert!(Arc::ptr_eq(&settings, &provider.settings_store(&bob)));
    }
}

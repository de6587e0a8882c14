//! This module reconciles the remote event set against the device calendar
//!
//! It is responsible for matching the two sides, resolving conflicts, and
//! reporting what happened to every event it considered.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::{ImportPolicy, SyncConfig};
use crate::event::EventId;
use crate::repository::EventRepository;
use crate::session::{Session, SessionContext};
use crate::traits::{DeviceCalendar, DeviceEvent, DeviceEventId, DocumentStore};

pub mod progress;
use progress::SyncProgress;
use progress::{FeedbackSender, SyncEvent};

/// What happened to one event during a sync
#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome {
    /// The store event had no device counterpart and was created on-device
    CreatedOnDevice(EventId),
    /// The device event had no correlation key; a store counterpart was
    /// created and the device event was linked to it
    Imported { id: EventId, device_id: DeviceEventId },
    /// The device side was newer; the store copy was overwritten
    UpdatedRemote(EventId),
    /// The store side was newer; the device copy was overwritten
    UpdatedOnDevice(EventId),
    /// Nothing to do: both sides already agree, or the correlation key has no
    /// remote counterpart anymore
    Skipped(EventId),
    /// The device event has no correlation key and configuration says to leave it alone
    IgnoredOnDevice(DeviceEventId),
    /// The operation for this event failed; the matching message is in [`SyncStatus::errors`]
    Failed(String),
}

/// The result of a [`SyncEngine::synchronize`] call.
///
/// Constructed fresh on every call, never persisted.
#[derive(Clone, Debug, Default)]
pub struct SyncStatus {
    /// The wall-clock time the sync finished.
    /// `None` when the engine aborted before reconciling anything
    pub last_sync: Option<DateTime<Utc>>,
    /// What happened to every event that was considered
    pub outcomes: Vec<ItemOutcome>,
    /// Engine- and item-level failures, in the order they were encountered
    pub errors: Vec<String>,
}

impl SyncStatus {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn aborted(progress: &mut SyncProgress) -> Self {
        Self {
            last_sync: None,
            outcomes: Vec::new(),
            errors: progress.take_errors(),
        }
    }
}

/// Reconciles the event repository of the current identity against the device calendar.
///
/// The engine owns no identity itself: it resolves the current [`Session`]
/// through the [`SessionContext`] at every call, and scopes an
/// [`EventRepository`] to it. Matching is driven by the correlation key each
/// linked device event carries; conflicts are resolved last-write-wins by
/// modification time. Item-level failures never abort a sync: they are
/// recorded in the returned [`SyncStatus`] and the remaining items proceed.
pub struct SyncEngine<S, C>
where
    S: DocumentStore,
    C: DeviceCalendar,
{
    session: SessionContext,
    store: Arc<S>,
    device: tokio::sync::Mutex<C>,
    config: SyncConfig,

    /// Identities with a sync currently in flight. A second `synchronize`
    /// call for the same identity is rejected, to avoid interleaved
    /// last-write-wins races against the same documents
    in_flight: Mutex<HashSet<String>>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl<S, C> SyncEngine<S, C>
where
    S: DocumentStore,
    C: DeviceCalendar,
{
    /// Create an engine with the default [`SyncConfig`]
    pub fn new(session: SessionContext, store: Arc<S>, device: C) -> Self {
        Self::with_config(session, store, device, SyncConfig::default())
    }

    pub fn with_config(session: SessionContext, store: Arc<S>, device: C, config: SyncConfig) -> Self {
        Self {
            session,
            store,
            device: tokio::sync::Mutex::new(device),
            config,
            in_flight: Mutex::new(HashSet::new()),
            last_sync: Mutex::new(None),
        }
    }

    /// The device calendar this engine reconciles against.
    ///
    /// Apart from tests and demos, there are very few (if any) reasons to
    /// access the device calendar directly.
    pub fn device(&self) -> &tokio::sync::Mutex<C> {
        &self.device
    }

    /// The completion time of the last successful `synchronize` call of this
    /// engine instance, or `None` if none completed yet
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.lock().unwrap()
    }

    /// Performs a synchronization, and provides feedback about the progress.
    ///
    /// See [`Self::synchronize`]
    pub async fn synchronize_with_feedback(&self, feedback_sender: FeedbackSender) -> SyncStatus {
        let mut progress = SyncProgress::new_with_feedback_channel(feedback_sender);
        self.run_sync(&mut progress).await
    }

    /// Performs a synchronization between the store and the device calendar.
    ///
    /// This never panics and never returns an error: engine-level failures
    /// (nobody signed in, store unreachable) come back as a status with a
    /// single explanatory error and no timestamp; item-level failures are
    /// recorded per item while the remaining items still sync.
    pub async fn synchronize(&self) -> SyncStatus {
        let mut progress = SyncProgress::new();
        self.run_sync(&mut progress).await
    }

    async fn run_sync(&self, progress: &mut SyncProgress) -> SyncStatus {
        progress.info("Starting a sync.");
        progress.feedback(SyncEvent::Started);

        let session = match self.session.require() {
            Ok(session) => session,
            Err(err) => {
                progress.error(&err.to_string());
                let status = SyncStatus::aborted(progress);
                progress.feedback(SyncEvent::Finished { success: false });
                return status;
            }
        };

        if self.begin(session.user_id()) == false {
            progress.error(&format!("A sync is already running for {}. Rejecting this one.", session.user_id()));
            let status = SyncStatus::aborted(progress);
            progress.feedback(SyncEvent::Finished { success: false });
            return status;
        }

        let status = self.run_sync_inner(&session, progress).await;
        self.finish(session.user_id());

        if let Some(completed_at) = status.last_sync {
            *self.last_sync.lock().unwrap() = Some(completed_at);
        }
        progress.feedback(SyncEvent::Finished { success: status.is_success() });
        status
    }

    async fn run_sync_inner(&self, session: &Session, progress: &mut SyncProgress) -> SyncStatus {
        let repository = EventRepository::new(Arc::clone(&self.store), session);
        let (from, to) = self.config.window(Utc::now());
        progress.debug(&format!("Reconciliation window: {} to {}", from, to));

        // Engine-level failures: without both full sets there is nothing to reconcile
        let remote_events = match repository.list_events().await {
            Ok(events) => events,
            Err(err) => {
                progress.error(&format!("Unable to list the remote events: {}", err));
                return SyncStatus::aborted(progress);
            }
        };

        let mut device = self.device.lock().await;
        let mut device_events = match device.events_between(from, to).await {
            Ok(events) => events,
            Err(err) => {
                progress.error(&format!("Unable to list the device calendar: {}", err));
                return SyncStatus::aborted(progress);
            }
        };
        // Sorted so per-item processing (and thus error ordering) is deterministic
        device_events.sort_by(|a, b| a.id.cmp(&b.id));

        progress.feedback(SyncEvent::InProgress {
            details: format!("{} remote events, {} device events", remote_events.len(), device_events.len()),
        });

        // Step 1 - index the device side by correlation key
        let mut device_by_key: HashMap<EventId, DeviceEvent> = HashMap::new();
        let mut unlinked: Vec<DeviceEvent> = Vec::new();
        for event in device_events {
            match event.correlation_key.clone() {
                None => unlinked.push(event),
                Some(key) => {
                    let event_id = event.id.clone();
                    if let Some(previous) = device_by_key.insert(key.clone(), event) {
                        progress.error(&format!(
                            "Inconsistent state: device events {} and {} both claim correlation key {}",
                            previous.id, event_id, key
                        ));
                    }
                }
            }
        }

        let mut outcomes = Vec::new();

        // Step 2 - walk the remote set, in id order
        for remote in &remote_events {
            progress.trace(&format!("***** Considering remote event {}...", remote.id()));

            let start = remote.details().start;
            if start < from || start > to {
                // Matching it against a windowed device listing would re-create
                // it on-device at every sync
                progress.trace(&format!("*   {} starts outside the window. Ignoring it this time", remote.id()));
                continue;
            }

            match device_by_key.remove(remote.id()) {
                None => {
                    progress.debug(&format!("*   {} is missing on the device", remote.id()));
                    progress.feedback(SyncEvent::InProgress { details: remote.details().title.clone() });
                    match device.create_event(remote.details(), remote.id()).await {
                        Err(err) => {
                            progress.error(&format!("Unable to create event {} on the device: {}", remote.id(), err));
                            outcomes.push(ItemOutcome::Failed(remote.id().to_string()));
                        },
                        Ok(device_id) => {
                            progress.trace(&format!("*   {} created as device event {}", remote.id(), device_id));
                            outcomes.push(ItemOutcome::CreatedOnDevice(remote.id().clone()));
                        },
                    }
                },
                Some(local) => {
                    let differing = remote.details().fields_differing_from(&local.details);
                    if differing.is_empty() {
                        progress.trace(&format!("*   {} is identical on both sides", remote.id()));
                        outcomes.push(ItemOutcome::Skipped(remote.id().clone()));
                    } else if local.last_modified > remote.last_modified() {
                        // The device side is newer: last write wins
                        progress.debug(&format!("*   {} is newer on the device ({:?} differ)", remote.id(), differing));
                        progress.feedback(SyncEvent::InProgress { details: local.details.title.clone() });
                        let result = match local.details.validate() {
                            Err(err) => Err(err),
                            Ok(()) => repository.replace_event(remote.id(), local.details.clone()).await.map(|_| ()),
                        };
                        match result {
                            Err(err) => {
                                progress.error(&format!("Unable to apply device event {} to the store: {}", local.id, err));
                                outcomes.push(ItemOutcome::Failed(remote.id().to_string()));
                            },
                            Ok(()) => outcomes.push(ItemOutcome::UpdatedRemote(remote.id().clone())),
                        }
                    } else {
                        // The store side is newer (or the timestamps are tied): push it to the device
                        progress.debug(&format!("*   {} is newer in the store ({:?} differ)", remote.id(), differing));
                        progress.feedback(SyncEvent::InProgress { details: remote.details().title.clone() });
                        match device.update_event(&local.id, remote.details()).await {
                            Err(err) => {
                                progress.error(&format!("Unable to update device event {}: {}", local.id, err));
                                outcomes.push(ItemOutcome::Failed(remote.id().to_string()));
                            },
                            Ok(()) => outcomes.push(ItemOutcome::UpdatedOnDevice(remote.id().clone())),
                        }
                    }
                },
            }
        }

        // Step 3 - linked device events nobody claimed. Their store counterpart
        // is gone; re-importing them would resurrect deleted events, so they
        // are left alone
        let mut stale: Vec<(EventId, DeviceEvent)> = device_by_key.into_iter().collect();
        stale.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, local) in stale {
            progress.debug(&format!("# Device event {} is linked to {}, which no longer exists in the store. Leaving it alone", local.id, key));
            outcomes.push(ItemOutcome::Skipped(key));
        }

        // Step 4 - device events with no correlation key
        for local in unlinked {
            progress.trace(&format!("##### Considering unlinked device event {}...", local.id));
            match self.config.import_policy {
                ImportPolicy::Ignore => {
                    progress.debug(&format!("#   {} has no correlation key. Configuration says to ignore it", local.id));
                    outcomes.push(ItemOutcome::IgnoredOnDevice(local.id.clone()));
                },
                ImportPolicy::Import => {
                    progress.debug(&format!("#   {} has no correlation key. Importing it", local.id));
                    progress.feedback(SyncEvent::InProgress { details: local.details.title.clone() });

                    if let Err(err) = local.details.validate() {
                        progress.error(&format!("Device event {} cannot be imported: {}", local.id, err));
                        outcomes.push(ItemOutcome::Failed(local.id.clone()));
                        continue;
                    }

                    let key = EventId::random();
                    match repository.save_event_with_key(key.clone(), local.details.clone()).await {
                        Err(err) => {
                            progress.error(&format!("Unable to import device event {}: {}", local.id, err));
                            outcomes.push(ItemOutcome::Failed(local.id.clone()));
                        },
                        Ok(_) => match device.link_event(&local.id, &key).await {
                            Err(err) => {
                                progress.error(&format!("Imported device event {} but could not link it back: {}", local.id, err));
                                outcomes.push(ItemOutcome::Failed(local.id.clone()));
                            },
                            Ok(()) => outcomes.push(ItemOutcome::Imported { id: key, device_id: local.id.clone() }),
                        },
                    }
                },
            }
        }

        progress.info("Sync ended");

        SyncStatus {
            last_sync: Some(Utc::now()),
            outcomes,
            errors: progress.take_errors(),
        }
    }

    /// Claim the in-flight slot for this identity. Returns false if a sync is already running
    fn begin(&self, user_id: &str) -> bool {
        self.in_flight.lock().unwrap().insert(user_id.to_string())
    }

    fn finish(&self, user_id: &str) {
        self.in_flight.lock().unwrap().remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::InMemoryCalendar;
    use crate::store::LocalStore;

    fn engine() -> SyncEngine<LocalStore, InMemoryCalendar> {
        SyncEngine::new(
            SessionContext::fixed(Session::new("user-1")),
            Arc::new(LocalStore::new()),
            InMemoryCalendar::new(),
        )
    }

    #[tokio::test]
    async fn test_a_concurrent_sync_is_rejected() {
        let engine = engine();

        // Simulate a sync already in flight for this identity
        assert!(engine.begin("user-1"));

        let status = engine.synchronize().await;
        assert_eq!(status.errors.len(), 1);
        assert!(status.errors[0].contains("already running"));
        assert!(status.last_sync.is_none());

        // Once the slot is free again, syncing resumes normally
        engine.finish("user-1");
        let status = engine.synchronize().await;
        assert!(status.is_success());
        assert!(status.last_sync.is_some());
    }

    #[tokio::test]
    async fn test_last_sync_is_remembered_on_success_only() {
        let engine = engine();
        assert!(engine.last_sync().is_none());

        let status = engine.synchronize().await;
        assert_eq!(engine.last_sync(), status.last_sync);

        // An aborted sync does not move the timestamp
        let recorded = engine.last_sync();
        assert!(engine.begin("user-1"));
        engine.synchronize().await;
        assert_eq!(engine.last_sync(), recorded);
    }
}

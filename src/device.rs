//! An in-process device calendar
//!
//! Stands in for the OS calendar in tests and demos. Device-local ids are
//! minted sequentially, and the correlation key lives exactly where the real
//! thing keeps it: on the event record itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DeviceError;
use crate::event::{EventDetails, EventId};
use crate::traits::{DeviceCalendar, DeviceEvent, DeviceEventId};

#[cfg(feature = "local_store_mocks_remote_store")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "local_store_mocks_remote_store")]
use crate::mock_behaviour::MockBehaviour;

/// A device calendar backed by process memory
#[derive(Default)]
pub struct InMemoryCalendar {
    events: HashMap<DeviceEventId, DeviceEvent>,
    next_id: u32,

    #[cfg(feature = "local_store_mocks_remote_store")]
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "local_store_mocks_remote_store")]
    pub fn set_mock_behaviour(&mut self, behaviour: Option<Arc<Mutex<MockBehaviour>>>) {
        self.mock_behaviour = behaviour;
    }

    /// Put an event on the calendar as if the user had created or edited it
    /// on-device, with full control over its modification time and link state
    pub fn seed_event(
        &mut self,
        details: EventDetails,
        last_modified: DateTime<Utc>,
        correlation_key: Option<EventId>,
    ) -> DeviceEventId {
        let id = self.mint_id();
        self.events.insert(id.clone(), DeviceEvent {
            id: id.clone(),
            details,
            last_modified,
            correlation_key,
        });
        id
    }

    pub fn event(&self, id: &DeviceEventId) -> Option<&DeviceEvent> {
        self.events.get(id)
    }

    /// The event linked to the given repository id, if any
    pub fn event_by_correlation_key(&self, key: &EventId) -> Option<&DeviceEvent> {
        self.events.values().find(|event| event.correlation_key.as_ref() == Some(key))
    }

    pub fn events(&self) -> impl Iterator<Item = &DeviceEvent> {
        self.events.values()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn mint_id(&mut self) -> DeviceEventId {
        self.next_id += 1;
        format!("device-{}", self.next_id)
    }
}

#[async_trait]
impl DeviceCalendar for InMemoryCalendar {
    async fn events_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DeviceEvent>, DeviceError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_events_between()?;
        }

        Ok(self.events
            .values()
            .filter(|event| event.details.start >= from && event.details.start <= to)
            .cloned()
            .collect())
    }

    async fn create_event(&mut self, details: &EventDetails, key: &EventId) -> Result<DeviceEventId, DeviceError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_create_event()?;
        }

        let id = self.mint_id();
        self.events.insert(id.clone(), DeviceEvent {
            id: id.clone(),
            details: details.clone(),
            last_modified: Utc::now(),
            correlation_key: Some(key.clone()),
        });
        Ok(id)
    }

    async fn update_event(&mut self, id: &DeviceEventId, details: &EventDetails) -> Result<(), DeviceError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_update_event()?;
        }

        match self.events.get_mut(id) {
            None => Err(DeviceError::Api(format!("no device event with id {}", id))),
            Some(event) => {
                event.details = details.clone();
                event.last_modified = Utc::now();
                Ok(())
            }
        }
    }

    async fn link_event(&mut self, id: &DeviceEventId, key: &EventId) -> Result<(), DeviceError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_link_event()?;
        }

        match self.events.get_mut(id) {
            None => Err(DeviceError::Api(format!("no device event with id {}", id))),
            Some(event) => {
                event.correlation_key = Some(key.clone());
                Ok(())
            }
        }
    }
}

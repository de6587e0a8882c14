//! This module provides ways to tweak the in-process collaborators, so that they can return errors on some tests
#![cfg(feature = "local_store_mocks_remote_store")]

use crate::error::{DeviceError, StoreError};

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a function fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    // From the DocumentStore trait
    pub get_behaviour: (u32, u32),
    pub set_behaviour: (u32, u32),
    pub merge_behaviour: (u32, u32),
    pub list_behaviour: (u32, u32),
    pub delete_behaviour: (u32, u32),

    // From the DeviceCalendar trait
    pub events_between_behaviour: (u32, u32),
    pub create_event_behaviour: (u32, u32),
    pub update_event_behaviour: (u32, u32),
    pub link_event_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            get_behaviour: (0, n_fails),
            set_behaviour: (0, n_fails),
            merge_behaviour: (0, n_fails),
            list_behaviour: (0, n_fails),
            delete_behaviour: (0, n_fails),
            events_between_behaviour: (0, n_fails),
            create_event_behaviour: (0, n_fails),
            update_event_behaviour: (0, n_fails),
            link_event_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_get(&mut self) -> Result<(), StoreError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.get_behaviour, "get").map_err(StoreError::Transient)
    }
    pub fn can_set(&mut self) -> Result<(), StoreError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.set_behaviour, "set").map_err(StoreError::Transient)
    }
    pub fn can_merge(&mut self) -> Result<(), StoreError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.merge_behaviour, "merge").map_err(StoreError::Transient)
    }
    pub fn can_list(&mut self) -> Result<(), StoreError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_behaviour, "list").map_err(StoreError::Transient)
    }
    pub fn can_delete(&mut self) -> Result<(), StoreError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_behaviour, "delete").map_err(StoreError::Transient)
    }

    pub fn can_events_between(&mut self) -> Result<(), DeviceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.events_between_behaviour, "events_between").map_err(DeviceError::Api)
    }
    pub fn can_create_event(&mut self) -> Result<(), DeviceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_event_behaviour, "create_event").map_err(DeviceError::Api)
    }
    pub fn can_update_event(&mut self) -> Result<(), DeviceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.update_event_behaviour, "update_event").map_err(DeviceError::Api)
    }
    pub fn can_link_event(&mut self) -> Result<(), DeviceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.link_event_behaviour, "link_event").map_err(DeviceError::Api)
    }
}

/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), String> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 = value.0 - 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else {
        if remaining_failures > 0 {
            value.1 = value.1 - 1;
            log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
            Err(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value))
        } else {
            log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
            Ok(())
        }
    }
}

//! Some utility functions

use std::sync::Arc;

use crate::device::InMemoryCalendar;
use crate::engine::{ItemOutcome, SyncStatus};
use crate::repository::EventRepository;
use crate::session::Session;
use crate::traits::DocumentStore;

/// A debug utility that pretty-prints the result of a sync
pub fn print_status(status: &SyncStatus) {
    match &status.last_sync {
        None => println!("Sync aborted"),
        Some(at) => println!("Sync finished at {}", at),
    }
    for outcome in &status.outcomes {
        let line = match outcome {
            ItemOutcome::CreatedOnDevice(id) => format!("+d {}", id),
            ItemOutcome::Imported { id, device_id } => format!("+r {} (imported from {})", id, device_id),
            ItemOutcome::UpdatedRemote(id) => format!("~r {}", id),
            ItemOutcome::UpdatedOnDevice(id) => format!("~d {}", id),
            ItemOutcome::Skipped(id) => format!(" = {}", id),
            ItemOutcome::IgnoredOnDevice(device_id) => format!(" . {}", device_id),
            ItemOutcome::Failed(id) => format!(" ! {}", id),
        };
        println!("    {}", line);
    }
    for error in &status.errors {
        println!("    ERROR {}", error);
    }
}

/// A debug utility that pretty-prints a device calendar
pub fn print_device_calendar(calendar: &InMemoryCalendar) {
    let mut events: Vec<_> = calendar.events().collect();
    events.sort_by(|a, b| a.id.cmp(&b.id));
    for event in events {
        let link = match &event.correlation_key {
            Some(key) => format!("-> {}", key),
            None => String::from("(unlinked)"),
        };
        println!("    {} {}\t{}", event.id, event.details.title, link);
    }
}

/// A debug utility that pretty-prints a user's remote events
pub async fn print_remote_events<S: DocumentStore>(store: Arc<S>, user_id: &str) {
    let repository = EventRepository::new(store, &Session::new(user_id));
    match repository.list_events().await {
        Err(err) => println!("    <unable to list remote events: {}>", err),
        Ok(events) => {
            for event in events {
                println!("    {} {}\t(modified {})", event.id(), event.details().title, event.last_modified());
            }
        },
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};

use datebook::contacts::{attendees_matching, StaticContacts};
use datebook::device::InMemoryCalendar;
use datebook::engine::SyncEngine;
use datebook::store::LocalStore;
use datebook::traits::Contact;
use datebook::{EventDetails, EventRepository, Session, SessionContext};

/// A small end-to-end tour: save an event with attendees, seed the device
/// calendar with an unsynced one, and reconcile the two.
#[tokio::main]
async fn main() {
    env_logger::init();

    let store = Arc::new(LocalStore::new());
    let session = Session::with_profile("demo-user", "Demo User", "demo@example.com");
    let repository = EventRepository::new(Arc::clone(&store), &session);

    let contacts = StaticContacts::new(vec![
        Contact { name: "Ada Lovelace".to_string(), email: Some("ada@example.com".to_string()) },
    ]);

    let start = Utc::now() + Duration::days(1);
    let mut coffee = EventDetails::new("Coffee with Ada", start, start + Duration::hours(1));
    coffee.attendees = attendees_matching(&contacts, "ada").await.unwrap();
    repository.save_event(coffee).await.unwrap();

    let mut device = InMemoryCalendar::new();
    let lunch_start = Utc::now() + Duration::days(2);
    device.seed_event(
        EventDetails::new("Team lunch", lunch_start, lunch_start + Duration::hours(1)),
        Utc::now(),
        None,
    );

    let engine = SyncEngine::new(SessionContext::fixed(session), Arc::clone(&store), device);
    let status = engine.synchronize().await;

    datebook::utils::print_status(&status);
    println!("--- device calendar after sync ---");
    datebook::utils::print_device_calendar(&*engine.device().lock().await);
    println!("--- remote events after sync ---");
    datebook::utils::print_remote_events(store, "demo-user").await;
}

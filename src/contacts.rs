//! Read-only lookup into the device address book
//!
//! Contacts are consumed at event-creation time, to attach attendees to an
//! [`EventDetails`](crate::EventDetails). The sync engine never reads them.

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::event::Attendee;
use crate::traits::{Contact, ContactsSource};

impl From<Contact> for Attendee {
    fn from(contact: Contact) -> Attendee {
        Attendee {
            name: contact.name,
            email: contact.email,
        }
    }
}

/// Look up contacts matching `term` and turn them into attendees
pub async fn attendees_matching<C: ContactsSource>(contacts: &C, term: &str) -> Result<Vec<Attendee>, DeviceError> {
    let found = contacts.search(term).await?;
    Ok(found.into_iter().map(Attendee::from).collect())
}

/// A fixed, in-memory contacts source
#[derive(Default)]
pub struct StaticContacts {
    contacts: Vec<Contact>,
}

impl StaticContacts {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }

    pub fn add(&mut self, contact: Contact) {
        self.contacts.push(contact);
    }
}

#[async_trait]
impl ContactsSource for StaticContacts {
    async fn search(&self, term: &str) -> Result<Vec<Contact>, DeviceError> {
        let needle = term.to_lowercase();
        Ok(self.contacts
            .iter()
            .filter(|contact| contact.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> StaticContacts {
        StaticContacts::new(vec![
            Contact { name: "Ada Lovelace".to_string(), email: Some("ada@example.com".to_string()) },
            Contact { name: "Charles Babbage".to_string(), email: None },
        ])
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let found = source().search("ada").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_attendees_matching() {
        let attendees = attendees_matching(&source(), "babbage").await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].name, "Charles Babbage");
        assert_eq!(attendees[0].email, None);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_an_error() {
        assert!(source().search("nobody").await.unwrap().is_empty());
    }
}

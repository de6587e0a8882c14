//! The authenticated identity, and the channel it is delivered on
//!
//! The authentication collaborator owns the [`IdentitySender`] end and pushes a
//! fresh [`Session`] snapshot on every auth-state change (`None` on sign-out).
//! Everything else in this crate resolves "who is signed in" through a
//! [`SessionContext`], never through an ambient global.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An immutable snapshot of the signed-in user.
///
/// A new snapshot replaces the previous one wholesale on every auth-state
/// change; no field of an existing snapshot is ever updated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    user_id: String,
    display_name: Option<String>,
    email: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
        }
    }

    pub fn with_profile(user_id: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: Some(display_name.into()),
            email: Some(email.into()),
        }
    }

    /// The identifier every document of this user is scoped to
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// See [`identity_channel`]
pub type IdentitySender = tokio::sync::watch::Sender<Option<Arc<Session>>>;
/// See [`identity_channel`]
pub type IdentityReceiver = tokio::sync::watch::Receiver<Option<Arc<Session>>>;

/// Create an identity channel.
///
/// Hand the sender to the authentication collaborator; it sends `Some(session)`
/// on sign-in and `None` on sign-out. The returned [`SessionContext`] is given
/// (cloned) to every component that needs the current identity.
pub fn identity_channel() -> (IdentitySender, SessionContext) {
    let (sender, receiver) = tokio::sync::watch::channel(None);
    (sender, SessionContext { receiver })
}

/// The reading end of the identity channel.
///
/// The swap is atomic: a reader observes either the previous or the new
/// identity, never a partial one.
#[derive(Clone)]
pub struct SessionContext {
    receiver: IdentityReceiver,
}

impl SessionContext {
    /// A context that always resolves to the given identity.
    ///
    /// Handy for tests and for one-shot tools that have no auth flow.
    pub fn fixed(session: Session) -> Self {
        let (_sender, receiver) = tokio::sync::watch::channel(Some(Arc::new(session)));
        // The sender is dropped here; the receiver keeps returning the last value
        Self { receiver }
    }

    /// The current identity, or `None` when signed out
    pub fn current(&self) -> Option<Arc<Session>> {
        self.receiver.borrow().clone()
    }

    /// The current identity, or [`Error::Unauthenticated`]
    pub fn require(&self) -> Result<Arc<Session>> {
        self.current().ok_or(Error::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_swap() {
        let (sender, context) = identity_channel();
        assert!(context.current().is_none());
        assert!(matches!(context.require(), Err(Error::Unauthenticated)));

        let alice = Arc::new(Session::with_profile("user-1", "Alice", "alice@example.com"));
        sender.send(Some(alice.clone())).unwrap();
        assert_eq!(context.require().unwrap().user_id(), "user-1");

        // Replaced wholesale on the next auth-state change
        let bob = Arc::new(Session::new("user-2"));
        sender.send(Some(bob)).unwrap();
        let current = context.current().unwrap();
        assert_eq!(current.user_id(), "user-2");
        assert_eq!(current.display_name(), None);

        sender.send(None).unwrap();
        assert!(context.current().is_none());
    }

    #[test]
    fn test_clones_observe_the_same_identity() {
        let (sender, context) = identity_channel();
        let clone = context.clone();

        sender.send(Some(Arc::new(Session::new("user-9")))).unwrap();
        assert_eq!(clone.require().unwrap().user_id(), "user-9");
    }

    #[test]
    fn test_fixed_context() {
        let context = SessionContext::fixed(Session::new("tester"));
        assert_eq!(context.require().unwrap().user_id(), "tester");
    }
}

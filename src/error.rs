//! The error taxonomy shared by every component of this crate

use thiserror::Error;

use crate::event::EventId;

/// Most fallible functions of this crate share the same error type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid user input. Retrying the same call will fail the same way
    #[error("invalid event data: {0}")]
    Validation(String),

    /// No user is signed in
    #[error("no user is signed in")]
    Unauthenticated,

    /// The requested event does not exist for the current user
    #[error("event {0} does not exist")]
    NotFound(EventId),

    /// The document store could not be reached. Retrying later may succeed
    #[error("the store could not be reached: {0}")]
    TransientStore(String),

    /// The document store rejected the request. Retrying will not help
    #[error("the store rejected the request: {0}")]
    PermanentStore(String),

    /// The device calendar refused or failed an operation
    #[error("device calendar failure: {0}")]
    DeviceCalendar(String),
}

impl Error {
    /// Whether the very same call may succeed if attempted again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }

    /// A stable, human-readable message, suited for UI state.
    ///
    /// Unlike `Display`, these strings do not embed ids or backend details.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => format!("Invalid event: {}", msg),
            Self::Unauthenticated => "Please sign in first.".to_string(),
            Self::NotFound(_) => "This event no longer exists.".to_string(),
            Self::TransientStore(_) => "Could not reach the server. Check your connection and try again.".to_string(),
            Self::PermanentStore(_) => "The server rejected this request.".to_string(),
            Self::DeviceCalendar(_) => "Could not access the device calendar.".to_string(),
        }
    }
}

/// Errors returned by [`DocumentStore`](crate::traits::DocumentStore) implementations.
///
/// The transient-vs-permanent distinction is the only thing callers can act on,
/// so it is the only structure this type carries.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Network or backend hiccup. The same request may succeed later
    #[error("transient store error: {0}")]
    Transient(String),

    /// The store refused the request. Retrying is pointless
    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Error {
        match err {
            StoreError::Transient(msg) => Error::TransientStore(msg),
            StoreError::Permanent(msg) => Error::PermanentStore(msg),
        }
    }
}

/// Errors returned by the device-side collaborators (calendar and contacts)
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The user has not granted calendar (or contacts) access to the app
    #[error("permission denied by the device")]
    PermissionDenied,

    /// The OS-level API call failed
    #[error("device API error: {0}")]
    Api(String),

    /// The device returned a record this crate cannot make sense of
    #[error("malformed device record: {0}")]
    Malformed(String),
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Error {
        Error::DeviceCalendar(err.to_string())
    }
}

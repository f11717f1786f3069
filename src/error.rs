use thiserror::Error;

use crate::model::Id;

/// Why a reservation request was refused before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The request touches a declared unavailability window.
    Unavailable { window_id: Option<Id> },
    /// The request overlaps another reservation on the same space.
    Reserved { reservation_id: Option<Id> },
}

impl Conflict {
    pub fn label(&self) -> &'static str {
        match self {
            Conflict::Unavailable { .. } => "unavailable",
            Conflict::Reserved { .. } => "reserved",
        }
    }

    /// Text shown to the user when the booking is refused.
    pub fn message(&self) -> &'static str {
        match self {
            Conflict::Unavailable { .. } => {
                "This space is unavailable for the selected dates."
            }
            Conflict::Reserved { .. } => {
                "This space is already reserved for the selected dates."
            }
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::Unavailable { window_id: Some(id) } => write!(f, "unavailable (window {id})"),
            Conflict::Unavailable { window_id: None } => write!(f, "unavailable"),
            Conflict::Reserved { reservation_id: Some(id) } => write!(f, "reserved (reservation {id})"),
            Conflict::Reserved { reservation_id: None } => write!(f, "reserved"),
        }
    }
}

/// A payment whose foreign key does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingReference {
    #[error("payment {payment:?} has no {kind} reference")]
    Unlinked { payment: Option<Id>, kind: &'static str },
    #[error("reservation {0} not found")]
    Reservation(Id),
    #[error("subscription {0} not found")]
    Subscription(Id),
    #[error("event {0} not found")]
    Event(Id),
    #[error("no email on {kind} {id}")]
    NoEmail { kind: &'static str, id: Id },
    #[error("payment {0} not found")]
    Payment(Id),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The backend answered 401; the session has been cleared.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reservation conflict: {0}")]
    Conflict(Conflict),

    #[error("Missing reference: {0}")]
    MissingReference(#[from] MissingReference),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

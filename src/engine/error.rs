use ulid::Ulid;

use crate::model::{ReservationStatus, Role};

#[derive(Debug)]
pub enum BookingError {
    /// Malformed or past-dated range.
    InvalidInterval(&'static str),
    /// Overlaps the occupying reservation carried in the variant.
    Conflict(Ulid),
    /// Vehicle unknown to the catalog, or retired.
    VehicleUnavailable(Ulid),
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    Unauthorized {
        role: Role,
        target: ReservationStatus,
    },
    NotFound(Ulid),
    /// Could not acquire the vehicle's exclusive section in time. The one
    /// retryable failure — callers back off and retry.
    Busy(Ulid),
    LimitExceeded(&'static str),
    Wal(String),
}

impl BookingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Busy(_))
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidInterval(msg) => write!(f, "invalid interval: {msg}"),
            BookingError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            BookingError::VehicleUnavailable(id) => {
                write!(f, "vehicle unavailable: {id}")
            }
            BookingError::InvalidTransition { from, to } => {
                write!(f, "illegal transition: {from} -> {to}")
            }
            BookingError::Unauthorized { role, target } => {
                write!(f, "role {role} may not set status {target}")
            }
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
            BookingError::Busy(id) => write!(f, "vehicle busy, retry: {id}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

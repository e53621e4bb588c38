use crate::domain::booking::BookingStatus;
use crate::domain::payment::PaymentStatus;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Booking validation and lookup failures. Reported to the caller, never
/// retried automatically.
#[derive(Error, Debug, PartialEq)]
pub enum BookingError {
    #[error("check-out date must be after check-in date")]
    InvalidDateRange,
    #[error("guest count {requested} exceeds the listing capacity of {max}")]
    CapacityExceeded { requested: u32, max: u32 },
    #[error("dates overlap an existing booking for this listing")]
    OverlapConflict,
    #[error("cannot cancel a {0} booking")]
    CancelNotAllowed(BookingStatus),
    #[error("booking not found: {0}")]
    NotFound(Uuid),
}

/// Failures talking to the external payment gateway.
///
/// `Network` and `Malformed` are transient from the caller's point of view
/// and may be retried under a bounded policy; `Rejected` is terminal for the
/// attempt and surfaces to the user.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Network(String),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("unparseable gateway response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether the caller may retry the operation later. `Malformed` responses
    /// are retried like network failures but logged distinctly at the client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Malformed(_))
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("booking already has a completed payment")]
    AlreadyPaid,
    #[error("booking is {status} and cannot accept a payment")]
    BookingNotEligible { status: BookingStatus },
    #[error("no payment found for reference {0}")]
    UnknownReference(String),
    #[error("illegal payment transition from {from} on {event}")]
    IllegalTransition {
        from: PaymentStatus,
        event: &'static str,
    },
    #[error("payment verification exhausted after {attempts} attempts")]
    VerificationExhausted { attempts: u32 },
    #[error("store unavailable: {0}")]
    Store(String),
}

use super::booking::Booking;
use super::payment::{Amount, Payment, PaymentReference};
use super::{BookingId, GuestId, PaymentId};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Contact details forwarded to the gateway with an initiate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Everything the gateway needs to open a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub reference: PaymentReference,
    pub amount: Amount,
    pub currency: String,
    pub customer: CustomerInfo,
    pub callback_url: String,
    pub return_url: String,
    pub description: String,
}

/// Gateway acknowledgement of an initiate call.
#[derive(Debug, Clone)]
pub struct GatewayAck {
    pub checkout_handle: String,
    pub transaction_id: Option<String>,
    pub raw: Value,
}

/// Transaction status as reported by the gateway, from a verify poll or a
/// webhook. Anything the gateway says that we don't recognize is `Unknown`
/// and treated like `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatusKind {
    Success,
    Pending,
    Failed,
    Cancelled,
    Unknown,
}

impl GatewayStatusKind {
    pub fn from_wire(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "pending" => Self::Pending,
            "failed" | "failure" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub kind: GatewayStatusKind,
    pub transaction_id: Option<String>,
    pub raw: Value,
}

/// Outbound adapter for the external payment gateway.
///
/// Calls are bounded by a timeout and never retried inside the client; retry
/// policy belongs to the caller, which can tell "retry this verify later"
/// apart from "this initiate failed, surface it now".
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(
        &self,
        request: &CheckoutRequest,
    ) -> std::result::Result<GatewayAck, GatewayError>;

    async fn verify(
        &self,
        reference: &PaymentReference,
    ) -> std::result::Result<GatewayStatus, GatewayError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a booking, checking the overlap invariant atomically: no other
    /// non-cancelled booking for the same listing may intersect the
    /// candidate's `[check_in, check_out)` range. The check and the insert
    /// are a single writer section per listing.
    async fn insert(&self, booking: Booking) -> Result<()>;
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;
    async fn update(&self, booking: Booking) -> Result<()>;
    async fn for_guest(&self, guest: GuestId) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn find_by_reference(&self, reference: &PaymentReference) -> Result<Option<Payment>>;
    async fn for_booking(&self, booking: BookingId) -> Result<Vec<Payment>>;
}

/// Boundary to the notification system. Fired exactly once per terminal
/// transition into completed/failed; delivery itself is out of scope.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn payment_completed(&self, booking: &Booking, payment: &Payment);
    async fn payment_failed(&self, booking: &Booking, payment: &Payment, reason: &str);
}

pub type BookingStoreBox = Box<dyn BookingStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type NotificationPortBox = Box<dyn NotificationPort>;

use super::{BookingId, PaymentId};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so that booking prices and payment
/// amounts are positive by construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller-generated correlation token: the idempotency key sent to the
/// gateway on initiate and the lookup key for webhook and verify signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(Uuid);

impl PaymentReference {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for PaymentReference {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PaymentReference {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Pending and processing payments are the only non-terminal ones; a
    /// booking has at most one of these at a time.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// One settlement attempt for a booking via the external gateway.
///
/// Mutated only through the guarded methods below, and only inside a single
/// state-machine transition per call. Undefined transitions come back as
/// `IllegalTransition` instead of silently passing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub reference: PaymentReference,
    /// Set once, when the gateway first acknowledges the transaction.
    pub gateway_transaction_id: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
    /// Opaque URL the guest uses to complete checkout; present once
    /// processing.
    pub checkout_handle: Option<String>,
    /// Audit trail of everything the gateway told us, merge-accumulated
    /// across initiate, verify and webhook payloads.
    pub raw_gateway_payload: Value,
    pub verification_attempts: u32,
    pub last_verification_at: Option<DateTime<Utc>>,
    /// Set exactly once, at the first transition into `completed`.
    pub paid_at: Option<DateTime<Utc>>,
    /// True only when a webhook, not a polled verify, produced the completed
    /// transition.
    pub webhook_verified: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: BookingId, amount: Amount, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            reference: PaymentReference::generate(),
            gateway_transaction_id: None,
            amount,
            currency: currency.to_owned(),
            status: PaymentStatus::Pending,
            checkout_handle: None,
            raw_gateway_payload: Value::Object(Default::default()),
            verification_attempts: 0,
            last_verification_at: None,
            paid_at: None,
            webhook_verified: false,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Gateway acknowledged the transaction: pending -> processing, storing
    /// the checkout handle the guest is redirected to.
    pub fn accept(
        &mut self,
        checkout_handle: String,
        transaction_id: Option<String>,
        raw: &Value,
    ) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Processing;
                self.checkout_handle = Some(checkout_handle);
                if self.gateway_transaction_id.is_none() {
                    self.gateway_transaction_id = transaction_id;
                }
                self.absorb_payload(raw);
                self.touch();
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                event: "gateway accepted",
            }),
        }
    }

    /// Gateway reported success: processing -> completed. `paid_at` is set
    /// here and nowhere else.
    pub fn complete(&mut self, via_webhook: bool) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Processing => {
                self.status = PaymentStatus::Completed;
                self.paid_at = Some(Utc::now());
                self.webhook_verified = via_webhook;
                self.touch();
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                event: "gateway success",
            }),
        }
    }

    /// Gateway rejected the initiate, or reported the transaction
    /// failed/cancelled: pending|processing -> failed. The booking stays
    /// pending so the guest may start a fresh payment.
    pub fn fail(&mut self, reason: &str) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Processing => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason.to_owned());
                self.touch();
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                event: "gateway failure",
            }),
        }
    }

    /// Admin-triggered refund: the only legal exit from `completed`.
    pub fn refund(&mut self) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Completed => {
                self.status = PaymentStatus::Refunded;
                self.touch();
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                event: "refund requested",
            }),
        }
    }

    /// Bookkeeping for a verify request, recorded regardless of what the
    /// gateway answers.
    pub fn record_verification(&mut self) {
        self.verification_attempts += 1;
        self.last_verification_at = Some(Utc::now());
        self.touch();
    }

    /// Merges a gateway payload into the audit blob. Object keys are merged
    /// shallowly, later signals winning, mirroring how the gateway resends
    /// cumulative transaction state.
    pub fn absorb_payload(&mut self, raw: &Value) {
        match (&mut self.raw_gateway_payload, raw) {
            (Value::Object(acc), Value::Object(incoming)) => {
                for (k, v) in incoming {
                    acc.insert(k.clone(), v.clone());
                }
            }
            (slot, incoming) if !incoming.is_null() => *slot = incoming.clone(),
            _ => {}
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

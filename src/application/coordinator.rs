use super::state_machine::{
    GatewaySignal, PaymentStateMachine, SignalSource, TransitionLocks, TransitionOutcome,
};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::{Amount, Payment, PaymentReference, PaymentStatus};
use crate::domain::ports::{
    CheckoutRequest, CustomerInfo, GatewayStatusKind, PaymentGatewayBox,
};
use crate::domain::{BookingId, GuestId, PaymentId};
use crate::error::{GatewayError, PaymentError, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Static settings for payment orchestration: the settlement currency and
/// the webhook callback URL handed to the gateway on initiate.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub currency: String,
    pub callback_url: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            currency: "ETB".to_owned(),
            callback_url: "http://localhost:8000/api/payments/webhook/".to_owned(),
        }
    }
}

/// What the caller needs to send the guest off to checkout.
#[derive(Debug, Clone)]
pub struct CheckoutInfo {
    pub payment_id: PaymentId,
    pub reference: PaymentReference,
    pub checkout_handle: String,
    pub amount: Amount,
    pub currency: String,
}

/// Caller-facing result of one verify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Completed,
    AlreadyCompleted,
    Failed,
    /// Gateway still reports the transaction in flight.
    Pending,
    /// The gateway was unreachable; nothing changed, try again later.
    Retryable,
}

impl From<TransitionOutcome> for VerificationOutcome {
    fn from(outcome: TransitionOutcome) -> Self {
        match outcome {
            TransitionOutcome::Completed => Self::Completed,
            // a stale failure signal against a completed payment is still
            // answered as success
            TransitionOutcome::AlreadyCompleted | TransitionOutcome::Stale => {
                Self::AlreadyCompleted
            }
            TransitionOutcome::Failed => Self::Failed,
            TransitionOutcome::StillProcessing => Self::Pending,
        }
    }
}

/// Caller-side retry budget for verification polling. The core imposes no
/// fixed cap; this makes the schedule explicit and configurable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
    }
}

/// Orchestrates initiate requests, verification polling and webhook
/// ingestion through the state machine, applying the idempotency and
/// staleness rules.
///
/// Every state-changing path acquires the booking's transition lock first
/// and holds it across the gateway call, so a webhook and a manual verify
/// racing for the same payment serialize; whichever loses observes the
/// advanced state and short-circuits.
pub struct ReconciliationCoordinator {
    machine: PaymentStateMachine,
    gateway: PaymentGatewayBox,
    locks: TransitionLocks,
    config: CoordinatorConfig,
}

impl ReconciliationCoordinator {
    pub fn new(
        machine: PaymentStateMachine,
        gateway: PaymentGatewayBox,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            machine,
            gateway,
            locks: TransitionLocks::new(),
            config,
        }
    }

    /// Starts (or resumes) settlement for a booking.
    ///
    /// Fails with `AlreadyPaid` if a completed payment exists and with
    /// `BookingNotEligible` for cancelled/completed bookings. A payment
    /// already `processing` is never re-initiated; its stored checkout info
    /// is returned. A `pending` payment is resumed with the same reference,
    /// which is what makes a network-failed initiate safely retryable.
    pub async fn request_initiate(
        &self,
        booking_id: BookingId,
        customer: &CustomerInfo,
        return_url: &str,
    ) -> Result<CheckoutInfo> {
        let _guard = self.locks.acquire(booking_id).await;

        let booking = self.machine.booking(booking_id).await?;
        if matches!(
            booking.status,
            BookingStatus::Cancelled | BookingStatus::Completed
        ) {
            return Err(PaymentError::BookingNotEligible {
                status: booking.status,
            });
        }

        let payments = self.machine.payments_for_booking(booking_id).await?;
        if payments
            .iter()
            .any(|p| p.status == PaymentStatus::Completed)
        {
            return Err(PaymentError::AlreadyPaid);
        }

        if let Some(active) = payments.into_iter().find(|p| p.status.is_active()) {
            return match active.status {
                PaymentStatus::Processing => checkout_info(&active),
                _ => self.drive_initiate(&booking, active, customer, return_url).await,
            };
        }

        let payment = self
            .machine
            .create_pending(&booking, &self.config.currency)
            .await?;
        self.drive_initiate(&booking, payment, customer, return_url).await
    }

    async fn drive_initiate(
        &self,
        booking: &Booking,
        payment: Payment,
        customer: &CustomerInfo,
        return_url: &str,
    ) -> Result<CheckoutInfo> {
        let request = CheckoutRequest {
            reference: payment.reference,
            amount: payment.amount,
            currency: payment.currency.clone(),
            customer: customer.clone(),
            callback_url: self.config.callback_url.clone(),
            return_url: return_url.to_owned(),
            description: format!("Stay booking {}", booking.id),
        };

        match self.gateway.initiate(&request).await {
            Ok(ack) => {
                let payment = self.machine.mark_accepted(payment, ack).await?;
                checkout_info(&payment)
            }
            Err(err @ GatewayError::Rejected(_)) => {
                self.machine
                    .mark_initiate_failed(payment, &err.to_string())
                    .await?;
                Err(err.into())
            }
            Err(err) => {
                // transient: the payment stays pending under its reference
                // and the next request_initiate resumes it
                warn!(payment = %payment.reference, error = %err, "initiate failed transiently");
                Err(err.into())
            }
        }
    }

    /// Polls the gateway for one payment and applies the result.
    ///
    /// The verification attempt is recorded regardless of outcome. A network
    /// failure returns `Retryable` without touching `status`.
    pub async fn request_verify(
        &self,
        reference: &PaymentReference,
    ) -> Result<VerificationOutcome> {
        let payment = self.lookup(reference).await?;
        let _guard = self.locks.acquire(payment.booking_id).await;
        // state may have advanced while we waited on the lock
        let payment = self.lookup(reference).await?;
        let payment = self.machine.note_verification(payment).await?;

        let status = match self.gateway.verify(reference).await {
            Ok(status) => status,
            Err(err) if err.is_retryable() => {
                warn!(payment = %reference, error = %err, "verify failed transiently");
                return Ok(VerificationOutcome::Retryable);
            }
            Err(err) => return Err(err.into()),
        };

        let signal = GatewaySignal {
            kind: status.kind,
            transaction_id: status.transaction_id,
            raw: status.raw,
            source: SignalSource::Poll,
        };
        let (_, outcome) = self.machine.apply_signal(payment, signal).await?;
        Ok(outcome.into())
    }

    /// Polls under the given retry budget until the payment settles, backing
    /// off exponentially on transient failures and still-pending answers.
    pub async fn verify_until_settled(
        &self,
        reference: &PaymentReference,
        policy: &RetryPolicy,
    ) -> Result<VerificationOutcome> {
        for attempt in 1..=policy.max_attempts {
            match self.request_verify(reference).await? {
                VerificationOutcome::Retryable | VerificationOutcome::Pending => {
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.delay_for(attempt)).await;
                    }
                }
                settled => return Ok(settled),
            }
        }
        Err(PaymentError::VerificationExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// Ingests a raw webhook body from the gateway.
    ///
    /// The payload is untrusted: the payment is looked up by the embedded
    /// reference and the signal goes through the exact transition validation
    /// a polled verify would. An unknown reference is logged and reported;
    /// the gateway's own retry will resend.
    pub async fn receive_webhook(&self, raw: &str) -> Result<TransitionOutcome> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|e| GatewayError::Malformed(format!("webhook payload: {e}")))?;
        let tx_ref = payload
            .get("tx_ref")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Malformed("webhook payload missing tx_ref".into()))?
            .to_owned();

        let reference: PaymentReference = tx_ref
            .parse()
            .map_err(|_| PaymentError::UnknownReference(tx_ref.clone()))?;
        let Some(payment) = self.machine.payment_by_reference(&reference).await? else {
            warn!(reference = %tx_ref, "webhook for unknown payment reference");
            return Err(PaymentError::UnknownReference(tx_ref));
        };

        let _guard = self.locks.acquire(payment.booking_id).await;
        let payment = self.lookup(&reference).await?;

        let kind = GatewayStatusKind::from_wire(
            payload.get("status").and_then(Value::as_str).unwrap_or(""),
        );
        let signal = GatewaySignal {
            kind,
            transaction_id: payload
                .get("reference")
                .and_then(Value::as_str)
                .map(str::to_owned),
            raw: payload,
            source: SignalSource::Webhook,
        };
        let (_, outcome) = self.machine.apply_signal(payment, signal).await?;
        Ok(outcome)
    }

    /// Admin-triggered refund, the only legal exit from `completed`.
    pub async fn request_refund(&self, reference: &PaymentReference) -> Result<Payment> {
        let payment = self.lookup(reference).await?;
        let _guard = self.locks.acquire(payment.booking_id).await;
        let payment = self.lookup(reference).await?;
        self.machine.refund(payment).await
    }

    /// All payments across the guest's bookings, newest first.
    pub async fn payment_history(&self, guest: GuestId) -> Result<Vec<Payment>> {
        let mut history = Vec::new();
        for booking in self.machine.bookings_for_guest(guest).await? {
            history.extend(self.machine.payments_for_booking(booking.id).await?);
        }
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn lookup(&self, reference: &PaymentReference) -> Result<Payment> {
        self.machine
            .payment_by_reference(reference)
            .await?
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))
    }
}

fn checkout_info(payment: &Payment) -> Result<CheckoutInfo> {
    let checkout_handle = payment.checkout_handle.clone().ok_or_else(|| {
        PaymentError::Store(format!(
            "processing payment {} has no checkout handle",
            payment.reference
        ))
    })?;
    Ok(CheckoutInfo {
        payment_id: payment.id,
        reference: payment.reference,
        checkout_handle,
        amount: payment.amount,
        currency: payment.currency.clone(),
    })
}

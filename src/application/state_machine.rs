use crate::domain::BookingId;
use crate::domain::booking::Booking;
use crate::domain::payment::{Payment, PaymentReference, PaymentStatus};
use crate::domain::ports::{
    BookingStoreBox, GatewayAck, GatewayStatusKind, NotificationPortBox, PaymentStoreBox,
};
use crate::error::{BookingError, PaymentError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Where a gateway signal came from. Webhook and poll data get the same
/// trust level and the same transition table; the source only decides
/// whether `webhook_verified` is set on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Poll,
    Webhook,
}

/// A gateway-reported transaction status, normalized from either a verify
/// response or a webhook payload.
#[derive(Debug, Clone)]
pub struct GatewaySignal {
    pub kind: GatewayStatusKind,
    pub transaction_id: Option<String>,
    pub raw: Value,
    pub source: SignalSource,
}

/// Result of applying one signal to one payment.
///
/// `AlreadyCompleted` and `Stale` are normal idempotent outcomes, not errors:
/// duplicate success signals are answered as success with no side effects,
/// and a failure signal can never regress a completed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Completed,
    AlreadyCompleted,
    Failed,
    StillProcessing,
    Stale,
}

/// Per-booking mutual exclusion for payment transitions.
///
/// Payments are one-to-one with bookings at any given time, so keying by
/// booking id serializes verify, webhook and initiate for the same payment
/// while transitions on other bookings proceed independently.
#[derive(Default)]
pub struct TransitionLocks {
    inner: Mutex<HashMap<BookingId, Arc<Mutex<()>>>>,
}

impl TransitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the transition lock for a booking. The returned guard is
    /// owned so it can be held across await points, including the outbound
    /// gateway call.
    pub async fn acquire(&self, booking: BookingId) -> OwnedMutexGuard<()> {
        let cell = {
            let mut map = self.inner.lock().await;
            map.entry(booking).or_default().clone()
        };
        cell.lock_owned().await
    }
}

/// Core transition logic keeping `Payment.status` and `Booking.status`
/// mutually consistent.
///
/// Every method that writes state must be called with the booking's
/// transition lock held (see [`TransitionLocks`]); the coordinator is the
/// only caller and upholds that.
pub struct PaymentStateMachine {
    bookings: BookingStoreBox,
    payments: PaymentStoreBox,
    notifier: NotificationPortBox,
}

impl PaymentStateMachine {
    pub fn new(
        bookings: BookingStoreBox,
        payments: PaymentStoreBox,
        notifier: NotificationPortBox,
    ) -> Self {
        Self {
            bookings,
            payments,
            notifier,
        }
    }

    pub async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(id).into())
    }

    pub async fn payment_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Payment>> {
        self.payments.find_by_reference(reference).await
    }

    pub async fn payments_for_booking(&self, booking: BookingId) -> Result<Vec<Payment>> {
        self.payments.for_booking(booking).await
    }

    pub async fn bookings_for_guest(&self, guest: crate::domain::GuestId) -> Result<Vec<Booking>> {
        self.bookings.for_guest(guest).await
    }

    /// Creates the payment row in `pending` and links it as the booking's
    /// current payment.
    pub async fn create_pending(&self, booking: &Booking, currency: &str) -> Result<Payment> {
        let payment = Payment::new(booking.id, booking.total_price, currency);
        self.payments.store(payment.clone()).await?;

        let mut booking = booking.clone();
        booking.current_payment = Some(payment.id);
        booking.touch();
        self.bookings.update(booking).await?;

        info!(payment = %payment.reference, booking = %payment.booking_id, "payment created");
        Ok(payment)
    }

    /// pending -> processing once the gateway has issued a checkout handle.
    pub async fn mark_accepted(&self, mut payment: Payment, ack: GatewayAck) -> Result<Payment> {
        payment.accept(ack.checkout_handle, ack.transaction_id, &ack.raw)?;
        self.payments.store(payment.clone()).await?;
        info!(payment = %payment.reference, "gateway accepted, checkout issued");
        Ok(payment)
    }

    /// pending -> failed after a gateway rejection of the initiate call. The
    /// booking stays pending so the guest can retry with a fresh payment.
    pub async fn mark_initiate_failed(
        &self,
        mut payment: Payment,
        reason: &str,
    ) -> Result<Payment> {
        payment.fail(reason)?;
        self.payments.store(payment.clone()).await?;

        let booking = self.booking(payment.booking_id).await?;
        self.notifier.payment_failed(&booking, &payment, reason).await;
        warn!(payment = %payment.reference, %reason, "payment initiation failed");
        Ok(payment)
    }

    /// Records a verification attempt. Done for every verify request, before
    /// the gateway is asked anything, so the count survives network failures.
    pub async fn note_verification(&self, mut payment: Payment) -> Result<Payment> {
        payment.record_verification();
        self.payments.store(payment.clone()).await?;
        Ok(payment)
    }

    /// Applies one gateway signal to one payment, per the transition table.
    ///
    /// Completion is monotonic: success against a completed payment is a
    /// logged no-op, failure against a completed payment is a stale signal.
    /// Undefined (status, signal) pairs are an internal error rather than a
    /// silent skip.
    pub async fn apply_signal(
        &self,
        mut payment: Payment,
        signal: GatewaySignal,
    ) -> Result<(Payment, TransitionOutcome)> {
        match (payment.status, signal.kind) {
            (PaymentStatus::Completed, GatewayStatusKind::Success) => {
                info!(
                    payment = %payment.reference,
                    "duplicate success signal for completed payment, ignoring"
                );
                Ok((payment, TransitionOutcome::AlreadyCompleted))
            }
            (PaymentStatus::Completed | PaymentStatus::Refunded, kind) => {
                warn!(
                    payment = %payment.reference,
                    signal = kind.as_str(),
                    status = %payment.status,
                    "stale signal against settled payment, ignoring"
                );
                Ok((payment, TransitionOutcome::Stale))
            }
            (PaymentStatus::Processing, GatewayStatusKind::Success) => {
                payment.absorb_payload(&signal.raw);
                if payment.gateway_transaction_id.is_none() {
                    payment.gateway_transaction_id = signal.transaction_id.clone();
                }
                payment.complete(signal.source == SignalSource::Webhook)?;
                self.payments.store(payment.clone()).await?;

                let mut booking = self.booking(payment.booking_id).await?;
                booking.confirm();
                self.bookings.update(booking.clone()).await?;

                self.notifier.payment_completed(&booking, &payment).await;
                info!(
                    payment = %payment.reference,
                    booking = %booking.id,
                    via_webhook = payment.webhook_verified,
                    "payment completed, booking confirmed"
                );
                Ok((payment, TransitionOutcome::Completed))
            }
            (
                PaymentStatus::Processing,
                kind @ (GatewayStatusKind::Failed | GatewayStatusKind::Cancelled),
            ) => {
                let reason = match signal.source {
                    SignalSource::Poll => format!("payment {}", kind.as_str()),
                    SignalSource::Webhook => format!("webhook: payment {}", kind.as_str()),
                };
                payment.absorb_payload(&signal.raw);
                payment.fail(&reason)?;
                self.payments.store(payment.clone()).await?;

                let booking = self.booking(payment.booking_id).await?;
                self.notifier.payment_failed(&booking, &payment, &reason).await;
                info!(payment = %payment.reference, %reason, "payment failed, booking stays pending");
                Ok((payment, TransitionOutcome::Failed))
            }
            (
                PaymentStatus::Processing,
                GatewayStatusKind::Pending | GatewayStatusKind::Unknown,
            ) => {
                payment.absorb_payload(&signal.raw);
                self.payments.store(payment.clone()).await?;
                Ok((payment, TransitionOutcome::StillProcessing))
            }
            (from, kind) => Err(PaymentError::IllegalTransition {
                from,
                event: kind.as_str(),
            }),
        }
    }

    /// completed -> refunded, the explicit admin path. The booking is not
    /// touched.
    pub async fn refund(&self, mut payment: Payment) -> Result<Payment> {
        payment.refund()?;
        self.payments.store(payment.clone()).await?;
        info!(payment = %payment.reference, "payment refunded");
        Ok(payment)
    }
}

use crate::domain::booking::Booking;
use crate::domain::payment::Payment;
use crate::domain::ports::NotificationPort;
use async_trait::async_trait;
use tracing::info;

/// Notification boundary that only logs. Stands in for the mail/notification
/// system, which is an external collaborator.
#[derive(Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn payment_completed(&self, booking: &Booking, payment: &Payment) {
        info!(
            booking = %booking.id,
            payment = %payment.reference,
            amount = %payment.amount,
            currency = %payment.currency,
            "notification: payment completed"
        );
    }

    async fn payment_failed(&self, booking: &Booking, payment: &Payment, reason: &str) {
        info!(
            booking = %booking.id,
            payment = %payment.reference,
            %reason,
            "notification: payment failed"
        );
    }
}

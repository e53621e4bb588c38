use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::{Payment, PaymentReference};
use crate::domain::ports::{BookingStore, PaymentStore};
use crate::domain::{BookingId, GuestId, PaymentId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bookings.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access; cloning yields
/// another handle onto the same data, which is how tests keep a view of
/// state owned by the engine.
///
/// The overlap invariant is enforced here: `insert` scans existing bookings
/// for the listing and inserts under one write guard, so two concurrent
/// bookings for intersecting dates cannot both commit.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        let conflict = bookings.values().any(|existing| {
            existing.listing_id == booking.listing_id
                && existing.status != BookingStatus::Cancelled
                && existing.overlaps(&booking)
        });
        if conflict {
            return Err(BookingError::OverlapConflict.into());
        }
        bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn for_guest(&self, guest: GuestId) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.guest_id == guest)
            .cloned()
            .collect())
    }
}

/// A thread-safe in-memory store for payments, with reference lookup for
/// webhook and verify correlation.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn store(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &PaymentReference) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| p.reference == *reference)
            .cloned())
    }

    async fn for_booking(&self, booking: BookingId) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .filter(|p| p.booking_id == booking)
            .cloned()
            .collect())
    }
}

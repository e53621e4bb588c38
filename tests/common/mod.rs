#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use lodgepay::application::coordinator::{CoordinatorConfig, ReconciliationCoordinator};
use lodgepay::application::state_machine::PaymentStateMachine;
use lodgepay::domain::booking::{self, Booking};
use lodgepay::domain::listing::Listing;
use lodgepay::domain::payment::{Amount, Payment, PaymentReference};
use lodgepay::domain::ports::{
    BookingStore, CheckoutRequest, CustomerInfo, GatewayAck, GatewayStatus, GatewayStatusKind,
    NotificationPort, PaymentGateway,
};
use lodgepay::error::GatewayError;
use lodgepay::infrastructure::in_memory::{InMemoryBookingStore, InMemoryPaymentStore};
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        email: "guest@example.com".to_owned(),
        first_name: "Test".to_owned(),
        last_name: "Guest".to_owned(),
        phone: Some("+251911234567".to_owned()),
    }
}

pub fn webhook_body(reference: PaymentReference, status: &str) -> String {
    json!({
        "tx_ref": reference.to_string(),
        "status": status,
        "amount": "3000.00",
        "currency": "ETB",
        "created_at": "2026-09-01T10:30:00Z",
    })
    .to_string()
}

/// Records every notification so tests can assert exactly-once delivery.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    pub completed: Arc<Mutex<Vec<(Uuid, Uuid)>>>,
    pub failed: Arc<Mutex<Vec<(Uuid, Uuid, String)>>>,
}

impl RecordingNotifier {
    pub fn completed_count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn payment_completed(&self, booking: &Booking, payment: &Payment) {
        self.completed.lock().unwrap().push((booking.id, payment.id));
    }

    async fn payment_failed(&self, booking: &Booking, payment: &Payment, reason: &str) {
        self.failed
            .lock()
            .unwrap()
            .push((booking.id, payment.id, reason.to_owned()));
    }
}

/// One scripted step for a verify call.
#[derive(Debug, Clone, Copy)]
pub enum VerifyStep {
    Status(GatewayStatusKind),
    Network,
}

/// Gateway double driven by a script: a configurable number of transient
/// initiate failures (or a rejection), then a queue of verify answers.
/// An exhausted queue keeps answering `pending`, like a slow gateway.
#[derive(Default, Clone)]
pub struct ScriptedGateway {
    initiate_failures: Arc<Mutex<u32>>,
    initiate_rejection: Arc<Mutex<Option<String>>>,
    verify_steps: Arc<Mutex<VecDeque<VerifyStep>>>,
    pub initiate_calls: Arc<Mutex<u32>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` initiate calls fail with a network error.
    pub fn fail_initiates(self, n: u32) -> Self {
        *self.initiate_failures.lock().unwrap() = n;
        self
    }

    pub fn reject_initiate(self, message: &str) -> Self {
        *self.initiate_rejection.lock().unwrap() = Some(message.to_owned());
        self
    }

    pub fn verify_sequence(self, steps: Vec<VerifyStep>) -> Self {
        *self.verify_steps.lock().unwrap() = steps.into_iter().collect();
        self
    }

    pub fn push_verify(&self, step: VerifyStep) {
        self.verify_steps.lock().unwrap().push_back(step);
    }

    pub fn initiate_call_count(&self) -> u32 {
        *self.initiate_calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(
        &self,
        request: &CheckoutRequest,
    ) -> Result<GatewayAck, GatewayError> {
        *self.initiate_calls.lock().unwrap() += 1;

        if let Some(message) = self.initiate_rejection.lock().unwrap().clone() {
            return Err(GatewayError::Rejected(message));
        }
        {
            let mut failures = self.initiate_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(GatewayError::Network("connection timed out".to_owned()));
            }
        }

        let checkout_handle =
            format!("https://checkout.scripted.local/{}", request.reference);
        Ok(GatewayAck {
            checkout_handle: checkout_handle.clone(),
            transaction_id: Some("gw-0001".to_owned()),
            raw: json!({ "checkout_url": checkout_handle }),
        })
    }

    async fn verify(
        &self,
        reference: &PaymentReference,
    ) -> Result<GatewayStatus, GatewayError> {
        let step = self
            .verify_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VerifyStep::Status(GatewayStatusKind::Pending));
        match step {
            VerifyStep::Network => {
                Err(GatewayError::Network("connection timed out".to_owned()))
            }
            VerifyStep::Status(kind) => Ok(GatewayStatus {
                kind,
                transaction_id: Some("gw-0001".to_owned()),
                raw: json!({
                    "status": kind.as_str(),
                    "tx_ref": reference.to_string(),
                }),
            }),
        }
    }
}

pub struct TestContext {
    pub coordinator: Arc<ReconciliationCoordinator>,
    pub bookings: InMemoryBookingStore,
    pub payments: InMemoryPaymentStore,
    pub notifier: RecordingNotifier,
    pub listing: Listing,
    pub guest: Uuid,
}

impl TestContext {
    pub fn new(gateway: ScriptedGateway) -> Self {
        let bookings = InMemoryBookingStore::new();
        let payments = InMemoryPaymentStore::new();
        let notifier = RecordingNotifier::default();
        let machine = PaymentStateMachine::new(
            Box::new(bookings.clone()),
            Box::new(payments.clone()),
            Box::new(notifier.clone()),
        );
        let coordinator = Arc::new(ReconciliationCoordinator::new(
            machine,
            Box::new(gateway),
            CoordinatorConfig::default(),
        ));

        Self {
            coordinator,
            bookings,
            payments,
            notifier,
            listing: Listing::new(Uuid::new_v4(), 4),
            guest: Uuid::new_v4(),
        }
    }

    /// Validates and inserts a booking for the context's listing and guest.
    pub async fn add_booking(&self, check_in: u32, check_out: u32, guests: u32) -> Booking {
        let booking = Booking::new(
            self.listing.id,
            self.guest,
            date(check_in),
            date(check_out),
            guests,
            Amount::new(dec!(3000.00)).unwrap(),
        );
        booking::validate(&booking, &self.listing).unwrap();
        self.bookings.insert(booking.clone()).await.unwrap();
        booking
    }
}

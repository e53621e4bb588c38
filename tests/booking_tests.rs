mod common;

use common::date;
use lodgepay::domain::booking::{self, Booking};
use lodgepay::domain::listing::Listing;
use lodgepay::domain::payment::Amount;
use lodgepay::domain::ports::BookingStore;
use lodgepay::error::{BookingError, PaymentError};
use lodgepay::infrastructure::in_memory::InMemoryBookingStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn draft(listing: &Listing, check_in: u32, check_out: u32, guests: u32) -> Booking {
    Booking::new(
        listing.id,
        Uuid::new_v4(),
        date(check_in),
        date(check_out),
        guests,
        Amount::new(dec!(3000.00)).unwrap(),
    )
}

#[tokio::test]
async fn overlapping_booking_is_rejected() {
    // Scenario: [D1, D3) accepted, then [D2, D4) on the same listing with
    // D1 < D4 and D2 < D3 must conflict.
    let store = InMemoryBookingStore::new();
    let listing = Listing::new(Uuid::new_v4(), 4);

    store.insert(draft(&listing, 1, 3, 2)).await.unwrap();
    let err = store.insert(draft(&listing, 2, 4, 2)).await.unwrap_err();

    assert!(matches!(
        err,
        PaymentError::Booking(BookingError::OverlapConflict)
    ));
}

#[tokio::test]
async fn validation_rejects_before_any_persistence() {
    let store = InMemoryBookingStore::new();
    let listing = Listing::new(Uuid::new_v4(), 2);

    let over_capacity = draft(&listing, 1, 3, 5);
    assert_eq!(
        booking::validate(&over_capacity, &listing),
        Err(BookingError::CapacityExceeded {
            requested: 5,
            max: 2
        })
    );

    let inverted = draft(&listing, 5, 5, 2);
    assert_eq!(
        booking::validate(&inverted, &listing),
        Err(BookingError::InvalidDateRange)
    );

    // nothing was written
    assert!(store.get(over_capacity.id).await.unwrap().is_none());
    assert!(store.get(inverted.id).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_overlapping_inserts_admit_exactly_one() {
    let store = InMemoryBookingStore::new();
    let listing = Arc::new(Listing::new(Uuid::new_v4(), 4));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        let listing = Arc::clone(&listing);
        handles.push(tokio::spawn(async move {
            store.insert(draft(&listing, 1, 5, 2)).await
        }));
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(PaymentError::Booking(BookingError::OverlapConflict)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test]
async fn concurrent_disjoint_inserts_all_succeed() {
    let store = InMemoryBookingStore::new();
    let listing = Arc::new(Listing::new(Uuid::new_v4(), 4));

    let mut handles = Vec::new();
    for week in 0..4u32 {
        let store = store.clone();
        let listing = Arc::clone(&listing);
        handles.push(tokio::spawn(async move {
            let start = 1 + week * 7;
            store.insert(draft(&listing, start, start + 5, 2)).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

use super::listing::Listing;
use super::payment::Amount;
use super::{BookingId, GuestId, ListingId, PaymentId};
use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// A guest's reserved stay at a listing for a `[check_in, check_out)` range.
///
/// Once a payment references a booking it is never deleted; cancellation is a
/// status change. `status` is written only by the payment state machine
/// (confirm on completion) or administratively (cancel).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub listing_id: ListingId,
    pub guest_id: GuestId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: u32,
    pub total_price: Amount,
    pub status: BookingStatus,
    /// The payment currently settling this booking, if any. Cross-entity
    /// reads go through the store by identifier, never a shared object graph.
    pub current_payment: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        listing_id: ListingId,
        guest_id: GuestId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_count: u32,
        total_price: Amount,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            listing_id,
            guest_id,
            check_in,
            check_out,
            guest_count,
            total_price,
            status: BookingStatus::Pending,
            current_payment: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this booking's date range intersects another's on the
    /// half-open `[check_in, check_out)` convention. Back-to-back stays
    /// (one checks out the day the other checks in) do not overlap.
    pub fn overlaps(&self, other: &Booking) -> bool {
        ranges_overlap(self.check_in, self.check_out, other.check_in, other.check_out)
    }

    /// Marks the booking confirmed. Called by the state machine exactly once,
    /// at the first completed payment.
    pub fn confirm(&mut self) {
        self.status = BookingStatus::Confirmed;
        self.touch();
    }

    /// Administrative cancellation. Cancelled and completed bookings reject
    /// further cancellation.
    pub fn cancel(&mut self) -> Result<(), BookingError> {
        match self.status {
            BookingStatus::Cancelled | BookingStatus::Completed => {
                Err(BookingError::CancelNotAllowed(self.status))
            }
            _ => {
                self.status = BookingStatus::Cancelled;
                self.touch();
                Ok(())
            }
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Pure field validation against the listing snapshot: date order and guest
/// capacity. The overlap invariant is enforced atomically by the booking
/// store at insert time, not here.
pub fn validate(candidate: &Booking, listing: &Listing) -> Result<(), BookingError> {
    if candidate.check_out <= candidate.check_in {
        return Err(BookingError::InvalidDateRange);
    }
    if candidate.guest_count == 0 || candidate.guest_count > listing.max_guests {
        return Err(BookingError::CapacityExceeded {
            requested: candidate.guest_count,
            max: listing.max_guests,
        });
    }
    Ok(())
}

/// Half-open range intersection: `[a_in, a_out)` overlaps `[b_in, b_out)`
/// iff `a_in < b_out && b_in < a_out`.
pub fn ranges_overlap(
    a_in: NaiveDate,
    a_out: NaiveDate,
    b_in: NaiveDate,
    b_out: NaiveDate,
) -> bool {
    a_in < b_out && b_in < a_out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    fn draft(listing: &Listing, check_in: NaiveDate, check_out: NaiveDate, guests: u32) -> Booking {
        Booking::new(
            listing.id,
            Uuid::new_v4(),
            check_in,
            check_out,
            guests,
            Amount::new(dec!(3000.00)).unwrap(),
        )
    }

    #[test]
    fn rejects_inverted_and_zero_length_ranges() {
        let listing = Listing::new(Uuid::new_v4(), 4);
        let inverted = draft(&listing, date(10), date(8), 2);
        assert_eq!(
            validate(&inverted, &listing),
            Err(BookingError::InvalidDateRange)
        );

        let zero = draft(&listing, date(10), date(10), 2);
        assert_eq!(validate(&zero, &listing), Err(BookingError::InvalidDateRange));
    }

    #[test]
    fn rejects_over_capacity() {
        let listing = Listing::new(Uuid::new_v4(), 2);
        let booking = draft(&listing, date(1), date(3), 5);
        assert_eq!(
            validate(&booking, &listing),
            Err(BookingError::CapacityExceeded {
                requested: 5,
                max: 2
            })
        );
    }

    #[test]
    fn rejects_zero_guests() {
        let listing = Listing::new(Uuid::new_v4(), 2);
        let booking = draft(&listing, date(1), date(3), 0);
        assert!(matches!(
            validate(&booking, &listing),
            Err(BookingError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn accepts_valid_booking() {
        let listing = Listing::new(Uuid::new_v4(), 4);
        let booking = draft(&listing, date(1), date(4), 2);
        assert!(validate(&booking, &listing).is_ok());
    }

    #[test]
    fn overlap_is_half_open() {
        // [1, 5) vs [5, 8): back-to-back, no overlap.
        assert!(!ranges_overlap(date(1), date(5), date(5), date(8)));
        // [1, 5) vs [4, 8): one shared night.
        assert!(ranges_overlap(date(1), date(5), date(4), date(8)));
        // containment
        assert!(ranges_overlap(date(1), date(10), date(3), date(4)));
    }

    #[test]
    fn cancel_guards_terminal_states() {
        let listing = Listing::new(Uuid::new_v4(), 4);
        let mut booking = draft(&listing, date(1), date(4), 2);
        booking.cancel().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(
            booking.cancel(),
            Err(BookingError::CancelNotAllowed(BookingStatus::Cancelled))
        );
    }
}

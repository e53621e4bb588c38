pub mod booking;
pub mod listing;
pub mod payment;
pub mod ports;

use uuid::Uuid;

pub type ListingId = Uuid;
pub type HostId = Uuid;
pub type GuestId = Uuid;
pub type BookingId = Uuid;
pub type PaymentId = Uuid;

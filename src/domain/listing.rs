use super::{HostId, ListingId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only snapshot of a listing, owned by the catalog outside this
/// subsystem. The engine only reads capacity and ownership for validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub host_id: HostId,
    pub max_guests: u32,
}

impl Listing {
    pub fn new(host_id: HostId, max_guests: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            host_id,
            max_guests,
        }
    }
}

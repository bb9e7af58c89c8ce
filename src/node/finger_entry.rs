use std::fmt;

use serde::Serialize;

use crate::utils::crypto::hash;
use crate::utils::types::{Address, HashPos};

/// A peer handle: `(id, endpoint)`. Equality is by `id`, per §3 Data Model —
/// two handles for the same peer compare equal even if one was looked up
/// before a finger was refreshed and the other after.
#[derive(Clone, Default, Serialize)]
pub struct FingerEntry {
    pub(crate) key: HashPos,
    pub(crate) address: Address,
}

impl fmt::Debug for FingerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerEntry")
            .field("key", &self.key)
            .field("address", &self.address)
            .finish()
    }
}

impl PartialEq for FingerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FingerEntry {}

impl FingerEntry {
    pub fn new(key: HashPos, address: Address) -> Self {
        FingerEntry { key, address }
    }

    pub fn get_key(&self) -> HashPos {
        self.key
    }

    pub fn get_address(&self) -> &Address {
        &self.address
    }
}

impl From<Address> for FingerEntry {
    fn from(address: Address) -> Self {
        let key = hash(address.as_bytes());
        FingerEntry { key, address }
    }
}

impl From<&Address> for FingerEntry {
    fn from(address: &Address) -> Self {
        address.clone().into()
    }
}

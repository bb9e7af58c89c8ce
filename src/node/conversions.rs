//! Wire <-> domain conversions for the node/finger-table types: an exhaustive
//! set of conversions between `FingerEntry`/`Address`/`Key` and their
//! `*Msg` counterparts, expressed as `From` impls (so `.into()` still works
//! at call sites, but conversions compose the idiomatic direction).

use crate::rpc::chord_proto::{
    AddressMsg, FingerEntryDebugMsg, FingerEntryMsg, FingerTableMsg, HashPosMsg, SuccessorListMsg,
};
use crate::node::finger_entry::FingerEntry;
use crate::node::finger_table::FingerTable;
use crate::node::successor_list::SuccessorList;
use crate::utils::crypto::hash;
use crate::utils::types::{Address, HashPos};

impl From<HashPos> for HashPosMsg {
    fn from(pos: HashPos) -> Self {
        HashPosMsg {
            key: pos.to_be_bytes().to_vec(),
        }
    }
}

impl From<HashPosMsg> for HashPos {
    fn from(msg: HashPosMsg) -> Self {
        let mut buf = [0u8; 16];
        let len = msg.key.len().min(16);
        buf[16 - len..].copy_from_slice(&msg.key[msg.key.len() - len..]);
        HashPos::from_be_bytes(buf)
    }
}

impl From<Address> for AddressMsg {
    fn from(address: Address) -> Self {
        AddressMsg { address }
    }
}

impl From<&Address> for AddressMsg {
    fn from(address: &Address) -> Self {
        address.clone().into()
    }
}

impl From<AddressMsg> for Address {
    fn from(msg: AddressMsg) -> Self {
        msg.address
    }
}

impl From<FingerEntry> for FingerEntryMsg {
    fn from(entry: FingerEntry) -> Self {
        FingerEntryMsg {
            id: entry.get_key().to_be_bytes().to_vec(),
            address: entry.get_address().clone(),
        }
    }
}

impl From<&FingerEntry> for FingerEntryMsg {
    fn from(entry: &FingerEntry) -> Self {
        entry.clone().into()
    }
}

impl From<FingerEntryMsg> for FingerEntry {
    fn from(msg: FingerEntryMsg) -> Self {
        let mut buf = [0u8; 16];
        let len = msg.id.len().min(16);
        buf[16 - len..].copy_from_slice(&msg.id[msg.id.len() - len..]);
        FingerEntry::new(HashPos::from_be_bytes(buf), msg.address)
    }
}

impl From<Address> for FingerEntry {
    fn from(address: Address) -> Self {
        let key = hash(address.as_bytes());
        FingerEntry::new(key, address)
    }
}

impl From<FingerEntry> for FingerEntryDebugMsg {
    fn from(entry: FingerEntry) -> Self {
        FingerEntryDebugMsg {
            id: entry.get_key().to_string(),
            address: entry.get_address().clone(),
        }
    }
}

impl From<&FingerEntry> for FingerEntryDebugMsg {
    fn from(entry: &FingerEntry) -> Self {
        entry.clone().into()
    }
}

impl From<SuccessorList> for SuccessorListMsg {
    fn from(list: SuccessorList) -> Self {
        SuccessorListMsg {
            successors: list.successors,
        }
    }
}

impl From<SuccessorListMsg> for Vec<Address> {
    fn from(msg: SuccessorListMsg) -> Self {
        msg.successors
    }
}

impl From<FingerTable> for FingerTableMsg {
    fn from(table: FingerTable) -> Self {
        FingerTableMsg {
            fingers: table.fingers.into_iter().map(FingerEntryMsg::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pos_round_trips_through_its_wire_form() {
        let pos: HashPos = 123456789012345678901234567890u128 % HashPos::MAX;
        let msg: HashPosMsg = pos.into();
        let back: HashPos = msg.into();
        assert_eq!(pos, back);
    }

    #[test]
    fn finger_entry_round_trips() {
        let entry = FingerEntry::new(42, "127.0.0.1:6501".to_string());
        let msg: FingerEntryMsg = entry.clone().into();
        let back: FingerEntry = msg.into();
        assert_eq!(entry.get_key(), back.get_key());
        assert_eq!(entry.get_address(), back.get_address());
    }
}

use std::sync::Mutex;

use crate::node::finger_entry::FingerEntry;
use crate::node::finger_table::FingerTable;
use crate::node::successor_list::SuccessorList;
use crate::utils::crypto::hash;
use crate::utils::types::{Address, HashPos, HashRingKey};

/// C3 — Chord node state. One `NodeState` per running peer, shared behind an
/// `Arc` with every RPC handler and timer task. Each field is guarded by its
/// own mutex rather than one big lock, since `find_successor`'s hop-by-hop
/// reads only ever need a consistent snapshot of a single field at a time.
pub struct NodeState {
    self_handle: FingerEntry,
    predecessor: Mutex<Option<FingerEntry>>,
    successor_list: Mutex<SuccessorList>,
    finger_table: Mutex<FingerTable>,
    next_finger_to_fix: Mutex<usize>,
}

impl NodeState {
    /// Form a brand-new ring: no bootstrap peer, predecessor unknown,
    /// every successor-list slot and finger-table entry points at self.
    pub fn new_singleton(address: Address, r: usize) -> NodeState {
        let pos = hash(address.as_bytes());
        NodeState {
            finger_table: Mutex::new(FingerTable::new(pos, &address)),
            successor_list: Mutex::new(SuccessorList::singleton(&address, r)),
            predecessor: Mutex::new(None),
            next_finger_to_fix: Mutex::new(0),
            self_handle: FingerEntry::new(pos, address),
        }
    }

    pub fn pos(&self) -> HashPos {
        self.self_handle.get_key()
    }

    pub fn address(&self) -> &Address {
        self.self_handle.get_address()
    }

    pub fn self_handle(&self) -> FingerEntry {
        self.self_handle.clone()
    }

    pub fn predecessor(&self) -> Option<FingerEntry> {
        self.predecessor.lock().unwrap().clone()
    }

    /// C3 `set_predecessor`: clears/ignores a candidate equal to self on a
    /// non-singleton ring — the bug guard named in §4.3.
    pub fn set_predecessor(&self, candidate: Option<FingerEntry>) {
        if let Some(ref p) = candidate {
            if p.get_key() == self.pos() && !self.is_singleton() {
                return;
            }
        }
        *self.predecessor.lock().unwrap() = candidate;
    }

    pub fn clear_predecessor(&self) {
        *self.predecessor.lock().unwrap() = None;
    }

    pub fn successor_list_snapshot(&self) -> SuccessorList {
        self.successor_list.lock().unwrap().clone()
    }

    pub fn primary_successor(&self) -> Address {
        self.successor_list
            .lock()
            .unwrap()
            .primary()
            .cloned()
            .unwrap_or_else(|| self.address().clone())
    }

    /// Install a new primary successor, keeping `finger_table[0]` (the
    /// tightest finger) in lockstep.
    pub fn set_successor_primary(&self, address: Address) {
        {
            let mut list = self.successor_list.lock().unwrap();
            if list.successors.is_empty() {
                list.successors.push(address.clone());
            } else {
                list.successors[0] = address.clone();
            }
        }
        self.finger_table.lock().unwrap().set_finger(0, address);
    }

    /// C3 `update_successor_list`.
    pub fn rebuild_successor_list(&self, new_primary: Address, primarys_list: Vec<Address>) {
        let mut list = self.successor_list.lock().unwrap();
        list.rebuild(self.address(), new_primary.clone(), primarys_list);
        drop(list);
        self.finger_table.lock().unwrap().set_finger(0, new_primary);
    }

    pub fn evict_dead_successor(&self) -> Option<Address> {
        let new_primary = self.successor_list.lock().unwrap().evict_head_and_promote();
        if let Some(ref address) = new_primary {
            self.finger_table.lock().unwrap().set_finger(0, address.clone());
        }
        new_primary
    }

    pub fn successor_list_is_exhausted(&self) -> bool {
        self.successor_list.lock().unwrap().is_exhausted()
    }

    pub fn finger_target(&self, index: usize) -> HashPos {
        self.finger_table.lock().unwrap().target(index)
    }

    /// C3 `set_finger`: no invariant on tightness, fingers are best-effort.
    pub fn set_finger(&self, index: usize, address: Address) {
        self.finger_table.lock().unwrap().set_finger(index, address);
    }

    pub fn finger_snapshot(&self) -> Vec<FingerEntry> {
        self.finger_table.lock().unwrap().fingers.clone()
    }

    pub fn next_finger_to_fix(&self) -> usize {
        *self.next_finger_to_fix.lock().unwrap()
    }

    pub fn advance_finger_cursor(&self) -> usize {
        let mut cursor = self.next_finger_to_fix.lock().unwrap();
        let next = (*cursor + 1) % HashPos::finger_count() as usize;
        *cursor = next;
        next
    }

    fn is_singleton(&self) -> bool {
        let list = self.successor_list.lock().unwrap();
        list.successors.len() == 1 && list.successors[0] == *self.address()
    }
}

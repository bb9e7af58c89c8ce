use crate::node::finger_entry::FingerEntry;
use crate::utils::types::{Address, HashPos, HashRingKey};

/// `finger_table[i]` is the successor of `(self.id + 2^i) mod 2^m` (§3 Data
/// Model). Entries are best-effort: `fix_fingers` may leave one stale if the
/// lookup that would refresh it fails (§4.4).
///
/// `targets[i]` is the fixed lookup offset `(self.id + 2^i) mod 2^m`,
/// computed once and never touched again. `fingers[i]` is the peer currently
/// believed to own that offset; `set_finger` replaces the whole entry (so its
/// `key` is the resolved peer's own hash, not the lookup target it was found
/// through) rather than splicing a new address onto the old key.
#[derive(Debug, Clone)]
pub struct FingerTable {
    pub fingers: Vec<FingerEntry>,
    targets: Vec<HashPos>,
}

impl FingerTable {
    /// Builds an all-self finger table targeted at `own_id`'s `2^i` offsets;
    /// every entry initially points at `own_address` until `fix_fingers` or
    /// `join` populates real successors.
    pub fn new(own_id: HashPos, own_address: &Address) -> FingerTable {
        let targets: Vec<HashPos> = (0..HashPos::finger_count())
            .map(|i| own_id.overflowing_add(HashPos::one().overflowing_shl(i).0).0)
            .collect();
        let fingers = targets.iter().map(|_| FingerEntry::from(own_address)).collect();
        FingerTable { fingers, targets }
    }

    /// The ring position this finger is supposed to point past —
    /// `(self.id + 2^i) mod 2^m` — independent of whatever peer is currently
    /// cached there.
    pub fn target(&self, index: usize) -> HashPos {
        self.targets[index]
    }

    /// Replaces the whole entry with the resolved peer's own `(hash, address)`
    /// pair — the entry's `key` becomes that peer's id, not the lookup offset
    /// that found it.
    pub fn set_finger(&mut self, index: usize, address: Address) {
        self.fingers[index] = FingerEntry::from(address);
    }

    pub fn set_all_fingers(&mut self, address: &Address) {
        for finger in &mut self.fingers {
            *finger = FingerEntry::from(address);
        }
    }

    pub fn first_successor(&self) -> &Address {
        self.fingers[0].get_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_monotonically_increasing_offsets() {
        let table = FingerTable::new(100, &"n".to_string());
        assert_eq!(table.target(0), 101);
        assert_eq!(table.target(1), 102);
        assert_eq!(table.target(2), 104);
    }

    #[test]
    fn new_table_points_all_fingers_at_self() {
        let table = FingerTable::new(7, &"self:1".to_string());
        assert!(table.fingers.iter().all(|f| f.get_address() == "self:1"));
    }
}

//! C1 — identifier space & hashing.

use crate::utils::types::HashPos;

/// Maps arbitrary bytes onto the ring, uniformly over `[0, 2^m)`. Used both
/// for peer-id hashing (`hash(endpoint.as_bytes())`) and job-id hashing
/// (`hash(task_name || source_bucket || dest_bucket || params)`).
pub fn hash_id(bytes: &[u8]) -> HashPos {
    let digest = blake3::hash(bytes);
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&digest.as_bytes()[..16]);
    HashPos::from_be_bytes(buf)
}

/// Alias kept for call sites that read more naturally as `hash(x)` than
/// `hash_id(x)` (peer/finger positions).
pub fn hash(bytes: &[u8]) -> HashPos {
    hash_id(bytes)
}

/// True iff `x` lies on the clockwise arc `(a, b]` or `(a, b)` depending on
/// `inclusive_b` — exclusive of `a` in both cases. Handles the wrap-around
/// case `b < a` by splitting the ring at `a`.
pub fn in_arc(x: HashPos, a: HashPos, b: HashPos, inclusive_b: bool) -> bool {
    if a == b {
        // the arc spans the entire ring save for `a` itself, unless the
        // caller also wants `a` (== `b`) included.
        return inclusive_b || x != a;
    }
    if a < b {
        if inclusive_b {
            x > a && x <= b
        } else {
            x > a && x < b
        }
    } else {
        if inclusive_b {
            x > a || x <= b
        } else {
            x > a || x < b
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hash_id_is_deterministic() {
        assert_eq!(hash_id(b"127.0.0.1:6501"), hash_id(b"127.0.0.1:6501"));
        assert_ne!(hash_id(b"127.0.0.1:6501"), hash_id(b"127.0.0.1:6502"));
    }

    #[test]
    fn in_arc_matches_linear_scan_no_wrap() {
        let a = 10u128;
        let b = 20u128;
        for x in 0..30u128 {
            let expected_excl = x > a && x < b;
            let expected_incl = x > a && x <= b;
            assert_eq!(in_arc(x, a, b, false), expected_excl, "x={x}");
            assert_eq!(in_arc(x, a, b, true), expected_incl, "x={x}");
        }
    }

    #[test]
    fn in_arc_matches_linear_scan_with_wrap() {
        let a = 250u128;
        let b = 5u128;
        let ring_max = 260u128;
        for x in 0..ring_max {
            let expected_excl = x > a || x < b;
            let expected_incl = x > a || x <= b;
            assert_eq!(in_arc(x, a, b, false), expected_excl, "x={x}");
            assert_eq!(in_arc(x, a, b, true), expected_incl, "x={x}");
        }
    }

    #[test]
    fn in_arc_singleton_ring() {
        // a == b: the owning peer is the only member, so every key but its
        // own id is "after" it unless inclusive_b widens the arc to the
        // whole ring.
        assert!(!in_arc(42, 42, 42, false));
        assert!(in_arc(42, 42, 42, true));
        assert!(in_arc(7, 42, 42, false));
    }

    proptest! {
        /// `in_arc` must agree with a plain linear walk around a small ring
        /// for any `a`/`b`/`x`, wrap-around included (§8: "in_arc agrees
        /// with a linear scan").
        #[test]
        fn in_arc_agrees_with_linear_scan(a: u8, b: u8, x: u8) {
            const RING_MAX: u128 = 256;
            let (a, b, x) = (a as HashPos, b as HashPos, x as HashPos);

            let (excl_member, incl_member) = if a == b {
                (x != a, true)
            } else {
                let mut excl = false;
                let mut incl = false;
                let mut pos = (a + 1) % RING_MAX;
                loop {
                    if pos == b {
                        incl = incl || pos == x;
                        break;
                    }
                    if pos == x {
                        excl = true;
                        incl = true;
                    }
                    pos = (pos + 1) % RING_MAX;
                }
                (excl, incl)
            };

            prop_assert_eq!(in_arc(x, a, b, false), excl_member);
            prop_assert_eq!(in_arc(x, a, b, true), incl_member);
        }

        /// Same input bytes always hash to the same ring position.
        #[test]
        fn hash_id_is_deterministic(bytes: Vec<u8>) {
            prop_assert_eq!(hash_id(&bytes), hash_id(&bytes));
        }
    }
}

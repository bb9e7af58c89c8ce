//! Proof-of-work gate on `notify` (SPEC_FULL.md, Supplemented Features). Damps
//! churn on an untrusted join path without requiring secure channels, which
//! remain explicitly out of scope.

use std::fmt;

use crate::rpc::chord_proto::PowTokenMsg;
use crate::utils::time::now;

const TOKEN_TTL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PowToken {
    pub nonce: Vec<u8>,
    pub difficulty: u32,
    pub issued_at: u64,
}

impl PowToken {
    /// Finds a nonce whose blake3 digest has at least `difficulty` leading
    /// zero bytes. `difficulty = 0` always succeeds immediately, which is
    /// how proof-of-work is effectively disabled in configuration.
    pub fn generate(difficulty: usize) -> PowToken {
        let issued_at = now().as_secs();
        let mut counter: u64 = 0;
        loop {
            let nonce = counter.to_be_bytes().to_vec();
            if Self::satisfies(&nonce, difficulty) {
                return PowToken {
                    nonce,
                    difficulty: difficulty as u32,
                    issued_at,
                };
            }
            counter = counter.wrapping_add(1);
        }
    }

    fn satisfies(nonce: &[u8], difficulty: usize) -> bool {
        let digest = blake3::hash(nonce);
        digest.as_bytes().iter().take(difficulty).all(|b| *b == 0)
    }

    /// Returns `(has_expired, valid)`. A token can simultaneously be expired
    /// and otherwise valid; the caller (see `threads::chord` notify path)
    /// rejects on either.
    pub fn validate(&self) -> (bool, bool) {
        let has_expired = now().as_secs() > self.issued_at + TOKEN_TTL_SECS;
        let valid = Self::satisfies(&self.nonce, self.difficulty as usize);
        (has_expired, valid)
    }
}

impl fmt::Display for PowToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PowToken(nonce={}, difficulty={})",
            hex_encode(&self.nonce),
            self.difficulty
        )
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl From<PowToken> for PowTokenMsg {
    fn from(token: PowToken) -> Self {
        PowTokenMsg {
            nonce: token.nonce,
            difficulty: token.difficulty,
            issued_at: token.issued_at,
        }
    }
}

impl From<PowTokenMsg> for PowToken {
    fn from(msg: PowTokenMsg) -> Self {
        PowToken {
            nonce: msg.nonce,
            difficulty: msg.difficulty,
            issued_at: msg.issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_difficulty_is_instantly_valid() {
        let token = PowToken::generate(0);
        let (expired, valid) = token.validate();
        assert!(!expired);
        assert!(valid);
    }

    #[test]
    fn generated_token_satisfies_its_own_difficulty() {
        let token = PowToken::generate(1);
        let (_, valid) = token.validate();
        assert!(valid);
    }
}

use crate::rpc::chord_proto::KvPairMsg;
use crate::utils::types::{ExpirationDate, HashPos};

/// §3 Data Model — `{key, value, version}`. `version` is a monotonically
/// increasing counter assigned at the owning peer; a record with a higher
/// version wins during handoff (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct DhtRecord {
    pub key: HashPos,
    pub value: Vec<u8>,
    pub version: u64,
    pub expires_at: ExpirationDate,
}

impl From<DhtRecord> for KvPairMsg {
    fn from(record: DhtRecord) -> Self {
        KvPairMsg {
            key: record.key.to_be_bytes().to_vec(),
            value: record.value,
            expiration_date: record.expires_at,
            version: record.version,
        }
    }
}

impl From<KvPairMsg> for DhtRecord {
    fn from(msg: KvPairMsg) -> Self {
        let mut buf = [0u8; 16];
        let len = msg.key.len().min(16);
        buf[16 - len..].copy_from_slice(&msg.key[msg.key.len() - len..]);
        DhtRecord {
            key: HashPos::from_be_bytes(buf),
            value: msg.value,
            version: msg.version,
            expires_at: msg.expiration_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_pair_msg_round_trips() {
        let record = DhtRecord {
            key: 42,
            value: b"v".to_vec(),
            version: 3,
            expires_at: 100,
        };
        let msg: KvPairMsg = record.clone().into();
        let back: DhtRecord = msg.into();
        assert_eq!(record, back);
    }
}

//! Semantic error categories from spec §7 "Error Handling Design". These are
//! not wire types — `rpc::RpcError` is what travels between peers — they are
//! the vocabulary the protocol engine (C4), the store (C5) and the job
//! coordinator (C6) use internally, and what finally gets attached to a job
//! record or surfaced to an HTTP caller.

use crate::utils::types::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer that received a `put`/`get` does not own the key's arc;
    /// the caller should re-route to `expected_peer`.
    #[error("peer does not own this key, route to {expected_peer}")]
    NotOwner { expected_peer: Address },

    /// `find_successor` exhausted every finger and the successor list
    /// without finding a live peer to delegate to.
    #[error("lookup exhausted all routing options")]
    LookupExhausted,

    /// The local successor list is empty and no remembered bootstrap peer
    /// answered; this node has fallen out of any ring.
    #[error("node has become detached from the ring")]
    RingDetached,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("key not found")]
    KeyNotFound,

    /// A handoff or replicated write arrived with a version no newer than
    /// what is already stored; the caller should treat this as success
    /// (idempotent no-op), not failure.
    #[error("incoming version is not newer than the stored version")]
    VersionStale,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The pending-job queue is at its high-water mark.
    #[error("worker queue is overloaded")]
    Overloaded,

    #[error("executor failed: {0}")]
    ExecutorFailed(String),

    #[error("artifact unavailable in object store")]
    ArtifactUnavailable,

    #[error("unrecognized task name: {0}")]
    UnknownTask(String),
}

/// The union used by code paths in the coordinator and protocol engine that
/// may fail for more than one of the reasons above, plus a catch-all for a
/// propagated RPC failure once every alternate route has been exhausted.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("rpc failed: {0}")]
    Rpc(String),
}

impl From<CoreError> for tonic::Status {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Protocol(ProtocolError::NotOwner { expected_peer }) => {
                tonic::Status::failed_precondition(format!("not_owner:{expected_peer}"))
            }
            CoreError::Protocol(ProtocolError::LookupExhausted) => {
                tonic::Status::unavailable("lookup_exhausted")
            }
            CoreError::Protocol(ProtocolError::RingDetached) => {
                tonic::Status::unavailable("ring_detached")
            }
            CoreError::Storage(StorageError::KeyNotFound) => tonic::Status::not_found("key_not_found"),
            CoreError::Storage(StorageError::VersionStale) => tonic::Status::ok("version_stale_noop"),
            CoreError::Job(job_err) => tonic::Status::internal(job_err.to_string()),
            CoreError::Rpc(msg) => tonic::Status::unavailable(msg),
        }
    }
}

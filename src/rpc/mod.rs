//! C2 — peer RPC transport. Built directly on `tonic`/`prost`: tonic already
//! gives every request an opaque HTTP/2 stream id for correlation and a
//! connection per remote peer (pooled by `tonic::transport::Channel`), so
//! this module's job is narrower than building a framed protocol from
//! scratch — it is the timeout/unreachable-classification layer on top of
//! that transport, plus the retry/failover policy that `chord` is allowed to
//! apply (C2 itself never retries).

use std::fmt;
use std::time::Duration;

use log::warn;
use tonic::transport::Channel;
use tonic::{Code, Status};

use crate::rpc::chord_proto::chord_client::ChordClient;
use crate::utils::constants::{CONNECTION_RETRY_SLEEP_MILLIS, MAX_CONNECTION_RETRIES};
use crate::utils::types::Address;

pub mod chord_proto {
    tonic::include_proto!("chord");
}

/// Default per-call deadline (§4.2: "hundreds of ms because it is a failure
/// probe as much as a request").
pub const DEFAULT_RPC_DEADLINE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub enum RpcError {
    /// The peer could not be reached at all (connection refused/reset,
    /// DNS failure, or any other transport-level failure).
    Unreachable(String),
    /// The call was made but did not complete within its deadline.
    Timeout,
    /// The frame could not be decoded.
    FrameCorrupt(String),
    /// The remote peer was reached and answered with an application-level
    /// error — this does NOT imply the peer is dead.
    RemoteError(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Unreachable(msg) => write!(f, "peer unreachable: {msg}"),
            RpcError::Timeout => write!(f, "rpc timed out"),
            RpcError::FrameCorrupt(msg) => write!(f, "frame corrupt: {msg}"),
            RpcError::RemoteError(msg) => write!(f, "remote error: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Only `Unreachable` (and a timed-out dial, which we also treat as
    /// unreachable) implies "peer dead" for stabilization's purposes
    /// (§4.2: "only the former implies peer dead").
    pub fn implies_peer_dead(&self) -> bool {
        matches!(self, RpcError::Unreachable(_) | RpcError::Timeout)
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::DeadlineExceeded => RpcError::Timeout,
            Code::Unavailable => RpcError::Unreachable(status.message().to_string()),
            _ => RpcError::RemoteError(status.message().to_string()),
        }
    }
}

/// Dial a peer with no retry — a single failed dial is reported immediately
/// as `Unreachable`, which is what stabilization and failover decisions key
/// on.
pub async fn connect(address: &Address) -> Result<ChordClient<Channel>, RpcError> {
    tokio::time::timeout(
        DEFAULT_RPC_DEADLINE,
        ChordClient::connect(format!("http://{address}")),
    )
    .await
    .map_err(|_| RpcError::Timeout)?
    .map_err(|e| RpcError::Unreachable(e.to_string()))
}

/// Dial with bounded retry. Used only on the node's own startup join path,
/// where the caller has decided the failure mode it wants (retry vs. give
/// up) rather than leaving it to a protocol engine decision.
pub async fn connect_with_retry(address: &Address) -> Result<ChordClient<Channel>, RpcError> {
    let mut attempt = 0;
    loop {
        match connect(address).await {
            Ok(client) => return Ok(client),
            Err(err) => {
                attempt += 1;
                if attempt > MAX_CONNECTION_RETRIES {
                    return Err(err);
                }
                warn!("failed to connect to {address}: {err}, retrying...");
                tokio::time::sleep(Duration::from_millis(CONNECTION_RETRY_SLEEP_MILLIS)).await;
            }
        }
    }
}

/// Try each address in order, returning the first that answers. Used by
/// `get_client_for_closest_successor` to skip over dead entries at the head
/// of the successor list without a full failover decision.
pub async fn connect_to_first_reachable(addresses: &[Address]) -> Option<(ChordClient<Channel>, Address)> {
    for address in addresses {
        if let Ok(client) = connect(address).await {
            return Some((client, address.clone()));
        }
    }
    None
}

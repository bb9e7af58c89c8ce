//! C4 — the Chord protocol engine: `find_successor`, `closest_preceding_finger`,
//! `join`, `stabilize`, `notify`, `fix_fingers`, `check_predecessor`, plus the
//! gRPC service surface that carries them between peers (§4.4, §6).
//!
//! `ChordNode` is the single long-lived actor the rest of the process talks
//! to: node state (C3), the local store (C5) and the job coordinator (C6) are
//! all reached through it. Periodic maintenance (`threads` in `main.rs`) calls
//! the `run_*` methods directly; the same methods back the RPCs of the same
//! name so a peer can trigger our maintenance remotely if it wants to (§6).

use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status, Streaming};

use crate::dht::record::DhtRecord;
use crate::dht::store::{GetOutcome, Store};
use crate::job::coordinator::{JobCoordinator, Router};
use crate::job::record::JobRecord;
use crate::node::finger_entry::FingerEntry;
use crate::node::state::NodeState;
use crate::rpc::chord_proto::{
    AckHandoffRequest, AddressMsg, Empty, FingerEntryMsg, GetKvStoreDataResponse,
    GetKvStoreSizeResponse, GetPredecessorResponse, GetRequest, GetResponse, GetStatus, HashPosMsg,
    JobStatusRequest, KvPairDebugMsg, KvPairMsg, ListJobsResponse, NodeSummaryMsg, NotifyRequest,
    PutRequest, SubmitJobRequest, SubmitJobResponse, SuccessorListMsg, UpdateFingerTableEntryRequest,
};
use crate::rpc::{self, RpcError};
use crate::utils::constants::DEBUG_RPCS_UNAVAILABLE_ERROR_MESSAGE;
use crate::utils::crypto::{hash, in_arc};
use crate::utils::errors::{CoreError, ProtocolError, StorageError};
use crate::utils::proof_of_work::PowToken;
use crate::utils::time::now;
use crate::utils::types::{Address, HashPos};

/// The running peer: node state, local store, and (once wired up) the job
/// coordinator it routes submissions to. Every field is an `Arc` (or a plain
/// `Copy`/small value), so `ChordNode` itself is a cheap-to-clone handle — the
/// gRPC server, the HTTP/TCP front doors and the periodic maintenance tasks
/// each hold their own clone, all backed by the same shared state (§9 Design
/// Notes: "keep peer handles as value types").
#[derive(Clone)]
pub struct ChordNode {
    state: Arc<NodeState>,
    store: Arc<Store>,
    coordinator: Arc<OnceLock<Arc<JobCoordinator>>>,
    pow_difficulty: usize,
    dev_mode: bool,
    bootstrap_node: Option<Address>,
}

impl ChordNode {
    pub fn new(
        state: Arc<NodeState>,
        store: Arc<Store>,
        pow_difficulty: usize,
        dev_mode: bool,
        bootstrap_node: Option<Address>,
    ) -> ChordNode {
        ChordNode {
            state,
            store,
            coordinator: Arc::new(OnceLock::new()),
            pow_difficulty,
            dev_mode,
            bootstrap_node,
        }
    }

    /// Wired once, right after `JobCoordinator::start` returns (see `main.rs`).
    pub fn set_coordinator(&self, coordinator: Arc<JobCoordinator>) {
        let _ = self.coordinator.set(coordinator);
    }

    fn coordinator(&self) -> &Arc<JobCoordinator> {
        self.coordinator.get().expect("coordinator installed before any job traffic")
    }

    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Exposed for the HTTP and raw admin TCP front doors (§6), which route
    /// job submissions and status queries through the same coordinator the
    /// gRPC `SubmitJob`/`JobStatus` handlers use.
    pub fn job_coordinator(&self) -> &Arc<JobCoordinator> {
        self.coordinator()
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    fn owns_key(&self, key: HashPos) -> bool {
        match self.state.predecessor() {
            // predecessor unknown: we cannot yet compute our arc, so accept
            // rather than bounce every write back to the caller (§4.4 — a
            // freshly-joined node's predecessor starts as `None`).
            None => true,
            Some(pred) => in_arc(key, pred.get_key(), self.state.pos(), true),
        }
    }

    // ---- C4 join -------------------------------------------------------

    /// §4.4 Join. `self.state` starts out as a singleton ring (constructed by
    /// the caller via `NodeState::new_singleton`); this mutates it in place
    /// when a bootstrap peer is configured.
    pub async fn join(&self, bootstrap: Option<&Address>) -> Result<(), ProtocolError> {
        let Some(bootstrap) = bootstrap else {
            return Ok(());
        };

        let successor = self
            .call_find_successor(bootstrap, self.state.pos())
            .await
            .map_err(|_| ProtocolError::RingDetached)?;

        self.state.set_successor_primary(successor.clone());
        self.state.clear_predecessor();

        match self.call_get_successor_list(&successor).await {
            Ok(list) => self.state.rebuild_successor_list(successor, list),
            Err(err) => warn!("join: could not fetch successor list from {successor}: {err}"),
        }

        Ok(())
    }

    // ---- C4 find_successor / closest_preceding_finger -------------------

    /// §4.4 `find_successor`. One local hop (closest preceding finger) plus
    /// at most one outbound RPC, which the remote peer resolves the same way
    /// — the recursion happens across the network, not in a local loop.
    pub async fn resolve_successor(&self, id: HashPos) -> Result<Address, ProtocolError> {
        let successor = self.state.primary_successor();
        let successor_pos = hash(successor.as_bytes());
        if in_arc(id, self.state.pos(), successor_pos, true) {
            return Ok(successor);
        }

        let mut candidates = self.closest_preceding_candidates(id);
        candidates.retain(|addr| addr != self.state.address());

        for candidate in &candidates {
            match self.call_find_successor(candidate, id).await {
                Ok(addr) => return Ok(addr),
                Err(err) if err.implies_peer_dead() => {
                    debug!("find_successor: hop to {candidate} failed ({err}), trying next-closer finger");
                    continue;
                }
                Err(err) => {
                    warn!("find_successor: hop to {candidate} returned {err}");
                    return Err(ProtocolError::LookupExhausted);
                }
            }
        }

        Err(ProtocolError::LookupExhausted)
    }

    /// §4.4 `closest_preceding_finger`: the single tightest candidate.
    fn closest_preceding(&self, id: HashPos) -> Address {
        self.closest_preceding_candidates(id)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.state.address().clone())
    }

    /// Candidates in descending-distance order (finger table scanned from
    /// index m-1 down to 0, then the successor list) — each one strictly
    /// between `self` and `id`. `resolve_successor` walks this list so a
    /// dead hop falls through to the next-closer finger instead of failing
    /// the whole lookup (§4.4: "if an RPC hop fails Unreachable, try the
    /// next-closer finger").
    fn closest_preceding_candidates(&self, id: HashPos) -> Vec<Address> {
        let self_pos = self.state.pos();
        let self_addr = self.state.address().clone();
        let mut candidates = Vec::new();

        for finger in self.state.finger_snapshot().iter().rev() {
            let addr = finger.get_address().clone();
            if addr == self_addr || candidates.contains(&addr) {
                continue;
            }
            if in_arc(finger.get_key(), self_pos, id, false) {
                candidates.push(addr);
            }
        }

        for addr in self.state.successor_list_snapshot().successors {
            if addr == self_addr || candidates.contains(&addr) {
                continue;
            }
            if in_arc(hash(addr.as_bytes()), self_pos, id, false) {
                candidates.push(addr);
            }
        }

        candidates
    }

    // ---- C4 periodic maintenance -----------------------------------------

    /// §4.4 Stabilization loop, one round.
    pub async fn run_stabilize(&self) {
        let successor = self.state.primary_successor();
        if successor == *self.state.address() {
            // singleton ring: nothing to stabilize against yet.
            return;
        }

        match self.call_get_predecessor(&successor).await {
            Ok(Some(candidate)) => {
                let candidate_pos = hash(candidate.as_bytes());
                let successor_pos = hash(successor.as_bytes());
                if in_arc(candidate_pos, self.state.pos(), successor_pos, false) {
                    debug!("stabilize: adopting {candidate} as new primary successor");
                    self.state.set_successor_primary(candidate);
                }
            }
            Ok(None) => {}
            Err(err) if err.implies_peer_dead() => {
                warn!("stabilize: successor {successor} unreachable ({err}), failing over");
                self.handle_successor_failure().await;
                return;
            }
            Err(err) => warn!("stabilize: get_predecessor on {successor} returned {err}"),
        }

        let successor = self.state.primary_successor();
        match self.call_notify(&successor).await {
            Ok(handed_off) => {
                for record in handed_off {
                    if let Err(StorageError::VersionStale) = self.store.accept_if_newer(record) {
                        // handoff replayed a key we already have a newer copy of; fine.
                    }
                }
            }
            Err(err) if err.implies_peer_dead() => {
                warn!("stabilize: notify on {successor} unreachable ({err}), failing over");
                self.handle_successor_failure().await;
                return;
            }
            Err(err) => warn!("stabilize: notify on {successor} returned {err}"),
        }

        if let Ok(list) = self.call_get_successor_list(&successor).await {
            self.state.rebuild_successor_list(successor, list);
        }
    }

    /// §4.4 `fix_fingers`, one tick of the round-robin cursor.
    pub async fn run_fix_fingers(&self) {
        let index = self.state.next_finger_to_fix();
        self.state.advance_finger_cursor();
        let target = self.state.finger_target(index);

        match self.resolve_successor(target).await {
            Ok(addr) => {
                self.state.set_finger(index, addr.clone());
                if index == 0 {
                    self.state.set_successor_primary(addr);
                }
            }
            // errors are swallowed: leave the stale finger in place (§4.4).
            Err(err) => debug!("fix_fingers: index {index} lookup failed: {err}"),
        }
    }

    /// §4.4 `check_predecessor`.
    pub async fn run_check_predecessor(&self) {
        let Some(predecessor) = self.state.predecessor() else {
            return;
        };
        if let Err(err) = self.call_health(predecessor.get_address()).await {
            if err.implies_peer_dead() {
                info!("check_predecessor: {} unreachable, clearing predecessor", predecessor.get_address());
                self.state.clear_predecessor();
            }
        }
    }

    /// Successor failover (§4.4): evict the dead head and promote the next
    /// entry. If the list is exhausted, retry the remembered bootstrap peer,
    /// or fall back to forming a singleton ring.
    async fn handle_successor_failure(&self) {
        if self.state.evict_dead_successor().is_some() {
            return;
        }

        warn!("successor list exhausted, node is detached");
        let bootstrap = self.bootstrap_node.clone();
        match bootstrap {
            Some(ref peer) => match self.join(Some(peer)).await {
                Ok(()) => info!("rejoined ring via bootstrap {peer}"),
                Err(err) => {
                    warn!("rejoin via {peer} failed ({err}), forming a singleton ring");
                    self.form_singleton();
                }
            },
            None => self.form_singleton(),
        }
    }

    fn form_singleton(&self) {
        self.state.set_successor_primary(self.state.address().clone());
        self.state.clear_predecessor();
    }

    // ---- outbound RPC helpers --------------------------------------------

    async fn call_find_successor(&self, peer: &Address, id: HashPos) -> Result<Address, RpcError> {
        let mut client = rpc::connect(peer).await?;
        let resp = tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.find_successor(Request::new(HashPosMsg::from(id))))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(resp.into_inner().into())
    }

    async fn call_get_predecessor(&self, peer: &Address) -> Result<Option<Address>, RpcError> {
        let mut client = rpc::connect(peer).await?;
        let resp = tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.get_predecessor(Request::new(Empty {})))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(resp.into_inner().address_optional.map(Address::from))
    }

    async fn call_get_successor_list(&self, peer: &Address) -> Result<Vec<Address>, RpcError> {
        let mut client = rpc::connect(peer).await?;
        let resp = tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.get_successor_list(Request::new(Empty {})))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(resp.into_inner().successors)
    }

    /// Calls the peer's `notify` RPC with our own address, consuming the
    /// handoff stream it answers with, then acks receipt so the peer can
    /// drop its copies (§4.5 Handoff: delete only after the RPC succeeds,
    /// not after the stream send does).
    async fn call_notify(&self, peer: &Address) -> Result<Vec<DhtRecord>, RpcError> {
        let mut client = rpc::connect(peer).await?;
        let token = PowToken::generate(self.pow_difficulty);
        let req = NotifyRequest {
            address: Some(self.state.address().clone().into()),
            pow_token: Some(token.into()),
        };
        let resp = tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.notify(Request::new(req)))
            .await
            .map_err(|_| RpcError::Timeout)??;

        let mut stream = resp.into_inner();
        let mut records = Vec::new();
        while let Some(msg) = stream.message().await.map_err(RpcError::from)? {
            records.push(DhtRecord::from(msg));
        }

        if !records.is_empty() {
            let keys = records.iter().map(|r| r.key.to_be_bytes().to_vec()).collect();
            if let Err(err) = self.call_ack_handoff(peer, keys).await {
                warn!("notify: failed to ack handoff to {peer} ({err}), peer will retain handed-off keys until its next handoff");
            }
        }

        Ok(records)
    }

    /// Confirms receipt of a handoff so the sender can delete its copies.
    async fn call_ack_handoff(&self, peer: &Address, keys: Vec<Vec<u8>>) -> Result<(), RpcError> {
        let mut client = rpc::connect(peer).await?;
        let req = AckHandoffRequest {
            address: Some(self.state.address().clone().into()),
            keys,
        };
        tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.ack_handoff(Request::new(req)))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(())
    }

    async fn call_health(&self, peer: &Address) -> Result<(), RpcError> {
        let mut client = rpc::connect(peer).await?;
        tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.health(Request::new(Empty {})))
            .await
            .map_err(|_| RpcError::Timeout)??;
        Ok(())
    }
}

#[tonic::async_trait]
impl Router for ChordNode {
    async fn find_successor(&self, key: HashPos) -> Result<Address, ProtocolError> {
        self.resolve_successor(key).await
    }

    fn self_address(&self) -> Address {
        self.state.address().clone()
    }
}

#[tonic::async_trait]
impl crate::rpc::chord_proto::chord_server::Chord for ChordNode {
    async fn health(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }

    async fn find_successor(&self, request: Request<HashPosMsg>) -> Result<Response<AddressMsg>, Status> {
        let id: HashPos = request.into_inner().into();
        match self.resolve_successor(id).await {
            Ok(addr) => Ok(Response::new(addr.into())),
            Err(err) => Err(CoreError::Protocol(err).into()),
        }
    }

    async fn find_closest_preceding_finger(&self, request: Request<HashPosMsg>) -> Result<Response<FingerEntryMsg>, Status> {
        let id: HashPos = request.into_inner().into();
        let addr = self.closest_preceding(id);
        Ok(Response::new(FingerEntry::from(addr).into()))
    }

    async fn get_predecessor(&self, _: Request<Empty>) -> Result<Response<GetPredecessorResponse>, Status> {
        let addr = self.state.predecessor().map(|p| p.get_address().clone());
        Ok(Response::new(GetPredecessorResponse {
            address_optional: addr.map(AddressMsg::from),
        }))
    }

    async fn get_successor_list(&self, _: Request<Empty>) -> Result<Response<SuccessorListMsg>, Status> {
        Ok(Response::new(self.state.successor_list_snapshot().into()))
    }

    async fn update_finger_table_entry(&self, request: Request<UpdateFingerTableEntryRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        if let Some(entry) = req.finger_entry {
            self.state.set_finger(req.index as usize, entry.address);
        }
        Ok(Response::new(Empty {}))
    }

    type NotifyStream = Pin<Box<dyn Stream<Item = Result<KvPairMsg, Status>> + Send>>;

    /// §4.4 `notify`: adopt the caller as our predecessor if it is closer
    /// than our current one, then stream back whatever keys now belong to
    /// it (§4.5 Handoff).
    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<Self::NotifyStream>, Status> {
        let req = request.into_inner();
        let token: PowToken = req
            .pow_token
            .ok_or_else(|| Status::invalid_argument("missing pow token"))?
            .into();
        let (expired, valid) = token.validate();
        if expired {
            return Err(Status::cancelled("pow token expired"));
        }
        if !valid {
            return Err(Status::cancelled(format!("invalid pow token: {token}")));
        }

        let caller: Address = req
            .address
            .ok_or_else(|| Status::invalid_argument("missing address"))?
            .into();
        let caller_pos = hash(caller.as_bytes());

        let should_adopt = match self.state.predecessor() {
            None => true,
            Some(ref pred) => in_arc(caller_pos, pred.get_key(), self.state.pos(), false),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if should_adopt {
            let previous_pos = self.state.predecessor().map(|p| p.get_key()).unwrap_or(self.state.pos());
            self.state.set_predecessor(Some(FingerEntry::from(caller.clone())));
            debug!("notify: adopted {caller} as predecessor");

            let store = self.store.clone();
            let caller_for_task = caller.clone();
            tokio::spawn(async move {
                let records = store.records_in_arc(previous_pos, caller_pos);
                let mut sent = 0usize;
                for record in records {
                    if tx.send(Ok(KvPairMsg::from(record))).is_ok() {
                        sent += 1;
                    } else {
                        error!("handoff stream to {caller_for_task} closed early");
                        break;
                    }
                }
                debug!("streamed {sent} keys to {caller_for_task}, awaiting ack before deleting");
            });
        }

        let stream = UnboundedReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::NotifyStream))
    }

    /// §4.5 Handoff: the notify caller only sends this once it has durably
    /// applied every record the stream produced, so deletion happens on
    /// confirmed receipt rather than on the stream send succeeding.
    async fn ack_handoff(&self, request: Request<AckHandoffRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let mut acked = 0usize;
        for key_bytes in &req.keys {
            if key_bytes.len() != 16 {
                continue;
            }
            let mut buf = [0u8; 16];
            buf.copy_from_slice(key_bytes);
            self.store.local_delete(HashPos::from_be_bytes(buf));
            acked += 1;
        }
        debug!("ack_handoff: deleted {acked} handed-off keys");
        Ok(Response::new(Empty {}))
    }

    /// Client-streaming handoff used when a predecessor shuts down
    /// gracefully and pushes its whole arc to us ahead of time.
    async fn handoff(&self, request: Request<Streaming<KvPairMsg>>) -> Result<Response<Empty>, Status> {
        let mut stream = request.into_inner();
        let mut count = 0usize;
        while let Some(msg) = stream.message().await? {
            let record = DhtRecord::from(msg);
            let _ = self.store.accept_if_newer(record);
            count += 1;
        }
        info!("received {count} handed-off records");
        Ok(Response::new(Empty {}))
    }

    async fn stabilize(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.run_stabilize().await;
        Ok(Response::new(Empty {}))
    }

    async fn fix_fingers(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.run_fix_fingers().await;
        Ok(Response::new(Empty {}))
    }

    async fn check_predecessor(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.run_check_predecessor().await;
        Ok(Response::new(Empty {}))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let key: HashPos = HashPosMsg { key: req.key }.into();

        if !self.owns_key(key) {
            let hint = self.closest_preceding(key);
            return Err(CoreError::Protocol(ProtocolError::NotOwner { expected_peer: hint }).into());
        }

        if req.version == 0 {
            self.store.local_put(key, req.value, req.ttl.max(1));
        } else {
            let record = DhtRecord {
                key,
                value: req.value,
                version: req.version,
                expires_at: now().as_secs() + req.ttl,
            };
            if let Err(StorageError::VersionStale) = self.store.accept_if_newer(record) {
                debug!("put: ignored stale version for key {key:?}");
            }
        }
        Ok(Response::new(Empty {}))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let key: HashPos = HashPosMsg { key: req.key }.into();

        if !self.owns_key(key) {
            let hint = self.closest_preceding(key);
            return Ok(Response::new(GetResponse {
                value: Vec::new(),
                status: GetStatus::NotOwner as i32,
                owner_hint: hint,
            }));
        }

        let response = match self.store.local_get_detailed(key) {
            GetOutcome::Found(record) => GetResponse {
                value: record.value,
                status: GetStatus::Ok as i32,
                owner_hint: String::new(),
            },
            GetOutcome::Expired { value } => GetResponse {
                value,
                status: GetStatus::Expired as i32,
                owner_hint: String::new(),
            },
            GetOutcome::NotFound => GetResponse {
                value: Vec::new(),
                status: GetStatus::NotFound as i32,
                owner_hint: String::new(),
            },
        };
        Ok(Response::new(response))
    }

    async fn submit_job(&self, request: Request<SubmitJobRequest>) -> Result<Response<SubmitJobResponse>, Status> {
        let record_msg = request
            .into_inner()
            .record
            .ok_or_else(|| Status::invalid_argument("missing record"))?;
        let record = JobRecord::from(record_msg);
        let job_id = record.job_id;
        self.coordinator().accept_forwarded_submit(record).map_err(Status::from)?;
        Ok(Response::new(SubmitJobResponse {
            job_id: job_id.to_be_bytes().to_vec(),
        }))
    }

    async fn job_status(&self, request: Request<JobStatusRequest>) -> Result<Response<crate::rpc::chord_proto::JobStatusResponse>, Status> {
        let req = request.into_inner();
        let job_id: HashPos = HashPosMsg { key: req.job_id }.into();
        let response = match self.coordinator().local_status(job_id) {
            Some(record) => crate::rpc::chord_proto::JobStatusResponse {
                found: true,
                record: Some(record.into()),
            },
            None => crate::rpc::chord_proto::JobStatusResponse {
                found: false,
                record: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn list_jobs(&self, _: Request<Empty>) -> Result<Response<ListJobsResponse>, Status> {
        let jobs = self
            .coordinator()
            .list_local_jobs()
            .into_iter()
            .filter_map(|summary| self.coordinator().local_status(summary.job_id))
            .map(Into::into)
            .collect();
        Ok(Response::new(ListJobsResponse { jobs }))
    }

    async fn get_node_summary(&self, _: Request<Empty>) -> Result<Response<NodeSummaryMsg>, Status> {
        if !self.dev_mode {
            return Err(Status::unimplemented(DEBUG_RPCS_UNAVAILABLE_ERROR_MESSAGE));
        }
        Ok(Response::new(NodeSummaryMsg {
            url: self.state.address().clone(),
            pos: Some(self.state.pos().into()),
            predecessor: self.state.predecessor().map(FingerEntryMsg::from),
            finger_entries: self.state.finger_snapshot().into_iter().map(FingerEntryMsg::from).collect(),
            successor_list: Some(self.state.successor_list_snapshot().into()),
        }))
    }

    async fn get_kv_store_size(&self, _: Request<Empty>) -> Result<Response<GetKvStoreSizeResponse>, Status> {
        if !self.dev_mode {
            return Err(Status::unimplemented(DEBUG_RPCS_UNAVAILABLE_ERROR_MESSAGE));
        }
        Ok(Response::new(GetKvStoreSizeResponse { size: self.store.len() as u32 }))
    }

    async fn get_kv_store_data(&self, _: Request<Empty>) -> Result<Response<GetKvStoreDataResponse>, Status> {
        if !self.dev_mode {
            return Err(Status::unimplemented(DEBUG_RPCS_UNAVAILABLE_ERROR_MESSAGE));
        }
        let kv_pairs = self
            .store
            .snapshot()
            .into_iter()
            .map(|record| KvPairDebugMsg {
                key: record.key.to_string(),
                value: String::from_utf8_lossy(&record.value).to_string(),
            })
            .collect();
        Ok(Response::new(GetKvStoreDataResponse { kv_pairs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(address: &str) -> ChordNode {
        let state = Arc::new(NodeState::new_singleton(address.to_string(), 4));
        ChordNode::new(state, Arc::new(Store::new()), 0, true, None)
    }

    #[tokio::test]
    async fn singleton_ring_resolves_every_key_to_self() {
        let n = node("127.0.0.1:6501");
        for probe in [0u128, 1, u128::MAX / 2, u128::MAX] {
            assert_eq!(n.resolve_successor(probe).await.unwrap(), "127.0.0.1:6501");
        }
    }

    #[tokio::test]
    async fn closest_preceding_falls_back_to_self_with_no_candidates() {
        let n = node("127.0.0.1:6501");
        assert_eq!(n.closest_preceding(12345), "127.0.0.1:6501");
    }

    #[test]
    fn owns_key_accepts_everything_before_predecessor_is_known() {
        let n = node("127.0.0.1:6501");
        assert!(n.owns_key(0));
        assert!(n.owns_key(u128::MAX));
    }
}

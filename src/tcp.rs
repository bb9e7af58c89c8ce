//! Raw admin TCP protocol (SPEC_FULL.md, Supplemented Features) — a tiny
//! length-delimited alternative to gRPC for clients that just want
//! `put`/`get` without a protobuf stack, generalized to route through the
//! same `find_successor` lookup the HTTP and gRPC front doors use rather
//! than only ever touching the local store.

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tonic::Request;

use crate::chord::ChordNode;
use crate::dht::store::GetOutcome;
use crate::rpc::chord_proto::{GetRequest, GetStatus, PutRequest};
use crate::utils::constants::{DHT_FAILURE, DHT_GET, DHT_PUT, DHT_SUCCESS};
use crate::utils::types::HashPos;

/// Accepts connections until the process shuts down, spawning one task per
/// client.
pub async fn serve(listener: TcpListener, node: ChordNode) {
    loop {
        let (socket, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("admin tcp accept failed: {err}");
                continue;
            }
        };
        debug!("admin tcp: new connection from {peer_addr}");
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client_connection(socket, node).await {
                warn!("admin tcp: connection from {peer_addr} ended with error: {err}");
            }
        });
    }
}

/// One frame: 4-byte big-endian length, then `[opcode: u8, body...]`.
///
/// `DHT_PUT` body: `key (16 bytes, big-endian) | ttl (8 bytes, big-endian) | value (rest)`.
/// `DHT_GET` body: `key (16 bytes, big-endian)`.
/// Reply is a single frame: `DHT_SUCCESS | value` or `DHT_FAILURE | utf8 message`.
pub async fn handle_client_connection(mut socket: TcpStream, node: ChordNode) -> Result<(), std::io::Error> {
    loop {
        let mut len_buf = [0u8; 4];
        if socket.read_exact(&mut len_buf).await.is_err() {
            return Ok(()); // client closed the connection
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut frame = vec![0u8; len];
        socket.read_exact(&mut frame).await?;
        if frame.is_empty() {
            write_failure(&mut socket, "empty frame").await?;
            continue;
        }

        let (opcode, body) = (frame[0], &frame[1..]);
        let reply = match opcode {
            _ if opcode == DHT_PUT => handle_put(&node, body).await,
            _ if opcode == DHT_GET => handle_get(&node, body).await,
            other => Err(format!("unknown opcode {other}")),
        };

        match reply {
            Ok(value) => write_success(&mut socket, &value).await?,
            Err(message) => write_failure(&mut socket, &message).await?,
        }
    }
}

async fn handle_put(node: &ChordNode, body: &[u8]) -> Result<Vec<u8>, String> {
    if body.len() < 24 {
        return Err("DHT_PUT body too short".to_string());
    }
    let key = key_from_bytes(&body[0..16]);
    let ttl = u64::from_be_bytes(body[16..24].try_into().unwrap());
    let value = body[24..].to_vec();

    match node.resolve_successor(key).await {
        Ok(owner) if owner == *node.state().address() => {
            node.store().local_put(key, value, ttl.max(1));
            Ok(Vec::new())
        }
        Ok(owner) => forward_put(&owner, key, value, ttl).await,
        Err(err) => Err(err.to_string()),
    }
}

async fn handle_get(node: &ChordNode, body: &[u8]) -> Result<Vec<u8>, String> {
    if body.len() < 16 {
        return Err("DHT_GET body too short".to_string());
    }
    let key = key_from_bytes(&body[0..16]);

    match node.resolve_successor(key).await {
        Ok(owner) if owner == *node.state().address() => match node.store().local_get_detailed(key) {
            GetOutcome::Found(record) => Ok(record.value),
            GetOutcome::Expired { .. } => Err("key expired".to_string()),
            GetOutcome::NotFound => Err("key not found".to_string()),
        },
        Ok(owner) => forward_get(&owner, key).await,
        Err(err) => Err(err.to_string()),
    }
}

async fn forward_put(owner: &str, key: HashPos, value: Vec<u8>, ttl: u64) -> Result<Vec<u8>, String> {
    let mut client = crate::rpc::connect(&owner.to_string()).await.map_err(|e| e.to_string())?;
    client
        .put(Request::new(PutRequest {
            key: key.to_be_bytes().to_vec(),
            value,
            ttl,
            version: 0,
            replication: false,
        }))
        .await
        .map_err(|status| status.to_string())?;
    Ok(Vec::new())
}

async fn forward_get(owner: &str, key: HashPos) -> Result<Vec<u8>, String> {
    let mut client = crate::rpc::connect(&owner.to_string()).await.map_err(|e| e.to_string())?;
    let resp = client
        .get(Request::new(GetRequest { key: key.to_be_bytes().to_vec() }))
        .await
        .map_err(|status| status.to_string())?
        .into_inner();

    match GetStatus::from_i32(resp.status) {
        Some(GetStatus::Ok) => Ok(resp.value),
        Some(GetStatus::Expired) => Err("key expired".to_string()),
        Some(GetStatus::NotFound) => Err("key not found".to_string()),
        _ => Err(format!("owner redirected to {}", resp.owner_hint)),
    }
}

fn key_from_bytes(bytes: &[u8]) -> HashPos {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    HashPos::from_be_bytes(buf)
}

async fn write_success(socket: &mut TcpStream, value: &[u8]) -> Result<(), std::io::Error> {
    let mut frame = Vec::with_capacity(1 + value.len());
    frame.push(DHT_SUCCESS);
    frame.extend_from_slice(value);
    write_frame(socket, &frame).await
}

async fn write_failure(socket: &mut TcpStream, message: &str) -> Result<(), std::io::Error> {
    info!("admin tcp request failed: {message}");
    let mut frame = Vec::with_capacity(1 + message.len());
    frame.push(DHT_FAILURE);
    frame.extend_from_slice(message.as_bytes());
    write_frame(socket, &frame).await
}

async fn write_frame(socket: &mut TcpStream, frame: &[u8]) -> Result<(), std::io::Error> {
    socket.write_all(&(frame.len() as u32).to_be_bytes()).await?;
    socket.write_all(frame).await
}

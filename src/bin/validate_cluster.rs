//! External cluster validator (SPEC_FULL.md, Supplemented Features): connects
//! to a set of running `dev_mode` nodes over gRPC and checks ring
//! connectivity, finger-table correctness and successor-list correctness
//! from the outside, without being part of the ring itself.

use std::env;

use tonic::transport::Channel;
use tonic::Request;

use chordjobs::rpc::chord_proto::chord_client::ChordClient;
use chordjobs::rpc::chord_proto::{Empty, NodeSummaryMsg};
use chordjobs::utils::crypto::hash;
use chordjobs::utils::types::HashPos;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        eprintln!("usage: validate_cluster <node-url> [<node-url> ...]");
        std::process::exit(1);
    }

    let mut summaries: Vec<NodeSummaryMsg> = Vec::new();
    for host in args.iter().skip(1) {
        let mut client: ChordClient<Channel> = match ChordClient::connect(format!("http://{host}")).await {
            Ok(client) => client,
            Err(err) => {
                eprintln!("could not connect to {host}: {err}");
                std::process::exit(1);
            }
        };

        match client.get_node_summary(Request::new(Empty {})).await {
            Ok(resp) => summaries.push(resp.into_inner()),
            Err(status) => {
                eprintln!("{host} refused GetNodeSummary ({status}) — was it started with --dev-mode?");
                std::process::exit(1);
            }
        }
    }

    summaries.sort_by_key(pos_of);
    let node_ids: Vec<HashPos> = summaries.iter().map(pos_of).collect();

    let mut ok = true;

    // predecessor pointers should form a single cycle through every node
    for (i, summary) in summaries.iter().enumerate() {
        let next = &summaries[(i + 1) % summaries.len()];
        let next_predecessor = next.predecessor.as_ref().map(|p| p.address.as_str());
        if next_predecessor != Some(summary.url.as_str()) {
            ok = false;
            eprintln!(
                "ring broken: {} should be {}'s predecessor, but {} reports predecessor {:?}",
                summary.url, next.url, next.url, next_predecessor
            );
        }
    }

    // every finger should point at whichever known node actually owns that slot
    for summary in &summaries {
        for (j, finger) in summary.finger_entries.iter().enumerate() {
            if finger.address.is_empty() {
                continue;
            }
            let finger_target = pos_from_bytes(&finger.id);
            let pointed_to = hash(finger.address.as_bytes());
            let actually_responsible = responsible_for(finger_target, &node_ids);
            if pointed_to != actually_responsible {
                ok = false;
                eprintln!(
                    "{}: finger[{j}] targets {finger_target} via {} (pos {pointed_to}), but {actually_responsible} owns it",
                    summary.url, finger.address
                );
            }
        }
    }

    // each node's successor list should match the next r nodes around the ring
    for (i, summary) in summaries.iter().enumerate() {
        let Some(ref successor_list) = summary.successor_list else {
            ok = false;
            eprintln!("{}: missing successor list", summary.url);
            continue;
        };
        for (j, successor) in successor_list.successors.iter().enumerate() {
            let expected = &summaries[(i + j + 1) % summaries.len()].url;
            if successor != expected {
                ok = false;
                eprintln!("{}: successor_list[{j}] is {successor}, expected {expected}", summary.url);
            }
        }
    }

    if ok {
        eprintln!("cluster looks consistent ({} nodes)", summaries.len());
    } else {
        eprintln!("cluster is inconsistent");
        std::process::exit(1);
    }
}

fn pos_of(summary: &NodeSummaryMsg) -> HashPos {
    summary.pos.as_ref().map(|p| pos_from_bytes(&p.key)).unwrap_or(0)
}

fn pos_from_bytes(bytes: &[u8]) -> HashPos {
    let mut buf = [0u8; 16];
    let len = bytes.len().min(16);
    buf[16 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    HashPos::from_be_bytes(buf)
}

fn responsible_for(key: HashPos, sorted_ids: &[HashPos]) -> HashPos {
    *sorted_ids
        .iter()
        .find(|&&id| key <= id)
        .unwrap_or_else(|| sorted_ids.first().expect("cluster has at least one node"))
}

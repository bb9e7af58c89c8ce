use clap::Parser;

use crate::utils::types::Address;

/// Command-line flags for the `chordjobs` node binary. Every option also has
/// an `chordjobs.ini` counterpart (see `utils::config`); CLI flags win over
/// the file, which wins over the built-in default.
#[derive(Parser, Debug, Clone)]
#[command(name = "chordjobs", about = "Peer-to-peer distributed job execution over a Chord DHT")]
pub struct Cli {
    /// gRPC peer address this node listens on, e.g. 127.0.0.1:6501
    #[arg(long)]
    pub grpc: Option<Address>,

    /// HTTP dashboard/API address
    #[arg(long)]
    pub http: Option<Address>,

    /// raw admin TCP address
    #[arg(long)]
    pub tcp: Option<Address>,

    /// existing peer to bootstrap-join through; omit to form a new ring
    #[arg(long)]
    pub peer: Option<Address>,

    #[arg(long)]
    pub object_store_endpoint: Option<String>,

    #[arg(long)]
    pub successor_list_r: Option<usize>,

    #[arg(long)]
    pub t_stabilize_ms: Option<u64>,

    #[arg(long)]
    pub t_fix_fingers_ms: Option<u64>,

    #[arg(long)]
    pub t_check_predecessor_ms: Option<u64>,

    #[arg(long)]
    pub worker_pool_size: Option<usize>,

    #[arg(long)]
    pub pow_difficulty: Option<usize>,

    #[arg(long)]
    pub dev_mode: bool,

    /// optional `chordjobs.ini` overlay, see `utils::config::Config`
    #[arg(long)]
    pub config_file: Option<String>,
}

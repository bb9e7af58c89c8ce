use ini::Ini;
use serde::Serialize;

use crate::utils::cli::Cli;
use crate::utils::constants::{
    DEFAULT_GRPC_PORT, DEFAULT_HTTP_PORT, DEFAULT_JOB_QUEUE_HIGH_WATER_MARK,
    DEFAULT_SUCCESSOR_LIST_R, DEFAULT_TCP_ADMIN_PORT, DEFAULT_T_CHECK_PREDECESSOR_MILLIS,
    DEFAULT_T_FIX_FINGERS_MILLIS, DEFAULT_T_STABILIZE_MILLIS,
};
use crate::utils::types::Address;

/// Resolved node configuration: CLI flags, then the `[chordjobs]` section of
/// an optional ini file, then built-in defaults (§6 Configuration).
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub bootstrap_node: Option<Address>,
    pub grpc_listen: Address,
    pub http_listen: Address,
    pub tcp_admin_listen: Address,
    pub object_store_endpoint: Option<String>,
    pub successor_list_r: usize,
    pub t_stabilize_ms: u64,
    pub t_fix_fingers_ms: u64,
    pub t_check_predecessor_ms: u64,
    pub worker_pool_size: usize,
    pub pow_difficulty: usize,
    pub dev_mode: bool,
    pub job_queue_high_water_mark: usize,
}

impl Config {
    pub fn resolve(cli: &Cli) -> Config {
        let ini = cli
            .config_file
            .as_ref()
            .and_then(|path| Ini::load_from_file(path).ok());

        let section = ini.as_ref().and_then(|ini| ini.section(Some("chordjobs")));
        let from_ini = |key: &str| section.and_then(|s| s.get(key)).map(str::to_owned);

        let default_worker_pool_size = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Config {
            bootstrap_node: cli.peer.clone().or_else(|| from_ini("bootstrap_node")),
            grpc_listen: cli
                .grpc
                .clone()
                .or_else(|| from_ini("listen_port"))
                .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_GRPC_PORT)),
            http_listen: cli
                .http
                .clone()
                .or_else(|| from_ini("http_listen"))
                .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_HTTP_PORT)),
            tcp_admin_listen: cli
                .tcp
                .clone()
                .or_else(|| from_ini("tcp_admin_listen"))
                .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_TCP_ADMIN_PORT)),
            object_store_endpoint: cli
                .object_store_endpoint
                .clone()
                .or_else(|| from_ini("object_store_endpoint")),
            successor_list_r: cli
                .successor_list_r
                .or_else(|| from_ini("successor_list_r").and_then(|v| v.parse().ok()))
                .unwrap_or(DEFAULT_SUCCESSOR_LIST_R),
            t_stabilize_ms: cli
                .t_stabilize_ms
                .or_else(|| from_ini("t_stabilize_ms").and_then(|v| v.parse().ok()))
                .unwrap_or(DEFAULT_T_STABILIZE_MILLIS),
            t_fix_fingers_ms: cli
                .t_fix_fingers_ms
                .or_else(|| from_ini("t_fix_fingers_ms").and_then(|v| v.parse().ok()))
                .unwrap_or(DEFAULT_T_FIX_FINGERS_MILLIS),
            t_check_predecessor_ms: cli
                .t_check_predecessor_ms
                .or_else(|| from_ini("t_check_predecessor_ms").and_then(|v| v.parse().ok()))
                .unwrap_or(DEFAULT_T_CHECK_PREDECESSOR_MILLIS),
            worker_pool_size: cli
                .worker_pool_size
                .or_else(|| from_ini("worker_pool_size").and_then(|v| v.parse().ok()))
                .unwrap_or(default_worker_pool_size),
            pow_difficulty: cli
                .pow_difficulty
                .or_else(|| from_ini("pow_difficulty").and_then(|v| v.parse().ok()))
                .unwrap_or(0),
            dev_mode: cli.dev_mode
                || from_ini("dev_mode")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            job_queue_high_water_mark: from_ini("job_queue_high_water_mark")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_JOB_QUEUE_HIGH_WATER_MARK),
        }
    }
}

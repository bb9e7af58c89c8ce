use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::{info, warn, LevelFilter};
use tera::Tera;
use tokio::net::TcpListener;
use tonic::transport::Server;

use chordjobs::chord::ChordNode;
use chordjobs::dht::store::Store;
use chordjobs::http;
use chordjobs::job::coordinator::{JobCoordinator, Router};
use chordjobs::job::executor::DeterministicTestExecutor;
use chordjobs::job::object_store::InMemoryObjectStore;
use chordjobs::node::state::NodeState;
use chordjobs::rpc::chord_proto::chord_server::ChordServer;
use chordjobs::tcp;
use chordjobs::utils::cli::Cli;
use chordjobs::utils::config::Config;

pub mod chord_proto {
    pub(crate) const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("chord_descriptor");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new().env().with_level(LevelFilter::Info).init()?;

    let config = Config::resolve(&cli);
    info!("starting chordjobs node with config: {config:?}");

    let state = Arc::new(NodeState::new_singleton(config.grpc_listen.clone(), config.successor_list_r));
    let store = Arc::new(Store::new());

    let executor = Arc::new(DeterministicTestExecutor);
    let object_store = Arc::new(InMemoryObjectStore::new(&["input", "output"]));
    let coordinator = JobCoordinator::start(
        store.clone(),
        executor,
        object_store,
        config.worker_pool_size,
        config.job_queue_high_water_mark,
    );

    let node = ChordNode::new(
        state,
        store,
        config.pow_difficulty,
        config.dev_mode,
        config.bootstrap_node.clone(),
    );
    coordinator.set_router(Arc::new(node.clone()) as Arc<dyn Router>);
    node.set_coordinator(coordinator);

    if let Err(err) = node.join(config.bootstrap_node.as_ref()).await {
        warn!("join failed ({err}), forming a singleton ring instead");
    }

    let mut handles = Vec::new();

    info!("starting gRPC service on {}", config.grpc_listen);
    let grpc_addr = config.grpc_listen.parse()?;
    let grpc_node = node.clone();
    handles.push(tokio::spawn(async move {
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(chord_proto::FILE_DESCRIPTOR_SET)
            .build()
            .expect("reflection service always builds from a valid descriptor set");

        Server::builder()
            .add_service(ChordServer::new(grpc_node))
            .add_service(reflection_service)
            .serve(grpc_addr)
            .await
            .expect("gRPC server exited unexpectedly");
    }));

    info!("starting admin tcp service on {}", config.tcp_admin_listen);
    let tcp_node = node.clone();
    let tcp_listen = config.tcp_admin_listen.clone();
    handles.push(tokio::spawn(async move {
        let listener = TcpListener::bind(&tcp_listen)
            .await
            .unwrap_or_else(|err| panic!("failed to bind admin tcp listener on {tcp_listen}: {err}"));
        tcp::serve(listener, tcp_node).await;
    }));

    info!("starting http service on {}", config.http_listen);
    let http_node = node.clone();
    let http_config = config.clone();
    let http_listen = config.http_listen.clone();
    handles.push(tokio::spawn(async move {
        HttpServer::new(move || {
            let tera = Tera::new("static/html/**/*").unwrap_or_else(|_| Tera::default());
            let app_state = web::Data::new(http::AppState {
                node: http_node.clone(),
                config: http_config.clone(),
                tera,
            });
            App::new()
                .app_data(app_state)
                .service(http::index)
                .service(http::status)
                .service(http::finger)
                .service(http::buckets)
                .service(http::add_job)
                .service(http::job_status)
                .service(http::all_jobs)
        })
        .bind(&http_listen)
        .unwrap_or_else(|err| panic!("failed to bind http listener on {http_listen}: {err}"))
        .run()
        .await
        .expect("http server exited unexpectedly");
    }));

    spawn_periodic(node.clone(), "stabilize", Duration::from_millis(config.t_stabilize_ms), |n| {
        Box::pin(async move { n.run_stabilize().await })
    });
    spawn_periodic(node.clone(), "fix_fingers", Duration::from_millis(config.t_fix_fingers_ms), |n| {
        Box::pin(async move { n.run_fix_fingers().await })
    });
    spawn_periodic(
        node.clone(),
        "check_predecessor",
        Duration::from_millis(config.t_check_predecessor_ms),
        |n| Box::pin(async move { n.run_check_predecessor().await }),
    );

    for handle in handles {
        handle.await?;
    }
    Ok(())
}

/// Periodic maintenance task (§4.4/§5): ticks every `period` and calls the
/// given `ChordNode` method directly, rather than connecting back to its own
/// gRPC port in a loop — there is no reason to pay RPC/serialization
/// overhead to call into the same process.
fn spawn_periodic<F>(node: ChordNode, name: &'static str, period: Duration, mut call: F)
where
    F: FnMut(ChordNode) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            call(node.clone()).await;
        }
    });
    info!("started periodic {name} task every {period:?}");
}

//! §6 HTTP surface — out of core scope per §1 Non-goals ("the HTTP/HTML
//! front-end and templated dashboard"), but still the front door most
//! callers use, so it is implemented with `actix-web` + `tera` rather than
//! left out entirely.

use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse, Responder};
use log::warn;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tonic::Request;

use crate::chord::ChordNode;
use crate::job::record::JobState;
use crate::rpc::chord_proto::Empty;
use crate::rpc::{self};
use crate::utils::config::Config;
use crate::utils::types::HashPos;

pub struct AppState {
    pub node: ChordNode,
    pub config: Config,
    pub tera: Tera,
}

#[derive(Serialize)]
struct StatusResponse {
    chord: &'static str,
    object_store: &'static str,
    object_store_endpoint: Option<String>,
}

#[get("/status")]
pub async fn status(state: Data<AppState>) -> impl Responder {
    let object_store = match state.node.job_coordinator().object_store().list_buckets().await {
        Ok(_) => "online",
        Err(_) => "offline",
    };
    HttpResponse::Ok().json(StatusResponse {
        chord: "online",
        object_store,
        object_store_endpoint: state.config.object_store_endpoint.clone(),
    })
}

#[derive(Serialize)]
struct FingerResponse {
    finger: Vec<String>,
}

#[get("/finger")]
pub async fn finger(state: Data<AppState>) -> impl Responder {
    let finger = state
        .node
        .state()
        .finger_snapshot()
        .into_iter()
        .map(|entry| entry.get_key().to_string())
        .collect();
    HttpResponse::Ok().json(FingerResponse { finger })
}

#[derive(Serialize)]
struct BucketsResponse {
    buckets: Vec<String>,
}

#[get("/buckets")]
pub async fn buckets(state: Data<AppState>) -> impl Responder {
    match state.node.job_coordinator().object_store().list_buckets().await {
        Ok(buckets) => HttpResponse::Ok().json(BucketsResponse { buckets }),
        Err(err) => HttpResponse::ServiceUnavailable().body(err.to_string()),
    }
}

#[derive(Deserialize)]
pub struct AddJobRequest {
    task_name: String,
    source_bucket: String,
    dest_bucket: String,
    #[serde(default)]
    params: String,
}

#[derive(Serialize)]
struct AddJobResponse {
    job_id: String,
}

#[post("/add_job")]
pub async fn add_job(state: Data<AppState>, body: Json<AddJobRequest>) -> impl Responder {
    let body = body.into_inner();
    match state
        .node
        .job_coordinator()
        .submit(body.task_name, body.source_bucket, body.dest_bucket, body.params)
        .await
    {
        Ok(job_id) => HttpResponse::Ok().json(AddJobResponse { job_id: job_id.to_string() }),
        Err(err) => HttpResponse::ServiceUnavailable().body(err.to_string()),
    }
}

#[derive(Serialize)]
struct JobStatusResponse {
    state: &'static str,
    progress: Option<u8>,
    result: Option<String>,
    error: Option<String>,
}

#[get("/job_status/{job_id}")]
pub async fn job_status(state: Data<AppState>, path: Path<String>) -> impl Responder {
    let Ok(job_id) = path.into_inner().parse::<HashPos>() else {
        return HttpResponse::BadRequest().body("job_id must be a decimal identifier");
    };

    let job_state = state.node.job_coordinator().status(job_id).await;
    let record = state.node.job_coordinator().local_status(job_id);

    let (state_name, progress) = match job_state {
        JobState::Pending => ("pending", None),
        JobState::Running { pct } => ("running", Some(pct)),
        JobState::Succeeded => ("succeeded", Some(100)),
        JobState::Failed => ("failed", None),
        JobState::Unknown => ("unknown", None),
    };

    HttpResponse::Ok().json(JobStatusResponse {
        state: state_name,
        progress,
        result: record.as_ref().and_then(|r| r.result.clone()),
        error: record.as_ref().and_then(|r| r.error.clone()),
    })
}

#[derive(Serialize)]
struct AllJobsResponse {
    jobs: Vec<JobSummaryJson>,
}

#[derive(Serialize)]
struct JobSummaryJson {
    job_id: String,
    task_name: String,
    state: &'static str,
    peer: String,
}

/// Aggregated across the ring: local jobs plus a best-effort fan-out to
/// every peer currently in the successor list (§6: "Aggregated across
/// ring"). A peer that does not answer within the RPC deadline is skipped
/// rather than failing the whole request.
#[get("/all_jobs")]
pub async fn all_jobs(state: Data<AppState>) -> impl Responder {
    let mut jobs: Vec<JobSummaryJson> = state
        .node
        .job_coordinator()
        .list_local_jobs()
        .into_iter()
        .map(|summary| JobSummaryJson {
            job_id: summary.job_id.to_string(),
            task_name: summary.task_name,
            state: job_state_name(summary.state),
            peer: state.node.state().address().clone(),
        })
        .collect();

    let peers = state.node.state().successor_list_snapshot().successors;
    let self_address = state.node.state().address().clone();
    for peer in peers {
        if peer == self_address {
            continue;
        }
        match fetch_remote_jobs(&peer).await {
            Ok(remote) => jobs.extend(remote),
            Err(err) => warn!("all_jobs: could not reach {peer}: {err}"),
        }
    }

    HttpResponse::Ok().json(AllJobsResponse { jobs })
}

async fn fetch_remote_jobs(peer: &str) -> Result<Vec<JobSummaryJson>, rpc::RpcError> {
    let mut client = rpc::connect(&peer.to_string()).await?;
    let resp = tokio::time::timeout(rpc::DEFAULT_RPC_DEADLINE, client.list_jobs(Request::new(Empty {})))
        .await
        .map_err(|_| rpc::RpcError::Timeout)??;
    Ok(resp
        .into_inner()
        .jobs
        .into_iter()
        .map(|msg| {
            let record = crate::job::record::JobRecord::from(msg);
            JobSummaryJson {
                job_id: record.job_id.to_string(),
                task_name: record.task_name,
                state: job_state_name(record.state),
                peer: peer.to_string(),
            }
        })
        .collect())
}

fn job_state_name(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Running { .. } => "running",
        JobState::Succeeded => "succeeded",
        JobState::Failed => "failed",
        JobState::Unknown => "unknown",
    }
}

#[get("/")]
pub async fn index(state: Data<AppState>) -> impl Responder {
    let mut context = Context::new();
    context.insert("title", "Chord Node");
    context.insert("address", state.node.state().address());
    context.insert("pos", &state.node.state().pos().to_string());
    context.insert("max_pos", &HashPos::MAX.to_string());
    context.insert(
        "fingers",
        &state
            .node
            .state()
            .finger_snapshot()
            .iter()
            .map(|f| (f.get_key().to_string(), f.get_address().clone()))
            .collect::<Vec<_>>(),
    );

    match state.tera.render("index.html", &context) {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

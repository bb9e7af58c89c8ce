use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use log::{error, info, warn};
use tokio::sync::mpsc;
use tonic::Request;

use crate::dht::store::Store;
use crate::job::executor::Executor;
use crate::job::object_store::ObjectStore;
use crate::job::record::{JobRecord, JobState};
use crate::job::task::Task;
use crate::rpc::chord_proto::{JobStatusRequest, SubmitJobRequest};
use crate::rpc::{connect_with_retry, RpcError};
use crate::utils::errors::{CoreError, JobError, ProtocolError};
use crate::utils::types::{Address, HashPos};

/// The one capability the coordinator needs from the Chord engine: where a
/// key's owner is, and who we are. Kept as a trait (rather than a direct
/// dependency on `chord::ChordService`) so the two modules don't form a
/// compile-time cycle — `ChordService` holds an `Arc<JobCoordinator>` to
/// serve job RPCs locally, and `JobCoordinator` holds an `Arc<dyn Router>`
/// (wired up once, right after both are constructed) to route jobs.
#[tonic::async_trait]
pub trait Router: Send + Sync {
    async fn find_successor(&self, key: HashPos) -> Result<Address, ProtocolError>;
    fn self_address(&self) -> Address;
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job_id: HashPos,
    pub task_name: String,
    pub state: JobState,
}

pub struct JobCoordinator {
    store: std::sync::Arc<Store>,
    router: OnceLock<std::sync::Arc<dyn Router>>,
    job_ids: Mutex<HashSet<HashPos>>,
    pending_tx: mpsc::UnboundedSender<HashPos>,
    queue_depth: AtomicUsize,
    high_water_mark: usize,
    executor: std::sync::Arc<dyn Executor>,
    object_store: std::sync::Arc<dyn ObjectStore>,
    worker_pool: rayon::ThreadPool,
}

impl JobCoordinator {
    pub fn start(
        store: std::sync::Arc<Store>,
        executor: std::sync::Arc<dyn Executor>,
        object_store: std::sync::Arc<dyn ObjectStore>,
        worker_pool_size: usize,
        high_water_mark: usize,
    ) -> std::sync::Arc<JobCoordinator> {
        let (pending_tx, mut pending_rx) = mpsc::unbounded_channel::<HashPos>();
        let worker_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_pool_size.max(1))
            .thread_name(|i| format!("chordjobs-worker-{i}"))
            .build()
            .expect("failed to build job worker pool");

        let coordinator = std::sync::Arc::new(JobCoordinator {
            store,
            router: OnceLock::new(),
            job_ids: Mutex::new(HashSet::new()),
            pending_tx,
            queue_depth: AtomicUsize::new(0),
            high_water_mark,
            executor,
            object_store,
            worker_pool,
        });

        let dispatcher_handle = coordinator.clone();
        tokio::spawn(async move {
            while let Some(job_id) = pending_rx.recv().await {
                let worker_handle = dispatcher_handle.clone();
                dispatcher_handle.worker_pool.spawn(move || {
                    worker_handle.run_job(job_id);
                    worker_handle.queue_depth.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        coordinator
    }

    /// Wired once, right after the owning `ChordService` has been
    /// constructed (see `threads::setup`).
    pub fn set_router(&self, router: std::sync::Arc<dyn Router>) {
        let _ = self.router.set(router);
    }

    fn router(&self) -> &std::sync::Arc<dyn Router> {
        self.router.get().expect("router installed before any job traffic")
    }

    /// C6 `submit`.
    pub async fn submit(
        &self,
        task_name: String,
        source_bucket: String,
        dest_bucket: String,
        params: String,
    ) -> Result<HashPos, CoreError> {
        let job_id = JobRecord::compute_job_id(&task_name, &source_bucket, &dest_bucket, &params);
        let owner = self.router().find_successor(job_id).await.map_err(CoreError::Protocol)?;

        if owner == self.router().self_address() {
            self.submit_local(job_id, task_name, source_bucket, dest_bucket, params)?;
        } else {
            self.forward_submit(&owner, job_id, task_name, source_bucket, dest_bucket, params)
                .await?;
        }
        Ok(job_id)
    }

    /// Holds `job_ids` for the whole check-then-enqueue sequence so two
    /// concurrent submits for the same `job_id` (one from the local
    /// HTTP/TCP path, one forwarded in over `SubmitJob`) can't both observe
    /// "no existing record" and both enqueue a dispatch (§4.6 at-most-once).
    /// Nothing under this lock awaits, so it's held only as long as the
    /// local store read/write it serializes actually takes.
    fn submit_local(
        &self,
        job_id: HashPos,
        task_name: String,
        source_bucket: String,
        dest_bucket: String,
        params: String,
    ) -> Result<(), CoreError> {
        let mut job_ids = self.job_ids.lock().unwrap();

        let existing = self.load(job_id);

        // At-most-once per key (§4.6): a second submit while Running or
        // Succeeded is a no-op; a submit of a Failed job is a legal retry.
        if let Some(record) = &existing {
            match record.state {
                JobState::Running { .. } | JobState::Succeeded => {
                    info!("job {:?} already {:?}, submit is a no-op", job_id, record.state);
                    return Ok(());
                }
                JobState::Pending | JobState::Failed | JobState::Unknown => {}
            }
        }

        if existing.is_none() && self.queue_depth.load(Ordering::SeqCst) >= self.high_water_mark {
            return Err(CoreError::Job(JobError::Overloaded));
        }

        let record = JobRecord::new_pending(
            task_name,
            source_bucket,
            dest_bucket,
            params,
            self.router().self_address(),
        );
        self.persist(&record);
        job_ids.insert(job_id);
        self.queue_depth.fetch_add(1, Ordering::SeqCst);

        self.pending_tx
            .send(job_id)
            .expect("dispatcher task outlives the coordinator");
        Ok(())
    }

    async fn forward_submit(
        &self,
        owner: &Address,
        job_id: HashPos,
        task_name: String,
        source_bucket: String,
        dest_bucket: String,
        params: String,
    ) -> Result<(), CoreError> {
        let record = JobRecord::new_pending(task_name, source_bucket, dest_bucket, params, owner.clone());
        debug_assert_eq!(record.job_id, job_id);
        let mut client = connect_with_retry(owner)
            .await
            .map_err(|e: RpcError| CoreError::Rpc(e.to_string()))?;
        client
            .submit_job(Request::new(SubmitJobRequest {
                record: Some(record.into()),
            }))
            .await
            .map_err(|status| CoreError::Rpc(status.to_string()))?;
        Ok(())
    }

    /// C6 `status`.
    pub async fn status(&self, job_id: HashPos) -> JobState {
        let owner = match self.router().find_successor(job_id).await {
            Ok(addr) => addr,
            Err(_) => return JobState::Unknown,
        };

        if owner == self.router().self_address() {
            self.load(job_id).map(|r| r.state).unwrap_or(JobState::Unknown)
        } else {
            self.fetch_remote_status(&owner, job_id).await
        }
    }

    async fn fetch_remote_status(&self, owner: &Address, job_id: HashPos) -> JobState {
        let mut client = match connect_with_retry(owner).await {
            Ok(client) => client,
            Err(_) => return JobState::Unknown,
        };
        match client
            .job_status(Request::new(JobStatusRequest {
                job_id: job_id.to_be_bytes().to_vec(),
            }))
            .await
        {
            Ok(resp) => {
                let resp = resp.into_inner();
                if resp.found {
                    resp.record.map(|r| JobRecord::from(r).state).unwrap_or(JobState::Unknown)
                } else {
                    JobState::Unknown
                }
            }
            Err(_) => JobState::Unknown,
        }
    }

    /// Called from the `SubmitJob` RPC handler when a peer forwards a job
    /// this node owns.
    pub fn accept_forwarded_submit(&self, record: JobRecord) -> Result<(), CoreError> {
        self.submit_local(
            record.job_id,
            record.task_name,
            record.source_bucket,
            record.dest_bucket,
            record.params,
        )
    }

    /// Called from the `JobStatus` RPC handler.
    pub fn local_status(&self, job_id: HashPos) -> Option<JobRecord> {
        self.load(job_id)
    }

    /// C6 `list_local_jobs`.
    pub fn list_local_jobs(&self) -> Vec<JobSummary> {
        let mut ids = self.job_ids.lock().unwrap();
        let mut summaries = Vec::new();
        ids.retain(|job_id| match self.load(*job_id) {
            Some(record) => {
                summaries.push(JobSummary {
                    job_id: *job_id,
                    task_name: record.task_name,
                    state: record.state,
                });
                true
            }
            // the job was handed off to a new owner; stop tracking it here.
            None => false,
        });
        summaries
    }

    fn load(&self, job_id: HashPos) -> Option<JobRecord> {
        self.store
            .local_get(job_id)
            .ok()
            .and_then(|record| serde_json::from_slice(&record.value).ok())
    }

    fn persist(&self, record: &JobRecord) {
        let bytes = serde_json::to_vec(record).expect("JobRecord always serializes");
        self.store.local_put(record.job_id, bytes, crate::utils::constants::DEFAULT_TTL_SECS);
    }

    fn run_job(&self, job_id: HashPos) {
        let Some(mut record) = self.load(job_id) else {
            warn!("worker picked up job {:?} with no record, dropping", job_id);
            return;
        };

        record.state = JobState::Running { pct: 0 };
        self.persist(&record);

        let task = match Task::parse(&record.task_name, &record.params) {
            Ok(task) => task,
            Err(err) => {
                record.state = JobState::Failed;
                record.error = Some(err.to_string());
                self.persist(&record);
                return;
            }
        };

        let progress_store = self.store.clone();
        let progress_job_id = job_id;
        let progress_task_name = record.task_name.clone();
        let on_progress = move |pct: u8| {
            if let Some(mut record) = progress_store
                .local_get(progress_job_id)
                .ok()
                .and_then(|r| serde_json::from_slice::<JobRecord>(&r.value).ok())
            {
                record.state = JobState::Running { pct: pct.min(99) };
                let bytes = serde_json::to_vec(&record).expect("JobRecord always serializes");
                progress_store.local_put(progress_job_id, bytes, crate::utils::constants::DEFAULT_TTL_SECS);
            } else {
                warn!("progress update for {progress_task_name} arrived after its record vanished");
            }
        };

        let executor = self.executor.clone();
        let source = record.source_bucket.clone();
        let dest = record.dest_bucket.clone();
        let params = record.params.clone();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            executor.execute(&task, &source, &dest, &params, Some(&on_progress))
        }));

        match outcome {
            Ok(Ok(artifact)) => {
                record.state = JobState::Succeeded;
                record.result = Some(artifact.url);
            }
            Ok(Err(job_err)) => {
                record.state = JobState::Failed;
                record.error = Some(job_err.to_string());
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                error!("job {:?} panicked: {reason}", job_id);
                record.state = JobState::Failed;
                record.error = Some(format!("ExecutorFailed: {reason}"));
            }
        }

        self.persist(&record);
    }

    pub fn object_store(&self) -> &std::sync::Arc<dyn ObjectStore> {
        &self.object_store
    }
}

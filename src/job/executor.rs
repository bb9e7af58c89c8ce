use crate::job::task::Task;
use crate::utils::errors::JobError;

/// An object-store handle naming where a job's output landed, e.g. an
/// object-store URL (§1: "the owning node... on completion, publishes the
/// result back into the DHT under the same key").
#[derive(Debug, Clone)]
pub struct Artifact {
    pub url: String,
}

/// C7 — the external job-payload-processor contract (§1: "fit, despeckle,
/// grid, map... not specified in detail"). Runs on the CPU-bound worker
/// pool, never on the networking runtime (§5).
///
/// The progress callback is optional (§9 Open Questions: "whether progress
/// callbacks from the executor are mandatory or optional is ambiguous; this
/// spec treats them as optional") — an executor that never calls it simply
/// leaves the job record at `Running { pct: 0 }` until it finishes.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        task: &Task,
        source_bucket: &str,
        dest_bucket: &str,
        params: &str,
        progress: Option<&dyn Fn(u8)>,
    ) -> Result<Artifact, JobError>;
}

/// A deterministic executor used in tests and as a default when no real
/// processor is wired in: it reports a couple of progress ticks and
/// "succeeds" by naming an artifact after the task without touching any
/// object store. Concrete processors are explicitly out of scope (§1).
pub struct DeterministicTestExecutor;

impl Executor for DeterministicTestExecutor {
    fn execute(
        &self,
        task: &Task,
        _source_bucket: &str,
        dest_bucket: &str,
        _params: &str,
        progress: Option<&dyn Fn(u8)>,
    ) -> Result<Artifact, JobError> {
        if let Some(cb) = progress {
            cb(50);
        }
        Ok(Artifact {
            url: format!("{dest_bucket}/{}-result", task.name()),
        })
    }
}

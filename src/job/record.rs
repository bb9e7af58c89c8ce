use serde::{Deserialize, Serialize};

use crate::rpc::chord_proto::{JobRecordMsg, JobStateMsg, JobStatusKind};
use crate::utils::crypto::hash_id;
use crate::utils::time::now;
use crate::utils::types::{Address, HashPos};

/// §3 Data Model — job lifecycle states. `Running(pct)` folds a progress
/// percentage in [0,100] into the enum directly rather than modeling it as a
/// separate field, since a record is in exactly one of these at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running { pct: u8 },
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A DHT record specialized for job bookkeeping (§3: "Job record (a
/// specialization of the DHT record)"). Persisted through the same `Store`
/// as any other key, serialized as JSON under `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: HashPos,
    pub task_name: String,
    pub source_bucket: String,
    pub dest_bucket: String,
    pub params: String,
    pub submitted_at: u64,
    pub state: JobState,
    pub result: Option<String>,
    pub error: Option<String>,
    pub assigned_peer_address: Address,
}

impl JobRecord {
    /// `job_id = hash(task_name || source_bucket || dest_bucket || params)`
    /// (§3) — NUL-separated so that e.g. `("ab", "c")` and `("a", "bc")`
    /// cannot collide.
    pub fn compute_job_id(task_name: &str, source_bucket: &str, dest_bucket: &str, params: &str) -> HashPos {
        let mut buf = Vec::new();
        for part in [task_name, source_bucket, dest_bucket, params] {
            buf.extend_from_slice(part.as_bytes());
            buf.push(0);
        }
        hash_id(&buf)
    }

    pub fn new_pending(
        task_name: String,
        source_bucket: String,
        dest_bucket: String,
        params: String,
        assigned_peer_address: Address,
    ) -> JobRecord {
        let job_id = Self::compute_job_id(&task_name, &source_bucket, &dest_bucket, &params);
        JobRecord {
            job_id,
            task_name,
            source_bucket,
            dest_bucket,
            params,
            submitted_at: now().as_secs(),
            state: JobState::Pending,
            result: None,
            error: None,
            assigned_peer_address,
        }
    }
}

impl From<JobRecord> for JobRecordMsg {
    fn from(record: JobRecord) -> Self {
        let (kind, pct) = match record.state {
            JobState::Pending => (JobStatusKind::Pending, 0),
            JobState::Running { pct } => (JobStatusKind::Running, pct as u32),
            JobState::Succeeded => (JobStatusKind::Succeeded, 100),
            JobState::Failed => (JobStatusKind::Failed, 0),
            JobState::Unknown => (JobStatusKind::Unknown, 0),
        };
        JobRecordMsg {
            job_id: record.job_id.to_be_bytes().to_vec(),
            task_name: record.task_name,
            source_bucket: record.source_bucket,
            dest_bucket: record.dest_bucket,
            params: record.params,
            submitted_at: record.submitted_at,
            state: Some(JobStateMsg {
                kind: kind.into(),
                progress_pct: pct,
            }),
            result: record.result.unwrap_or_default(),
            error: record.error.unwrap_or_default(),
            assigned_peer_address: record.assigned_peer_address,
            version: 0,
        }
    }
}

impl From<JobRecordMsg> for JobRecord {
    fn from(msg: JobRecordMsg) -> Self {
        let mut buf = [0u8; 16];
        let len = msg.job_id.len().min(16);
        buf[16 - len..].copy_from_slice(&msg.job_id[msg.job_id.len() - len..]);

        let state_msg = msg.state.unwrap_or(JobStateMsg { kind: JobStatusKind::Unknown as i32, progress_pct: 0 });
        let state = match JobStatusKind::from_i32(state_msg.kind) {
            Some(JobStatusKind::Pending) => JobState::Pending,
            Some(JobStatusKind::Running) => JobState::Running { pct: state_msg.progress_pct.min(100) as u8 },
            Some(JobStatusKind::Succeeded) => JobState::Succeeded,
            Some(JobStatusKind::Failed) => JobState::Failed,
            _ => JobState::Unknown,
        };

        JobRecord {
            job_id: HashPos::from_be_bytes(buf),
            task_name: msg.task_name,
            source_bucket: msg.source_bucket,
            dest_bucket: msg.dest_bucket,
            params: msg.params,
            submitted_at: msg.submitted_at,
            state,
            result: if msg.result.is_empty() { None } else { Some(msg.result) },
            error: if msg.error.is_empty() { None } else { Some(msg.error) },
            assigned_peer_address: msg.assigned_peer_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_submissions_collide_on_job_id() {
        let a = JobRecord::compute_job_id("fit", "src", "dst", "p=1");
        let b = JobRecord::compute_job_id("fit", "src", "dst", "p=1");
        let c = JobRecord::compute_job_id("fit", "src", "dst", "p=2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn job_id_does_not_collide_across_field_boundaries() {
        let a = JobRecord::compute_job_id("ab", "c", "d", "e");
        let b = JobRecord::compute_job_id("a", "bc", "d", "e");
        assert_ne!(a, b);
    }
}

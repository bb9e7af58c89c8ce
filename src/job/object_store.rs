use std::collections::HashMap;
use std::sync::Mutex;

use crate::utils::errors::JobError;

/// C7 — the external bucket-oriented blob service contract (§1: "a trait
/// with `list_buckets`, `get_object`, `put_object`"). No concrete MinIO (or
/// otherwise) client is in scope; only the boundary the job coordinator and
/// HTTP `/buckets` endpoint call through.
#[tonic::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>, JobError>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, JobError>;
    /// Returns an artifact handle (e.g. a URL) naming the stored object.
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<String, JobError>;
}

/// An in-process test double standing in for a real bucket service.
pub struct InMemoryObjectStore {
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket_names: &[&str]) -> InMemoryObjectStore {
        let mut buckets = HashMap::new();
        for name in bucket_names {
            buckets.insert(name.to_string(), HashMap::new());
        }
        InMemoryObjectStore {
            buckets: Mutex::new(buckets),
        }
    }
}

#[tonic::async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>, JobError> {
        Ok(self.buckets.lock().unwrap().keys().cloned().collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, JobError> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or(JobError::ArtifactUnavailable)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<String, JobError> {
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets.entry(bucket.to_string()).or_default();
        objects.insert(key.to_string(), data);
        Ok(format!("{bucket}/{key}"))
    }
}

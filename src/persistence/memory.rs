use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use super::{DraftBackend, Payload, RecordId, ServerRecord};
use crate::errors::ApiError;

/// A call observed by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create(Payload),
    Update(RecordId, Payload),
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    records: BTreeMap<RecordId, Payload>,
    calls: Vec<BackendCall>,
    failures: VecDeque<ApiError>,
}

/// In-process backend used for offline sessions and tests.
///
/// Clones share storage, so a test can keep a handle while the wizard owns
/// another one.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl MemoryBackend {
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: first_id,
                records: BTreeMap::new(),
                calls: Vec::new(),
                failures: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoning only happens when a test panics mid-call.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues an error returned by the next create or update.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().failures.push_back(error);
    }

    /// Seeds a stored record, as if created in an earlier session.
    pub fn insert(&self, id: RecordId, payload: Payload) {
        let mut inner = self.lock();
        inner.next_id = inner.next_id.max(id.0 + 1);
        inner.records.insert(id, payload);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn record(&self, id: RecordId) -> Option<Payload> {
        self.lock().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DraftBackend for MemoryBackend {
    fn create(&self, payload: &Payload) -> Result<ServerRecord, ApiError> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Create(payload.clone()));
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }
        let id = RecordId(inner.next_id);
        inner.next_id += 1;
        inner.records.insert(id, payload.clone());
        Ok(ServerRecord {
            id,
            fields: payload.clone(),
        })
    }

    fn update(&self, id: RecordId, payload: &Payload) -> Result<ServerRecord, ApiError> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Update(id, payload.clone()));
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }
        let stored = inner.records.get_mut(&id).ok_or_else(|| ApiError::Server {
            status: 404,
            message: "Not found.".into(),
        })?;
        for (key, value) in payload {
            stored.insert(key.clone(), value.clone());
        }
        Ok(ServerRecord {
            id,
            fields: stored.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn update_merges_into_stored_record() {
        let backend = MemoryBackend::default();
        let created = backend
            .create(&payload(json!({"name": "HR", "acronym": "HR"})))
            .unwrap();
        let updated = backend
            .update(created.id, &payload(json!({"acronym": "HRS"})))
            .unwrap();
        assert_eq!(updated.fields["name"], json!("HR"));
        assert_eq!(updated.fields["acronym"], json!("HRS"));
    }

    #[test]
    fn unknown_record_is_not_found() {
        let backend = MemoryBackend::default();
        let err = backend.update(RecordId(99), &Payload::new()).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 404, .. }));
    }

    #[test]
    fn injected_failure_is_consumed_once() {
        let backend = MemoryBackend::default();
        backend.fail_next(ApiError::NoResponse("timeout".into()));
        assert!(backend.create(&Payload::new()).is_err());
        assert!(backend.create(&Payload::new()).is_ok());
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(backend.len(), 1);
    }
}

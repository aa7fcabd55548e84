//! Boundary to the backend that stores the catalogued systems.

pub mod gateway;
pub mod http;
pub mod memory;
pub mod sanitize;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApiError;

pub use gateway::{DraftGateway, DraftRequest, DraftStatus, DRAFT_FLAG};
pub use http::{classify_error_response, HttpBackend};
pub use memory::{BackendCall, MemoryBackend};
pub use sanitize::{build_payload, sanitize_payload};

/// JSON object sent to the backend.
pub type Payload = Map<String, Value>;

/// Server-assigned identity of a catalogued system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record as echoed back by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Payload,
}

impl ServerRecord {
    pub fn is_draft(&self) -> bool {
        self.fields
            .get(DRAFT_FLAG)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

/// Abstraction over the create / partial-update endpoints.
pub trait DraftBackend: Send + Sync {
    fn create(&self, payload: &Payload) -> Result<ServerRecord, ApiError>;
    fn update(&self, id: RecordId, payload: &Payload) -> Result<ServerRecord, ApiError>;
}

impl<B: DraftBackend + ?Sized> DraftBackend for Box<B> {
    fn create(&self, payload: &Payload) -> Result<ServerRecord, ApiError> {
        (**self).create(payload)
    }

    fn update(&self, id: RecordId, payload: &Payload) -> Result<ServerRecord, ApiError> {
        (**self).update(id, payload)
    }
}

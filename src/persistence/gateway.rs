use serde_json::Value;

use super::{sanitize::build_payload, DraftBackend, Payload, RecordId, ServerRecord};
use crate::errors::ApiError;
use crate::form::FormState;

/// Payload key telling the backend whether the record is still a draft.
pub const DRAFT_FLAG: &str = "is_draft";

/// Backend call the gateway intends to make.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftRequest {
    Create(Payload),
    Update { id: RecordId, payload: Payload },
}

impl DraftRequest {
    pub fn payload(&self) -> &Payload {
        match self {
            DraftRequest::Create(payload) | DraftRequest::Update { payload, .. } => payload,
        }
    }

    /// True when the request clears the draft flag.
    pub fn is_finalize(&self) -> bool {
        self.payload().get(DRAFT_FLAG) == Some(&Value::Bool(false))
    }

    pub fn target(&self) -> Option<RecordId> {
        match self {
            DraftRequest::Create(_) => None,
            DraftRequest::Update { id, .. } => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStatus {
    Unsaved,
    Draft(RecordId),
    Finalized(RecordId),
}

/// Create-then-patch persistence for one wizard session.
///
/// The identity returned by the first successful save is kept for the
/// whole session, whichever tab triggered that save.
#[derive(Debug)]
pub struct DraftGateway<B: DraftBackend> {
    backend: B,
    draft_id: Option<RecordId>,
    finalized: bool,
}

impl<B: DraftBackend> DraftGateway<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            draft_id: None,
            finalized: false,
        }
    }

    /// Continues an existing draft (edit mode).
    pub fn resume(backend: B, id: RecordId) -> Self {
        Self {
            backend,
            draft_id: Some(id),
            finalized: false,
        }
    }

    /// Continues a record loaded from the server. A record that is already
    /// final stays final: later saves never set the draft flag again.
    pub fn resume_record(backend: B, record: &ServerRecord) -> Self {
        Self {
            backend,
            draft_id: Some(record.id),
            finalized: !record.is_draft(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn draft_id(&self) -> Option<RecordId> {
        self.draft_id
    }

    pub fn status(&self) -> DraftStatus {
        match (self.draft_id, self.finalized) {
            (None, _) => DraftStatus::Unsaved,
            (Some(id), false) => DraftStatus::Draft(id),
            (Some(id), true) => DraftStatus::Finalized(id),
        }
    }

    /// Builds the request for the current state without sending it.
    pub fn plan(&self, state: &FormState, finalize: bool) -> DraftRequest {
        let mut payload = build_payload(state);
        payload.insert(
            DRAFT_FLAG.to_string(),
            Value::Bool(!(finalize || self.finalized)),
        );
        match self.draft_id {
            None => DraftRequest::Create(payload),
            Some(id) => DraftRequest::Update { id, payload },
        }
    }

    pub fn execute(&self, request: &DraftRequest) -> Result<ServerRecord, ApiError> {
        match request {
            DraftRequest::Create(payload) => self.backend.create(payload),
            DraftRequest::Update { id, payload } => self.backend.update(*id, payload),
        }
    }

    /// Captures the identity from a successful response.
    pub fn record_success(&mut self, request: &DraftRequest, record: &ServerRecord) {
        match self.draft_id {
            None => {
                tracing::info!(id = %record.id, "draft created");
                self.draft_id = Some(record.id);
            }
            Some(id) if id != record.id => {
                tracing::warn!(expected = %id, returned = %record.id, "server echoed a different id");
            }
            Some(_) => {}
        }
        if request.is_finalize() {
            self.finalized = true;
        }
    }

    /// Saves the state as a draft: create on first use, patch afterwards.
    pub fn save(&mut self, state: &FormState) -> Result<ServerRecord, ApiError> {
        self.send(state, false)
    }

    /// Sends the full state with the draft flag cleared.
    pub fn finalize(&mut self, state: &FormState) -> Result<ServerRecord, ApiError> {
        self.send(state, true)
    }

    fn send(&mut self, state: &FormState, finalize: bool) -> Result<ServerRecord, ApiError> {
        let request = self.plan(state, finalize);
        let record = self.execute(&request)?;
        self.record_success(&request, &record);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{BackendCall, MemoryBackend};

    #[test]
    fn first_save_creates_then_patches() {
        let backend = MemoryBackend::starting_at(42);
        let mut gateway = DraftGateway::new(backend.clone());
        let state = FormState::new().with("name", "Payroll");

        let created = gateway.save(&state).expect("create succeeds");
        assert_eq!(created.id, RecordId(42));
        assert_eq!(gateway.status(), DraftStatus::Draft(RecordId(42)));

        gateway
            .save(&state.clone().with("acronym", "PAY"))
            .expect("update succeeds");
        let calls = backend.calls();
        assert!(matches!(calls[0], BackendCall::Create(_)));
        assert!(matches!(calls[1], BackendCall::Update(RecordId(42), _)));
    }

    #[test]
    fn failed_create_keeps_session_unsaved() {
        let backend = MemoryBackend::default();
        backend.fail_next(ApiError::NoResponse("offline".into()));
        let mut gateway = DraftGateway::new(backend);
        assert!(gateway.save(&FormState::new()).is_err());
        assert_eq!(gateway.status(), DraftStatus::Unsaved);
    }

    #[test]
    fn finalize_clears_draft_flag() {
        let backend = MemoryBackend::default();
        let mut gateway = DraftGateway::resume(backend.clone(), RecordId(7));
        backend.insert(RecordId(7), Payload::new());
        let state = FormState::new().with("name", "CRM");
        let request = gateway.plan(&state, true);
        assert!(request.is_finalize());
        assert_eq!(request.target(), Some(RecordId(7)));

        let record = gateway.finalize(&state).expect("finalize succeeds");
        assert!(!record.is_draft());
        assert_eq!(gateway.status(), DraftStatus::Finalized(RecordId(7)));
    }

    #[test]
    fn finalized_record_is_never_reverted_to_draft() {
        let mut fields = Payload::new();
        fields.insert(DRAFT_FLAG.into(), Value::Bool(false));
        let record = ServerRecord {
            id: RecordId(3),
            fields,
        };
        let gateway = DraftGateway::resume_record(MemoryBackend::default(), &record);
        let request = gateway.plan(&FormState::new().with("notes", "typo fix"), false);
        assert_eq!(request.payload()[DRAFT_FLAG], Value::Bool(false));
        assert_eq!(gateway.status(), DraftStatus::Finalized(RecordId(3)));
    }
}

use std::{collections::BTreeMap, time::Duration};

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use super::{DraftBackend, Payload, RecordId, ServerRecord};
use crate::{
    config::WizardConfig,
    errors::{ApiError, WizardError, NON_FIELD_ERRORS_KEY},
};

const SYSTEMS_PATH: &str = "systems";

/// REST backend: `POST {base}/systems/` and `PATCH {base}/systems/{id}/`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &WizardConfig) -> Result<Self, WizardError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn collection_url(&self) -> String {
        format!("{}/{}/", self.base_url, SYSTEMS_PATH)
    }

    pub fn record_url(&self, id: RecordId) -> String {
        format!("{}/{}/{}/", self.base_url, SYSTEMS_PATH, id)
    }

    fn send(&self, request: RequestBuilder, payload: &Payload) -> Result<ServerRecord, ApiError> {
        let mut request = request
            .header("Accept", "application/json")
            .json(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|err| {
            tracing::warn!(error = %err, "request failed before a response arrived");
            ApiError::NoResponse(err.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ApiError::NoResponse(err.to_string()))?;

        if !status.is_success() {
            let error = classify_error_response(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), %error, "server rejected save");
            return Err(error);
        }

        serde_json::from_str::<ServerRecord>(&body)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }
}

impl DraftBackend for HttpBackend {
    fn create(&self, payload: &Payload) -> Result<ServerRecord, ApiError> {
        let url = self.collection_url();
        tracing::debug!(%url, fields = payload.len(), "creating record");
        self.send(self.client.post(&url), payload)
    }

    fn update(&self, id: RecordId, payload: &Payload) -> Result<ServerRecord, ApiError> {
        let url = self.record_url(id);
        tracing::debug!(%url, fields = payload.len(), "patching record");
        self.send(self.client.patch(&url), payload)
    }
}

/// Maps an error status and body to an [`ApiError`].
///
/// A body carrying a `message` or `detail` string becomes a single server
/// error. Otherwise a 4xx body shaped as `{field: [messages]}` becomes
/// per-field errors with nested keys flattened to `parent.child`.
pub fn classify_error_response(status: u16, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<Value>(body).ok();

    if let Some(Value::Object(map)) = &parsed {
        for key in ["message", "detail"] {
            if let Some(Value::String(message)) = map.get(key) {
                return ApiError::Server {
                    status,
                    message: message.clone(),
                };
            }
        }
        if (400..500).contains(&status) {
            let mut errors = BTreeMap::new();
            if collect_field_errors(None, map, &mut errors) && !errors.is_empty() {
                return ApiError::FieldErrors(errors);
            }
        }
    }

    if let Some(Value::Array(items)) = &parsed {
        let messages: Vec<String> = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if (400..500).contains(&status) && !messages.is_empty() {
            let mut errors = BTreeMap::new();
            errors.insert(NON_FIELD_ERRORS_KEY.to_string(), messages);
            return ApiError::FieldErrors(errors);
        }
    }

    ApiError::Server {
        status,
        message: format!("request failed with status {}", status),
    }
}

/// Returns false when the object is not purely field-to-messages.
fn collect_field_errors(
    prefix: Option<&str>,
    map: &serde_json::Map<String, Value>,
    out: &mut BTreeMap<String, Vec<String>>,
) -> bool {
    for (key, value) in map {
        let name = match prefix {
            Some(parent) => format!("{}.{}", parent, key),
            None => key.clone(),
        };
        match value {
            Value::String(message) => {
                out.entry(name).or_default().push(message.clone());
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(message) => {
                            out.entry(name.clone()).or_default().push(message.clone());
                        }
                        Value::Object(nested) => {
                            if !collect_field_errors(Some(&name), nested, out) {
                                return false;
                            }
                        }
                        _ => return false,
                    }
                }
            }
            Value::Object(nested) => {
                if !collect_field_errors(Some(&name), nested, out) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_map_becomes_field_errors() {
        let err = classify_error_response(
            400,
            r#"{"name": ["This field may not be blank."], "contact_email": "Enter a valid email address."}"#,
        );
        let ApiError::FieldErrors(errors) = err else {
            panic!("expected field errors");
        };
        assert_eq!(errors["name"], vec!["This field may not be blank."]);
        assert_eq!(errors["contact_email"], vec!["Enter a valid email address."]);
    }

    #[test]
    fn nested_errors_are_flattened() {
        let err = classify_error_response(400, r#"{"backup_policy": {"retention_days": ["Too large."]}}"#);
        assert_eq!(err.rejected_fields(), vec!["backup_policy.retention_days"]);
    }

    #[test]
    fn detail_becomes_server_error() {
        let err = classify_error_response(403, r#"{"detail": "Authentication credentials were not provided."}"#);
        assert_eq!(
            err,
            ApiError::Server {
                status: 403,
                message: "Authentication credentials were not provided.".into()
            }
        );
    }

    #[test]
    fn unparseable_body_is_generic_server_error() {
        let err = classify_error_response(502, "<html>Bad gateway</html>");
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
    }

    #[test]
    fn urls_follow_collection_layout() {
        let config = WizardConfig::default().with_api_base_url("http://example.test/api/");
        let backend = HttpBackend::new(&config).expect("client builds");
        assert_eq!(backend.collection_url(), "http://example.test/api/systems/");
        assert_eq!(backend.record_url(RecordId(12)), "http://example.test/api/systems/12/");
    }

    #[test]
    fn unreachable_server_reports_no_response() {
        let config = WizardConfig {
            api_base_url: "http://127.0.0.1:9".into(),
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..WizardConfig::default()
        };
        let backend = HttpBackend::new(&config).expect("client builds");
        let err = backend.create(&Payload::new()).unwrap_err();
        assert!(matches!(err, ApiError::NoResponse(_)));
    }
}

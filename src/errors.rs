use std::collections::BTreeMap;

use thiserror::Error;

/// Error type covering misuse of the wizard and its collaborators.
///
/// Expected flow outcomes (a tab failing validation, a save being rejected by
/// the server) are reported through outcome enums instead; this type is for
/// requests the wizard cannot act on at all.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unknown tab: {0}")]
    UnknownTab(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },
    #[error("Field `{0}` does not offer predefined options")]
    NotAnOptionField(String),
    #[error("`{option}` is not an option of `{field}`")]
    UnknownOption { field: String, option: String },
    #[error("A save is already in progress")]
    SaveInFlight,
    #[error("No confirmation prompt is open")]
    NoPendingNavigation,
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failures reported by the draft persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server rejected individual fields; each entry keeps its own messages.
    #[error("server rejected {} field(s)", .0.len())]
    FieldErrors(BTreeMap<String, Vec<String>>),
    /// The server answered with an error but no per-field detail.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    /// The request never produced a response.
    #[error("no response from server: {0}")]
    NoResponse(String),
    /// A success status with a body that could not be understood.
    #[error("unexpected server response: {0}")]
    InvalidResponse(String),
}

pub const NON_FIELD_ERRORS_KEY: &str = "non_field_errors";

impl ApiError {
    /// Messages to surface to the user, one per line.
    ///
    /// Field rejections are never collapsed: each message is reported as
    /// `field: message` so the user can find the offending input.
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            ApiError::FieldErrors(errors) => errors
                .iter()
                .flat_map(|(field, messages)| {
                    messages.iter().map(move |message| {
                        if field == NON_FIELD_ERRORS_KEY {
                            message.clone()
                        } else {
                            format!("{}: {}", field, message)
                        }
                    })
                })
                .collect(),
            ApiError::Server { message, .. } => {
                vec![format!("Saving failed: {}", message)]
            }
            ApiError::NoResponse(_) => vec![
                "No response from the server. Check your network connection and try again."
                    .to_string(),
            ],
            ApiError::InvalidResponse(_) => {
                vec!["Saving failed: the server returned an unexpected response.".to_string()]
            }
        }
    }

    /// Field names carried by a field-level rejection, in key order.
    pub fn rejected_fields(&self) -> Vec<&str> {
        match self {
            ApiError::FieldErrors(errors) => errors
                .keys()
                .map(String::as_str)
                .filter(|field| *field != NON_FIELD_ERRORS_KEY)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Errors raised by [`crate::fields::RecordListEditor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordEditorError {
    #[error("Another record is already being edited")]
    EditorOpen,
    #[error("No record is being edited")]
    NoActiveEditor,
    #[error("No record at position {index} (list has {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Stored records could not be read: {0}")]
    Decode(String),
    #[error("Records could not be written back: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_are_reported_individually() {
        let mut errors = BTreeMap::new();
        errors.insert(
            "email".to_string(),
            vec!["invalid format".to_string(), "already used".to_string()],
        );
        errors.insert(
            NON_FIELD_ERRORS_KEY.to_string(),
            vec!["record locked".to_string()],
        );
        let err = ApiError::FieldErrors(errors);
        assert_eq!(
            err.user_messages(),
            vec![
                "email: invalid format".to_string(),
                "email: already used".to_string(),
                "record locked".to_string(),
            ]
        );
        assert_eq!(err.rejected_fields(), vec!["email"]);
    }

    #[test]
    fn no_response_mentions_network() {
        let err = ApiError::NoResponse("connection refused".into());
        assert!(err.user_messages()[0].contains("network connection"));

        let generic = ApiError::Server {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(generic.user_messages(), vec!["Saving failed: boom".to_string()]);
    }
}

//! Error taxonomy shared by the connector, the repositories and the view-models.

use serde::Deserialize;
use std::fmt;

/// Coarse classification of a [`BackendError`], derived from the structured
/// PostgREST `code` and the HTTP status. Never from the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unique constraint violated (Postgres `23505`, HTTP 409)
    UniqueViolation,
    /// Row or resource missing (`PGRST116`, HTTP 404)
    NotFound,
    /// Rejected by row level security or a bad key (HTTP 401/403, `42501`)
    Unauthorized,
    /// The connector was built without credentials
    NotConfigured,
    /// The request never got an answer from the backend
    Network,
    Other,
}

pub const UNIQUE_VIOLATION_CODE: &str = "23505";
pub const NOT_FOUND_CODE: &str = "PGRST116";
pub const INSUFFICIENT_PRIVILEGE_CODE: &str = "42501";
/// PostgREST's JWT and role errors (`PGRST300`..`PGRST302`)
pub const JWT_CODE_PREFIX: &str = "PGRST3";
pub const NOT_CONFIGURED_CODE: &str = "not_configured";

/// Failure of a select/insert/update/subscribe against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    // Common error constructors
    pub fn not_configured(reason: &str) -> Self {
        Self::new(format!("Backend is not configured: {reason}")).with_code(NOT_CONFIGURED_CODE)
    }

    pub fn network(details: impl fmt::Display) -> Self {
        Self::new(format!("Network error: {details}"))
    }

    pub fn unique_violation(constraint: &str) -> Self {
        Self::new(format!(
            "duplicate key value violates unique constraint \"{constraint}\""
        ))
        .with_code(UNIQUE_VIOLATION_CODE)
        .with_status(409)
    }

    pub fn decode(details: impl fmt::Display) -> Self {
        Self::new(format!("Unexpected response from backend: {details}"))
    }

    /// Classifies the error.
    ///
    /// Rules, first match wins. The status is only consulted when the
    /// response carried no code.
    /// 1. code `23505`, or no code and status 409 → [`ErrorKind::UniqueViolation`]
    /// 2. code `PGRST116`, or no code and status 404 → [`ErrorKind::NotFound`]
    /// 3. code `42501` or `PGRST3xx`, or no code and status 401/403 →
    ///    [`ErrorKind::Unauthorized`]
    /// 4. code `not_configured` → [`ErrorKind::NotConfigured`]
    /// 5. neither code nor status → [`ErrorKind::Network`]
    /// 6. anything else → [`ErrorKind::Other`]
    pub fn kind(&self) -> ErrorKind {
        let code = self.code.as_deref();
        match (code, self.status) {
            (Some(UNIQUE_VIOLATION_CODE), _) | (None, Some(409)) => ErrorKind::UniqueViolation,
            (Some(NOT_FOUND_CODE), _) | (None, Some(404)) => ErrorKind::NotFound,
            (Some(INSUFFICIENT_PRIVILEGE_CODE), _) | (None, Some(401 | 403)) => {
                ErrorKind::Unauthorized
            }
            (Some(c), _) if c.starts_with(JWT_CODE_PREFIX) => ErrorKind::Unauthorized,
            (Some(NOT_CONFIGURED_CODE), _) => ErrorKind::NotConfigured,
            (None, None) => ErrorKind::Network,
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

/// Error body returned by PostgREST for non-2xx responses
#[derive(Debug, Deserialize)]
pub struct PostgrestErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl PostgrestErrorBody {
    pub fn into_backend_error(self, status: u16) -> BackendError {
        let mut message = self
            .message
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        if let Some(details) = self.details.filter(|d| !d.is_empty()) {
            message = format!("{message} ({details})");
        }
        BackendError {
            message,
            code: self.code,
            status: Some(status),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::new(err.to_string()).with_status(status.as_u16()),
            None if err.is_decode() => Self::decode(err),
            None => Self::network(err),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err)
    }
}

/// Top level error type of the crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Missing or malformed configuration
    Configuration(String),
    Backend(BackendError),
    /// Local validation failure, never reaches the backend
    Validation(String),
}

impl SyncError {
    /// Message suitable for showing to a guest
    pub fn user_message(&self) -> &str {
        match self {
            SyncError::Configuration(msg) | SyncError::Validation(msg) => msg,
            SyncError::Backend(err) => &err.message,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            SyncError::Backend(err) => write!(f, "backend error: {err}"),
            SyncError::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<BackendError> for SyncError {
    fn from(err: BackendError) -> Self {
        SyncError::Backend(err)
    }
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(err: validator::ValidationErrors) -> Self {
        SyncError::Validation(first_validation_message(&err))
    }
}

/// First human readable message out of a validator error set
fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

use std::time::Duration;

use thiserror::Error;
use tfplug::Diagnostic;

use crate::api::ApiError;

pub type Result<T> = std::result::Result<T, VpcError>;

#[derive(Debug, Error)]
pub enum VpcError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("timeout after {timeout:?} waiting for {what} (last state: {last_state})")]
    Timeout {
        what: String,
        timeout: Duration,
        last_state: String,
    },

    #[error("{what} entered failure state {state}")]
    FailedState { what: String, state: String },

    #[error("{what} reported unexpected state {state}")]
    UnexpectedState { what: String, state: String },

    #[error("API error: {0}")]
    RemoteApi(#[source] ApiError),
}

impl VpcError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Attach a description of the missing object to a 404 from the API
    pub fn from_api(err: ApiError, what: impl Into<String>) -> Self {
        if err.is_not_found() {
            Self::NotFound { what: what.into() }
        } else {
            Self::RemoteApi(err)
        }
    }

    pub fn to_diagnostic(&self, summary: impl Into<String>) -> Diagnostic {
        Diagnostic::error(summary, self.to_string())
    }
}

impl From<tfplug::TfplugError> for VpcError {
    fn from(err: tfplug::TfplugError) -> Self {
        Self::PreconditionFailed(format!("invalid configuration: {}", err))
    }
}

impl From<ApiError> for VpcError {
    fn from(err: ApiError) -> Self {
        Self::from_api(err, "remote resource")
    }
}

/// Adds context to API results in the shape `?` expects
pub trait ApiResultExt<T> {
    fn context(self, what: impl Into<String>) -> Result<T>;
}

impl<T> ApiResultExt<T> for std::result::Result<T, ApiError> {
    fn context(self, what: impl Into<String>) -> Result<T> {
        self.map_err(|e| VpcError::from_api(e, what))
    }
}

//! Errors raised while serving provider requests.
//!
//! Most failures come from the DataArts REST API. [`ProviderError::from_status`]
//! sorts response statuses into the variants the gRPC layer understands, and
//! leaves the rest as [`ProviderError::Http`] so vendor error codes in the body
//! can still be matched (see [`crate::utils::convert_expected_400_into_404`]).

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist (any more).
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// A response could not be interpreted, e.g. a create without an ID.
    #[error("unexpected API response: {0}")]
    Sdk(String),

    #[error("provider configuration: {0}")]
    Configuration(String),

    #[error("unknown resource or data source type '{0}'")]
    UnknownResource(String),

    #[error("invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("gRPC transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The request never produced a response.
    #[error("sending request: {0}")]
    Request(#[from] reqwest::Error),

    /// A response status the call did not accept.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("throttled: {0}")]
    ResourceExhausted(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("timed out: {0}")]
    DeadlineExceeded(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("not supported: {0}")]
    Unimplemented(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Classify a REST response that came back with a status the caller did
    /// not accept.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::ResourceExhausted(body),
            502..=504 => Self::Unavailable(body),
            _ => Self::Http { status, body },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Prefix the error with the operation that failed, e.g.
    /// `error creating API: HTTP 400: {...}`.
    ///
    /// The variant survives so callers can still match on it. Transport
    /// failures of a REST call become [`ProviderError::DeadlineExceeded`] or
    /// [`ProviderError::Unavailable`].
    pub fn context(self, what: impl Display) -> Self {
        match self {
            Self::NotFound(msg) => Self::NotFound(format!("{what}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{what}: {msg}")),
            Self::Sdk(msg) => Self::Sdk(format!("{what}: {msg}")),
            Self::Configuration(msg) => Self::Configuration(format!("{what}: {msg}")),
            Self::Http { status, body } => Self::Http {
                status,
                body: format!("{what}: {body}"),
            },
            Self::AlreadyExists(msg) => Self::AlreadyExists(format!("{what}: {msg}")),
            Self::PermissionDenied(msg) => Self::PermissionDenied(format!("{what}: {msg}")),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(format!("{what}: {msg}")),
            Self::Unavailable(msg) => Self::Unavailable(format!("{what}: {msg}")),
            Self::Request(err) if err.is_timeout() => Self::DeadlineExceeded(format!("{what}: {err}")),
            Self::Request(err) => Self::Unavailable(format!("{what}: {err}")),
            other => other,
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        use tonic::Status;

        let msg = err.to_string();
        match err {
            ProviderError::NotFound(_) | ProviderError::UnknownResource(_) => Status::not_found(msg),
            ProviderError::Validation(_) | ProviderError::InvalidRequest(_) | ProviderError::Serialization(_) => {
                Status::invalid_argument(msg)
            },
            ProviderError::Configuration(_) | ProviderError::FailedPrecondition(_) => Status::failed_precondition(msg),
            ProviderError::Sdk(_) => Status::internal(msg),
            ProviderError::Transport(_) | ProviderError::Request(_) | ProviderError::Unavailable(_) => {
                Status::unavailable(msg)
            },
            ProviderError::Http { .. } => Status::unknown(msg),
            ProviderError::AlreadyExists(_) => Status::already_exists(msg),
            ProviderError::PermissionDenied(_) => Status::permission_denied(msg),
            ProviderError::ResourceExhausted(_) => Status::resource_exhausted(msg),
            ProviderError::DeadlineExceeded(_) => Status::deadline_exceeded(msg),
            ProviderError::Unimplemented(_) => Status::unimplemented(msg),
        }
    }
}

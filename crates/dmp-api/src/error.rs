//! API-level errors
//!
//! Every failure a contract can report maps onto one status class and a
//! list of messages for the envelope's `errors` field.

use crate::response::StatusClass;
use dmp_ingest::{IngestError, StoreError};

/// Failure of an API call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Caller sent something unusable
    #[error("bad request: {}", .0.join(", "))]
    BadRequest(Vec<String>),

    /// No authenticated caller
    #[error("unauthorized")]
    Unauthorized,

    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Server-side failure
    #[error("internal server error: {}", .0.join(", "))]
    Internal(Vec<String>),
}

impl ApiError {
    /// Bad request with a single message
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(vec![message.into()])
    }

    /// Status class reported in the envelope
    #[must_use]
    pub fn status(&self) -> StatusClass {
        match self {
            Self::BadRequest(_) => StatusClass::BadRequest,
            Self::Unauthorized => StatusClass::Unauthorized,
            Self::NotFound(_) => StatusClass::NotFound,
            Self::Internal(_) => StatusClass::InternalServerError,
        }
    }

    /// Messages for the `errors` field
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        match self {
            Self::BadRequest(errors) | Self::Internal(errors) => errors.clone(),
            Self::Unauthorized => vec!["Unauthorized".to_string()],
            Self::NotFound(message) => vec![message.clone()],
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidJson(_) => Self::bad_request("Invalid JSON"),
            IngestError::PlanNotFound(_) => Self::NotFound(err.to_string()),
            IngestError::NoTemplate | IngestError::PersistenceFailed(_) => {
                Self::Internal(err.messages())
            }
            IngestError::Validation(_)
            | IngestError::UnresolvableContact(_)
            | IngestError::PlanAlreadyExists
            | IngestError::PlanMismatch { .. }
            | IngestError::NoOrganizationDetermined => Self::BadRequest(err.messages()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(vec![err.to_string()])
    }
}

/// Result alias for API calls
pub type ApiResult<T> = Result<T, ApiError>;

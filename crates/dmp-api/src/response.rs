//! Response envelope shared by every contract

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Timestamp layout used in envelopes and plan views
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Render a timestamp the way envelopes carry it
#[must_use]
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Outcome class of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Read succeeded
    Ok,
    /// Something was created or updated
    Created,
    /// Caller sent something unusable
    BadRequest,
    /// No authenticated caller
    Unauthorized,
    /// Unknown resource
    NotFound,
    /// Server-side failure
    InternalServerError,
}

impl StatusClass {
    /// Keyword form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Created => "created",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::InternalServerError => "internal_server_error",
        }
    }

    /// Matching HTTP status code
    #[must_use]
    pub fn http_code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
        }
    }

    /// Whether the class reports a failure
    #[inline]
    #[must_use]
    pub fn is_error(self) -> bool {
        self.http_code() >= 400
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope<T: Serialize> {
    /// Application name
    pub application: String,
    /// Request line, e.g. `POST /api/v2/plans`
    pub source: String,
    /// Response time
    pub time: String,
    /// Caller name, if any
    pub caller: Option<String>,
    /// Numeric status
    pub code: u16,
    /// Status keyword
    pub message: String,
    /// Page number of a paginated listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size of a paginated listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    /// Number of items across all pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    /// Payload
    pub items: Vec<T>,
    /// Error messages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl<T: Serialize> ResponseEnvelope<T> {
    /// Envelope stamped with the current time
    #[must_use]
    pub fn new(
        application: impl Into<String>,
        source: impl Into<String>,
        caller: Option<String>,
        status: StatusClass,
    ) -> Self {
        Self {
            application: application.into(),
            source: source.into(),
            time: format_time(Utc::now()),
            caller,
            code: status.http_code(),
            message: status.as_str().to_string(),
            page: None,
            per_page: None,
            total_items: None,
            items: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// With payload items
    #[must_use]
    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.items = items;
        self
    }

    /// With error messages
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// With listing position
    #[must_use]
    pub fn with_page(mut self, page: u32, per_page: u32, total_items: usize) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self.total_items = Some(total_items);
        self
    }
}

//! Error types for DMP ingestion
//!
//! Layered the same way the pipeline is:
//! - `StoreError` / `LookupError` from the ports
//! - `ResolveError` from a single resolver
//! - `IngestError` for a whole submission, with a stable `code()`

use dmp_model::PlanId;
use std::fmt;
use std::time::Duration;

/// Repository failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the commit
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A changeset referenced a row or slot that does not exist
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Snapshot could not be read or written
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// Check if the failure is a uniqueness conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

/// External organization lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Lookup did not answer in time
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure
    #[error("lookup transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("lookup response malformed: {0}")]
    Decode(String),
}

/// Entity kinds a resolver produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Organization
    Organization,
    /// Contributor
    Contributor,
    /// Identifier
    Identifier,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Organization => "organization",
            Self::Contributor => "contributor",
            Self::Identifier => "identifier",
        })
    }
}

/// Failure of a single resolver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Not enough data in the fragment to find or build the entity
    #[error("insufficient data to resolve {0}")]
    InsufficientData(EntityKind),

    /// Store failed while resolving
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Check if the fragment was simply too sparse
    #[inline]
    #[must_use]
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData(_))
    }
}

/// Failure of a whole submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// Body is not parseable JSON or does not fit the document shape
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Required fields missing; every problem is listed
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The contact could not be resolved
    #[error("unable to resolve the contact: {0}")]
    UnresolvableContact(String),

    /// Create contract hit an already materialized plan
    #[error("Plan already exists. Send an update instead.")]
    PlanAlreadyExists,

    /// Update contract named a plan that does not exist
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// Update was pinned to one plan but the body identifies another
    #[error("Plan identifiers refer to plan {found}, not plan {target}")]
    PlanMismatch {
        /// Plan the update was addressed to
        target: PlanId,
        /// Plan the submitted identifiers resolve to
        found: PlanId,
    },

    /// No owning organization could be established
    #[error("Unable to determine the organization for the plan")]
    NoOrganizationDetermined,

    /// Neither a submitted nor a default template exists
    #[error("no template available for the plan")]
    NoTemplate,

    /// Commit or store access failed
    #[error("unable to save the plan: {0}")]
    PersistenceFailed(String),
}

impl IngestError {
    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::Validation(_) => "validation",
            Self::UnresolvableContact(_) => "unresolvable_contact",
            Self::PlanAlreadyExists => "plan_already_exists",
            Self::PlanNotFound(_) => "plan_not_found",
            Self::PlanMismatch { .. } => "plan_mismatch",
            Self::NoOrganizationDetermined => "no_organization_determined",
            Self::NoTemplate => "no_template",
            Self::PersistenceFailed(_) => "persistence_failed",
        }
    }

    /// Check if resubmitting the same document may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceFailed(_))
    }

    /// Human-readable messages, one per problem
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::PersistenceFailed(err.to_string())
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or shape error
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML syntax or shape error
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File extension is neither TOML nor YAML
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Values are out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Result alias for submissions
pub type IngestResult<T> = Result<T, IngestError>;

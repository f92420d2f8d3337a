//! Identifiers and their owners
//!
//! An identifier is a `(scheme, value)` pair attached to exactly one owner.
//! Owners are a closed set of entity kinds, so ownership is a sum type
//! rather than a type-name/id pair.

use crate::ids::{ContributorId, IdentifierId, OrgId, PlanId, SchemeId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// Constant pattern, exercised by `format_detects_value_shapes`
static DOI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(doi:)?[0-9]{2}\.[0-9]+/.").expect("DOI pattern is a valid regex")
});

/// Kind of entity that owns an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    /// Data management plan
    Plan,
    /// Organization (affiliation or funder)
    Org,
    /// Plan contributor
    Contributor,
}

impl OwnerKind {
    /// Stable lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Org => "org",
            Self::Contributor => "contributor",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum IdentifierOwner {
    /// Owned by a plan
    Plan(PlanId),
    /// Owned by an organization
    Org(OrgId),
    /// Owned by a contributor
    Contributor(ContributorId),
}

impl IdentifierOwner {
    /// Owner kind tag
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OwnerKind {
        match self {
            Self::Plan(_) => OwnerKind::Plan,
            Self::Org(_) => OwnerKind::Org,
            Self::Contributor(_) => OwnerKind::Contributor,
        }
    }
}

/// Format classification of an identifier value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierFormat {
    /// ORCID person id
    Orcid,
    /// Research Organization Registry id
    Ror,
    /// Crossref funder registry id
    Fundref,
    /// Archival Resource Key
    Ark,
    /// Digital Object Identifier
    Doi,
    /// Any other URL
    Url,
    /// Anything else
    Other,
}

impl IdentifierFormat {
    /// Stable lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orcid => "orcid",
            Self::Ror => "ror",
            Self::Fundref => "fundref",
            Self::Ark => "ark",
            Self::Doi => "doi",
            Self::Url => "url",
            Self::Other => "other",
        }
    }
}

/// An identifier attached to (or about to be attached to) an owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Store id, `None` until committed
    pub id: Option<IdentifierId>,
    /// Scheme id
    pub scheme_id: SchemeId,
    /// Scheme name, denormalized for presentation
    pub scheme_name: String,
    /// Normalized value (landing URL stripped)
    pub value: String,
    /// Current owner, `None` while the identifier is unattached
    pub owner: Option<IdentifierOwner>,
}

impl Identifier {
    /// Build an unsaved, unattached identifier
    #[must_use]
    pub fn new(scheme_id: SchemeId, scheme_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            scheme_id,
            scheme_name: scheme_name.into(),
            value: value.into(),
            owner: None,
        }
    }

    /// Whether the identifier has not been committed yet
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Same `(scheme, value)` pair
    #[inline]
    #[must_use]
    pub fn same_key(&self, other: &Identifier) -> bool {
        self.scheme_id == other.scheme_id && self.value == other.value
    }

    /// Whether the identifier is owned by something other than `owner`
    #[inline]
    #[must_use]
    pub fn owned_elsewhere(&self, owner: Option<IdentifierOwner>) -> bool {
        match (self.owner, owner) {
            (None, _) => false,
            (Some(current), Some(candidate)) => current != candidate,
            (Some(_), None) => true,
        }
    }

    /// Classify the value
    #[must_use]
    pub fn format(&self) -> IdentifierFormat {
        match self.scheme_name.as_str() {
            "orcid" => return IdentifierFormat::Orcid,
            "ror" => return IdentifierFormat::Ror,
            "fundref" => return IdentifierFormat::Fundref,
            _ => {}
        }

        if self.value.contains("ark:") {
            IdentifierFormat::Ark
        } else if DOI_PATTERN.is_match(&self.value) {
            IdentifierFormat::Doi
        } else if self.value.starts_with("http") {
            IdentifierFormat::Url
        } else {
            IdentifierFormat::Other
        }
    }
}

/// Merge `incoming` identifiers into `existing`
///
/// An incoming identifier is skipped when `existing` already holds the same
/// `(scheme, value)` pair or when it is owned by an entity other than
/// `owner`. Returns the number of identifiers added.
pub fn consolidate(
    existing: &mut Vec<Identifier>,
    incoming: impl IntoIterator<Item = Identifier>,
    owner: Option<IdentifierOwner>,
) -> usize {
    let mut added = 0;
    for identifier in incoming {
        if identifier.value.trim().is_empty() {
            continue;
        }
        if existing.iter().any(|current| current.same_key(&identifier)) {
            continue;
        }
        if identifier.owned_elsewhere(owner) {
            continue;
        }
        existing.push(identifier);
        added += 1;
    }
    added
}

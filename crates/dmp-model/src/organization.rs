//! Organizations (affiliations and funders)

use crate::identifier::{consolidate, Identifier, IdentifierOwner};
use crate::ids::OrgId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Store id, `None` until committed
    pub id: Option<OrgId>,
    /// Display name
    pub name: String,
    /// Short name
    #[serde(default)]
    pub abbreviation: Option<String>,
    /// Language code
    #[serde(default)]
    pub language: Option<String>,
    /// Attached identifiers, unique by `(scheme, value)`
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Organization {
    /// New, unsaved organization
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into().trim().to_string(),
            abbreviation: None,
            language: None,
            identifiers: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// With abbreviation
    #[inline]
    #[must_use]
    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = Some(abbreviation.into());
        self
    }

    /// With language
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether the organization has not been committed yet
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Owner tag for identifiers attached to this organization
    #[inline]
    #[must_use]
    pub fn as_owner(&self) -> Option<IdentifierOwner> {
        self.id.map(IdentifierOwner::Org)
    }

    /// Case-insensitive name comparison
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }

    /// Merge identifiers without duplicating `(scheme, value)` pairs
    pub fn consolidate_identifiers(&mut self, incoming: impl IntoIterator<Item = Identifier>) -> usize {
        let owner = self.as_owner();
        consolidate(&mut self.identifiers, incoming, owner)
    }

    /// Fold a concurrently resolved copy into this one
    ///
    /// Name and abbreviation are set once; identifiers accumulate.
    pub fn merge_from(&mut self, other: Organization) {
        if self.abbreviation.as_deref().map_or(true, |a| a.trim().is_empty()) {
            self.abbreviation = other.abbreviation.filter(|a| !a.trim().is_empty());
        }
        if self.language.is_none() {
            self.language = other.language;
        }
        self.consolidate_identifiers(other.identifiers);
    }

    /// First identifier of the named scheme
    #[must_use]
    pub fn identifier_for(&self, scheme_name: &str) -> Option<&Identifier> {
        self.identifiers
            .iter()
            .find(|identifier| identifier.scheme_name.eq_ignore_ascii_case(scheme_name))
    }
}
